//! 传输与执行器替身。
//!
//! # 设计动机（Why）
//! - 契约用例与集成测试都需要“可观测”的传输层：记录调用顺序、模拟永不返回的副本、
//!   注入指定错误；集中实现可避免各处各写一份；
//! - [`LocalReplicas`] 在进程内模拟一组副本：每个副本按方法名注册处理函数并带健康标记，
//!   既能充当 [`Transport`]，也能充当控制面的 [`HealthCheck`]。
//!
//! # 契约说明（What）
//! - 所有替身都是线程安全的，可直接包进 `Arc` 交给路由器；
//! - 端点地址被当作副本名解析，与 `ReplicaSnapshot::from_names` 的约定一致。

use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    task::{Context, Poll},
};

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serve_core::{
    DispatchExecutor, Endpoint, Invocation, ReplicaId, Transport, TransportError, TransportResult,
};
use serve_router::HealthCheck;

/// 在提交线程上同步执行派发任务。
///
/// 传输 Future 立即就绪时，`dispatch` 返回前调用即已完成，便于断言顺序。
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl DispatchExecutor for InlineExecutor {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        futures::executor::block_on(task);
    }
}

/// 一次被传输层观测到的调用。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub endpoint: String,
    pub method: Option<String>,
    pub payload: Bytes,
}

/// 记录调用并以端点地址作为回复的传输替身。
#[derive(Debug, Default)]
pub struct EchoTransport {
    calls: Mutex<Vec<RecordedCall>>,
}

impl EchoTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按到达顺序返回全部调用。
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// 按到达顺序返回被调用的端点地址。
    pub fn endpoints(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .map(|call| call.endpoint.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Transport for EchoTransport {
    fn send(&self, endpoint: &Endpoint, invocation: Invocation) -> BoxFuture<'static, TransportResult> {
        let (method, _, payload) = invocation.into_parts();
        self.calls.lock().push(RecordedCall {
            endpoint: endpoint.address().to_owned(),
            method: method.map(|name| name.to_string()),
            payload,
        });
        let reply = Bytes::copy_from_slice(endpoint.address().as_bytes());
        Box::pin(async move { Ok(reply) })
    }
}

#[derive(Debug, Default)]
struct StallCounters {
    sends: AtomicUsize,
    dropped: AtomicUsize,
}

/// 永不返回的传输替身，用于验证派发不阻塞与取消释放。
#[derive(Debug, Default)]
pub struct StalledTransport {
    counters: Arc<StallCounters>,
}

impl StalledTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// `send` 被调用的次数。
    pub fn sends(&self) -> usize {
        self.counters.sends.load(Ordering::Acquire)
    }

    /// 已被释放（取消或随任务丢弃）的挂起调用数。
    pub fn dropped(&self) -> usize {
        self.counters.dropped.load(Ordering::Acquire)
    }
}

impl Transport for StalledTransport {
    fn send(&self, _: &Endpoint, _: Invocation) -> BoxFuture<'static, TransportResult> {
        self.counters.sends.fetch_add(1, Ordering::AcqRel);
        Box::pin(StalledCall {
            counters: Arc::clone(&self.counters),
        })
    }
}

struct StalledCall {
    counters: Arc<StallCounters>,
}

impl Future for StalledCall {
    type Output = TransportResult;

    fn poll(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Self::Output> {
        Poll::Pending
    }
}

impl Drop for StalledCall {
    fn drop(&mut self) {
        self.counters.dropped.fetch_add(1, Ordering::AcqRel);
    }
}

/// 总是返回指定错误的传输替身。
#[derive(Debug)]
pub struct FailingTransport {
    error: TransportError,
}

impl FailingTransport {
    pub fn new(error: TransportError) -> Self {
        Self { error }
    }
}

impl Transport for FailingTransport {
    fn send(&self, _: &Endpoint, _: Invocation) -> BoxFuture<'static, TransportResult> {
        let error = self.error.clone();
        Box::pin(async move { Err(error) })
    }
}

type MethodHandler = Arc<dyn Fn(&Bytes) -> TransportResult + Send + Sync>;

/// 进程内副本：方法表 + 健康标记。
pub struct LocalReplica {
    methods: HashMap<String, MethodHandler>,
    healthy: AtomicBool,
}

impl LocalReplica {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
            healthy: AtomicBool::new(true),
        }
    }

    /// 注册方法处理函数，同名覆盖。
    pub fn method<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Bytes) -> TransportResult + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(handler));
        self
    }

    fn invoke(&self, method: Option<&str>, payload: &Bytes) -> TransportResult {
        let name = method.unwrap_or_default();
        match self.methods.get(name) {
            Some(handler) => handler(payload),
            None => Err(TransportError::remote(format!("method `{name}` not found"))),
        }
    }
}

impl Default for LocalReplica {
    fn default() -> Self {
        Self::new()
    }
}

/// 进程内副本注册表。
///
/// # 契约说明（What）
/// - 作为 [`Transport`]：按端点地址查找副本并同步执行方法；副本不存在返回 `ConnectionRefused`，
///   方法不存在返回 `Remote`；
/// - 作为 [`HealthCheck`]：副本存在且健康标记为真才视为健康。
#[derive(Default)]
pub struct LocalReplicas {
    replicas: DashMap<ReplicaId, LocalReplica>,
}

impl LocalReplicas {
    pub fn new() -> Self {
        Self::default()
    }

    /// 部署（或替换）一个副本。
    pub fn deploy(&self, name: impl Into<ReplicaId>, replica: LocalReplica) {
        self.replicas.insert(name.into(), replica);
    }

    /// 下线副本，之后对它的调用返回 `ConnectionRefused`。
    pub fn kill(&self, name: &ReplicaId) -> bool {
        self.replicas.remove(name).is_some()
    }

    /// 修改副本健康标记。
    pub fn set_healthy(&self, name: &ReplicaId, healthy: bool) {
        if let Some(replica) = self.replicas.get(name) {
            replica.healthy.store(healthy, Ordering::Release);
        }
    }
}

impl Transport for LocalReplicas {
    fn send(&self, endpoint: &Endpoint, invocation: Invocation) -> BoxFuture<'static, TransportResult> {
        let id = ReplicaId::new(endpoint.address());
        let result = match self.replicas.get(&id) {
            Some(replica) => replica.invoke(
                invocation.method_name().map(|name| name.as_str()),
                invocation.payload(),
            ),
            None => Err(TransportError::ConnectionRefused {
                endpoint: endpoint.address().to_owned(),
            }),
        };
        Box::pin(async move { result })
    }
}

impl HealthCheck for LocalReplicas {
    fn is_healthy(&self, replica: &ReplicaId) -> bool {
        self.replicas
            .get(replica)
            .is_some_and(|entry| entry.healthy.load(Ordering::Acquire))
    }
}
