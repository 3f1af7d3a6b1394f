//! 路由器：选择副本并把逻辑调用派发到具体端点。
//!
//! # 设计动机（Why）
//! - 把“选谁”（[`ReplicaSet`] 的轮询快照）与“怎么送”（外部 [`Transport`]）组合起来，
//!   对调用方只暴露“给我一个 Future”这一件事；
//! - 派发路径上没有全局锁：一次 `ArcSwap::load` + 一次原子递增 + 一次任务入队。
//!
//! # 行为概览（How）
//! 1. 校验调用（策略要求方法名而调用未提供时同步返回 `InvalidInvocation`），补全默认方法名；
//! 2. `pick_one`；集合为空则返回已失败的 Future（`NoReplicaAvailable`），不触碰传输层；
//! 3. 创建在途调用，把“`send` + 错误包装”作为任务交给派发执行器，立即返回 Future。
//!
//! # 契约说明（What）
//! - 传输失败原样包进 `ServeError::Transport`，路由器从不重试、不施加超时；
//! - `set_replica_set` 可与任意数量的 `dispatch` 并发执行，临界区仅限写者之间。

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use serve_core::{
    CallFuture, CallResult, DeploymentConfig, DeploymentInfo, DeploymentName, DeploymentVersion,
    DispatchExecutor, Invocation, MethodName, RouterConfig, ServeError, Transport, codes,
};
use tracing::{debug, info, warn};

use crate::{
    executor::ThreadPoolExecutor,
    replica_set::{MembershipUpdate, ReplicaPick, ReplicaSet, ReplicaSnapshot},
};

/// 路由器运行计数。
#[derive(Debug, Default)]
struct RouterCounters {
    dispatched: AtomicU64,
    rejected_empty: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl RouterCounters {
    fn record(&self, result: &CallResult) {
        let counter = if result.is_ok() {
            &self.completed
        } else {
            &self.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 路由器计数快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouterStats {
    /// 已交给执行器的调用数。
    pub dispatched: u64,
    /// 因集合为空而立即失败的调用数。
    pub rejected_empty: u64,
    /// 传输成功返回的调用数。
    pub completed: u64,
    /// 传输失败的调用数（不含被取消的调用）。
    pub failed: u64,
}

/// 单个部署的路由器。
///
/// # 教案式说明
/// - **意图 (Why)**：实现轮询选择策略，并完成逻辑调用到物理端点的派发；
/// - **契约 (What)**：
///   - 独占其 [`ReplicaSet`]；外部只能通过 [`Router::set_replica_set`] 提交快照；
///   - 构造时捕获部署版本，版本不参与路由决策；
///   - `dispatch` 只在入队前做同步工作，远程调用在派发执行器上完成；
/// - **风险提示 (Trade-offs)**：对健康状态不敏感，剔除不健康副本是控制面代理的职责。
pub struct Router {
    deployment: DeploymentName,
    version: DeploymentVersion,
    deployment_config: DeploymentConfig,
    config: RouterConfig,
    default_method: MethodName,
    replicas: ReplicaSet,
    transport: Arc<dyn Transport>,
    executor: Arc<dyn DispatchExecutor>,
    counters: Arc<RouterCounters>,
}

impl Router {
    /// 以部署名与传输层开始构造路由器。
    pub fn builder(deployment: impl Into<DeploymentName>, transport: Arc<dyn Transport>) -> RouterBuilder {
        RouterBuilder {
            deployment: deployment.into(),
            version: None,
            deployment_config: DeploymentConfig::default(),
            config: RouterConfig::default(),
            transport,
            executor: None,
        }
    }

    /// 以控制面的部署描述开始构造路由器，继承其版本与部署配置。
    pub fn builder_from_info(info: &DeploymentInfo, transport: Arc<dyn Transport>) -> RouterBuilder {
        Self::builder(info.name().clone(), transport)
            .version(info.version().clone())
            .deployment_config(info.config().clone())
    }

    /// 派发一次调用。
    ///
    /// 仅 `InvalidInvocation` 会同步返回；其余失败都经返回的 Future 交付。
    pub fn dispatch(&self, invocation: Invocation) -> Result<CallFuture, ServeError> {
        let invocation = self.prepare(invocation)?;

        let Some(ReplicaPick {
            replica,
            endpoint,
            revision,
        }) = self.replicas.pick_one()
        else {
            self.counters.rejected_empty.fetch_add(1, Ordering::Relaxed);
            warn!(
                serve.deployment = %self.deployment,
                error.code = codes::ROUTER_NO_REPLICA,
                "no replica available, failing call"
            );
            return Ok(CallFuture::failed(ServeError::NoReplicaAvailable {
                deployment: self.deployment.clone(),
            }));
        };

        debug!(
            serve.deployment = %self.deployment,
            serve.replica = %replica,
            serve.method = invocation.method_name().map(MethodName::as_str).unwrap_or_default(),
            serve.membership.revision = revision,
            "dispatching invocation"
        );

        let (call, completer) = CallFuture::pending(replica.clone());
        let transport = Arc::clone(&self.transport);
        let counters = Arc::clone(&self.counters);
        let task = async move {
            let result = transport
                .send(&endpoint, invocation)
                .await
                .map_err(|source| ServeError::Transport { replica, source });
            counters.record(&result);
            result
        };

        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        self.executor.spawn(Box::pin(completer.run(task)));
        Ok(call)
    }

    /// 整体替换副本集合。
    pub fn set_replica_set(&self, snapshot: ReplicaSnapshot) -> MembershipUpdate {
        let update = self.replicas.update_membership(snapshot);
        if update.changed {
            info!(
                serve.deployment = %self.deployment,
                serve.membership.revision = update.revision,
                added = update.added.len(),
                removed = update.removed.len(),
                size = self.replicas.len(),
                "replica membership replaced"
            );
        }
        update
    }

    /// 只读访问副本集合。
    pub fn replica_set(&self) -> &ReplicaSet {
        &self.replicas
    }

    pub fn deployment(&self) -> &DeploymentName {
        &self.deployment
    }

    /// 构造时捕获的部署版本。
    pub fn version(&self) -> &DeploymentVersion {
        &self.version
    }

    pub fn deployment_config(&self) -> &DeploymentConfig {
        &self.deployment_config
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// 计数快照。
    pub fn stats(&self) -> RouterStats {
        RouterStats {
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            rejected_empty: self.counters.rejected_empty.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    fn prepare(&self, invocation: Invocation) -> Result<Invocation, ServeError> {
        match invocation.method_name() {
            None if self.config.require_method => Err(ServeError::invalid_invocation(
                "method name required by routing policy",
            )),
            Some(method) if method.as_str().trim().is_empty() => {
                Err(ServeError::invalid_invocation("method name must not be blank"))
            }
            _ => Ok(invocation.resolve_method(&self.default_method)),
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("deployment", &self.deployment)
            .field("version", &self.version)
            .field("replicas", &self.replicas)
            .finish_non_exhaustive()
    }
}

/// [`Router`] 构造器。
pub struct RouterBuilder {
    deployment: DeploymentName,
    version: Option<DeploymentVersion>,
    deployment_config: DeploymentConfig,
    config: RouterConfig,
    transport: Arc<dyn Transport>,
    executor: Option<Arc<dyn DispatchExecutor>>,
}

impl RouterBuilder {
    /// 部署版本；缺省为空标签。
    pub fn version(mut self, version: DeploymentVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn deployment_config(mut self, config: DeploymentConfig) -> Self {
        self.deployment_config = config;
        self
    }

    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// 指定派发执行器；缺省时按配置线程数创建 [`ThreadPoolExecutor`]。
    pub fn executor(mut self, executor: Arc<dyn DispatchExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// 完成构造，路由器初始为空集合。
    pub fn build(self) -> Result<Router, ServeError> {
        self.config
            .validate()
            .map_err(|err| ServeError::InvalidConfig {
                reason: err.to_string(),
            })?;
        let executor = match self.executor {
            Some(executor) => executor,
            None => Arc::new(ThreadPoolExecutor::new(self.config.executor_threads)?),
        };
        Ok(Router {
            default_method: self.config.default_method_name(),
            deployment: self.deployment,
            version: self.version.unwrap_or_else(|| DeploymentVersion::new("")),
            deployment_config: self.deployment_config,
            config: self.config,
            replicas: ReplicaSet::new(),
            transport: self.transport,
            executor,
            counters: Arc::new(RouterCounters::default()),
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::{executor::block_on, future::BoxFuture};
    use parking_lot::Mutex;
    use serve_core::{
        CallState, Endpoint, TransportError, TransportResult, observability::keys,
    };
    use tracing_test::traced_test;

    use super::*;

    /// 在调用线程上同步执行任务，便于断言派发顺序。
    struct InlineExecutor;

    impl DispatchExecutor for InlineExecutor {
        fn spawn(&self, task: BoxFuture<'static, ()>) {
            block_on(task);
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        calls: Mutex<Vec<(String, Option<String>)>>,
        fail_with: Option<TransportError>,
    }

    impl Transport for RecordingTransport {
        fn send(&self, endpoint: &Endpoint, invocation: Invocation) -> BoxFuture<'static, TransportResult> {
            self.calls.lock().push((
                endpoint.address().to_owned(),
                invocation.method_name().map(|m| m.to_string()),
            ));
            let reply = match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(Bytes::copy_from_slice(endpoint.address().as_bytes())),
            };
            Box::pin(async move { reply })
        }
    }

    fn router(transport: Arc<RecordingTransport>, config: RouterConfig) -> Router {
        Router::builder("echo", transport)
            .version(DeploymentVersion::new("v1"))
            .config(config)
            .executor(Arc::new(InlineExecutor))
            .build()
            .expect("路由器应当构造成功")
    }

    #[traced_test]
    #[test]
    fn fills_default_method_before_sending() {
        let transport = Arc::new(RecordingTransport::default());
        let router = router(Arc::clone(&transport), RouterConfig::default());
        router.set_replica_set(ReplicaSnapshot::from_names(["a"]));

        let reply = router
            .dispatch(Invocation::default_entrypoint("x"))
            .unwrap()
            .wait();
        assert_eq!(reply.unwrap(), Bytes::from_static(b"a"));
        assert_eq!(
            transport.calls.lock().as_slice(),
            [("a".to_owned(), Some("__call__".to_owned()))]
        );
        assert!(logs_contain(keys::DEPLOYMENT));
        assert!(logs_contain(keys::REPLICA));
        assert!(logs_contain(keys::METHOD));
    }

    #[test]
    fn required_method_is_validated_synchronously() {
        let transport = Arc::new(RecordingTransport::default());
        let config = RouterConfig {
            require_method: true,
            ..RouterConfig::default()
        };
        let router = router(Arc::clone(&transport), config);
        router.set_replica_set(ReplicaSnapshot::from_names(["a"]));

        let err = router
            .dispatch(Invocation::default_entrypoint("x"))
            .expect_err("缺少方法名必须同步拒绝");
        assert_eq!(err.code(), codes::ROUTER_INVALID_INVOCATION);

        let blank = router.dispatch(Invocation::method(" ", "x"));
        assert!(matches!(blank, Err(ServeError::InvalidInvocation { .. })));
        assert!(transport.calls.lock().is_empty());
        assert_eq!(router.stats(), RouterStats::default());
    }

    #[test]
    fn transport_failure_is_passed_through() {
        let transport = Arc::new(RecordingTransport {
            fail_with: Some(TransportError::ConnectionRefused {
                endpoint: "a".into(),
            }),
            ..Default::default()
        });
        let router = router(transport, RouterConfig::default());
        router.set_replica_set(ReplicaSnapshot::from_names(["a"]));

        let call = router.dispatch(Invocation::method("m", "x")).unwrap();
        assert_eq!(call.state(), CallState::Failed);
        let err = call.wait().unwrap_err();
        assert_eq!(
            err.transport_error(),
            Some(&TransportError::ConnectionRefused {
                endpoint: "a".into()
            })
        );
        let stats = router.stats();
        assert_eq!((stats.dispatched, stats.failed), (1, 1));
    }

    #[traced_test]
    #[test]
    fn empty_set_logs_and_counts_rejection() {
        let transport = Arc::new(RecordingTransport::default());
        let router = router(Arc::clone(&transport), RouterConfig::default());

        let call = router.dispatch(Invocation::method("m", "x")).unwrap();
        assert!(call.wait().unwrap_err().is_no_replica());
        assert_eq!(router.stats().rejected_empty, 1);
        assert!(transport.calls.lock().is_empty());
        assert!(logs_contain("no replica available"));
        assert!(logs_contain(keys::ERROR_CODE));
        assert!(logs_contain(codes::ROUTER_NO_REPLICA));
    }

    #[traced_test]
    #[test]
    fn membership_change_is_logged_once() {
        let router = router(Arc::new(RecordingTransport::default()), RouterConfig::default());
        router.set_replica_set(ReplicaSnapshot::from_names(["a", "b"]));
        router.set_replica_set(ReplicaSnapshot::from_names(["a", "b"]));
        assert!(logs_contain(keys::REVISION));
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|line| line.contains("replica membership replaced"))
                .count()
            {
                1 => Ok(()),
                n => Err(format!("成员替换日志应只出现一次，实际 {n} 次")),
            }
        });
    }

    #[test]
    fn builder_from_info_captures_version() {
        let info = DeploymentInfo::new("echo", DeploymentVersion::new("v7")).with_config(
            DeploymentConfig {
                max_concurrent_queries: Some(8),
                user_config: None,
            },
        );
        let router = Router::builder_from_info(&info, Arc::new(RecordingTransport::default()))
            .executor(Arc::new(InlineExecutor))
            .build()
            .unwrap();
        assert_eq!(router.version().as_str(), "v7");
        assert_eq!(router.deployment_config().max_concurrent_queries, Some(8));
        assert!(router.replica_set().is_empty());
    }
}
