//! 在途调用记录与返回给调用方的 Future。
//!
//! # 设计背景（Why）
//! - 派发必须立即返回，真实的远程调用在派发执行器上完成，因此需要一个“承诺/兑现”二元组：
//!   [`CallFuture`] 交给调用方，[`CallCompleter`] 随派发任务移交执行器；
//! - 取消与选择是两件独立的事：取消只会尽力中止在途的传输 Future，已经发生的副本选择
//!   （[`CallFuture::replica`]）不会被撤销。
//!
//! # 逻辑解析（How）
//! - 结果经 `futures::channel::oneshot` 传递；
//! - [`CallCompleter::run`] 把传输 Future 包进 `Abortable`，`CallFuture::cancel` 或丢弃 `CallFuture`
//!   会触发对应的 `AbortHandle`；
//! - 完成状态记录在共享的原子字节中，调用方无需 `await` 即可观测 Pending/Fulfilled/Failed。
//!
//! # 契约说明（What）
//! - 发送端在未送出结果的情况下被丢弃：若调用方曾请求取消，结果为 [`ServeError::Cancelled`]；
//!   否则说明执行器丢弃了派发任务，结果为 [`ServeError::ExecutorUnavailable`]；
//! - Future 完成后再次轮询会 panic，与标准库 Future 契约一致。

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    task::{Context, Poll},
};

use bytes::Bytes;
use futures::{
    channel::oneshot,
    future::{AbortHandle, AbortRegistration, Abortable, FusedFuture},
};

use crate::{error::ServeError, ids::ReplicaId};

/// 调用结果。
pub type CallResult = Result<Bytes, ServeError>;

/// 在途调用的完成状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallState {
    Pending,
    Fulfilled,
    Failed,
}

const PENDING: u8 = 0;
const FULFILLED: u8 = 1;
const FAILED: u8 = 2;

#[derive(Debug)]
struct CallShared {
    state: AtomicU8,
    cancel_requested: AtomicBool,
}

impl CallShared {
    fn new(state: u8) -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(state),
            cancel_requested: AtomicBool::new(false),
        })
    }

    /// 仅允许从 Pending 迁移一次。
    fn settle(&self, ok: bool) {
        let next = if ok { FULFILLED } else { FAILED };
        let _ = self
            .state
            .compare_exchange(PENDING, next, Ordering::AcqRel, Ordering::Acquire);
    }

    fn state(&self) -> CallState {
        match self.state.load(Ordering::Acquire) {
            PENDING => CallState::Pending,
            FULFILLED => CallState::Fulfilled,
            _ => CallState::Failed,
        }
    }
}

enum Slot {
    Ready(CallResult),
    Waiting(oneshot::Receiver<CallResult>),
    Done,
}

/// 返回给调用方的调用 Future，同时承载 `PendingCall` 记录。
///
/// # 教案式说明
/// - **意图 (Why)**：调用方既可以 `await`，也可以通过 [`CallFuture::wait`] 阻塞等待，
///   或仅通过 [`CallFuture::state`] 轮询完成状态；
/// - **契约 (What)**：
///   - `replica()` 返回派发时选中的副本；对空集合立即失败的调用返回 `None`；
///   - `cancel()` 幂等，只是“请求取消”，若传输已先行完成仍会交付真实结果；
///   - 丢弃未完成的 `CallFuture` 等价于调用 `cancel()`；
/// - **风险提示 (Trade-offs)**：取消依赖执行器继续轮询被中止的任务，若执行器已停止，
///   传输 Future 会随任务一起被丢弃。
pub struct CallFuture {
    replica: Option<ReplicaId>,
    slot: Slot,
    shared: Arc<CallShared>,
    abort: Option<AbortHandle>,
}

impl CallFuture {
    /// 构造一个已经失败的调用（例如副本集合为空）。
    pub fn failed(error: ServeError) -> Self {
        Self {
            replica: None,
            slot: Slot::Ready(Err(error)),
            shared: CallShared::new(FAILED),
            abort: None,
        }
    }

    /// 为选中的副本创建在途调用，返回调用方 Future 与执行侧兑现器。
    pub fn pending(replica: ReplicaId) -> (Self, CallCompleter) {
        let (sender, receiver) = oneshot::channel();
        let (abort, registration) = AbortHandle::new_pair();
        let shared = CallShared::new(PENDING);
        let future = Self {
            replica: Some(replica),
            slot: Slot::Waiting(receiver),
            shared: Arc::clone(&shared),
            abort: Some(abort),
        };
        let completer = CallCompleter {
            sender,
            shared,
            registration,
        };
        (future, completer)
    }

    /// 派发时选中的副本。
    pub fn replica(&self) -> Option<&ReplicaId> {
        self.replica.as_ref()
    }

    /// 当前完成状态。
    pub fn state(&self) -> CallState {
        self.shared.state()
    }

    /// 尽力取消在途传输调用。
    pub fn cancel(&self) {
        self.shared.cancel_requested.store(true, Ordering::Release);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    /// 阻塞当前线程直至结果就绪。
    ///
    /// 不要在异步任务内部调用，否则会阻塞执行器线程。
    pub fn wait(self) -> CallResult {
        futures::executor::block_on(self)
    }

    fn resolve_dropped_sender(&self) -> ServeError {
        if self.shared.cancel_requested.load(Ordering::Acquire) {
            ServeError::Cancelled
        } else {
            ServeError::ExecutorUnavailable {
                reason: "dispatch task dropped before completion".to_owned(),
            }
        }
    }
}

impl Future for CallFuture {
    type Output = CallResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let output = match std::mem::replace(&mut this.slot, Slot::Done) {
            Slot::Ready(result) => result,
            Slot::Waiting(mut receiver) => match Pin::new(&mut receiver).poll(cx) {
                Poll::Pending => {
                    this.slot = Slot::Waiting(receiver);
                    return Poll::Pending;
                }
                Poll::Ready(Ok(result)) => result,
                Poll::Ready(Err(oneshot::Canceled)) => Err(this.resolve_dropped_sender()),
            },
            Slot::Done => panic!("CallFuture polled after completion"),
        };
        this.shared.settle(output.is_ok());
        Poll::Ready(output)
    }
}

impl FusedFuture for CallFuture {
    fn is_terminated(&self) -> bool {
        matches!(self.slot, Slot::Done)
    }
}

impl Drop for CallFuture {
    fn drop(&mut self) {
        if matches!(self.slot, Slot::Waiting(_)) {
            if let Some(abort) = &self.abort {
                abort.abort();
            }
        }
    }
}

impl fmt::Debug for CallFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallFuture")
            .field("replica", &self.replica)
            .field("state", &self.state())
            .finish()
    }
}

/// 执行侧兑现器，随派发任务一起移交执行器。
pub struct CallCompleter {
    sender: oneshot::Sender<CallResult>,
    shared: Arc<CallShared>,
    registration: AbortRegistration,
}

impl CallCompleter {
    /// 驱动 `call` 并把结果交付给调用方；调用方取消时 `call` 会在下一次让出时被中止。
    pub async fn run<F>(self, call: F)
    where
        F: Future<Output = CallResult>,
    {
        let Self {
            sender,
            shared,
            registration,
        } = self;
        match Abortable::new(call, registration).await {
            Ok(result) => {
                shared.settle(result.is_ok());
                let _ = sender.send(result);
            }
            Err(_aborted) => shared.settle(false),
        }
    }

    /// 直接交付结果；返回调用方是否仍在等待。
    pub fn complete(self, result: CallResult) -> bool {
        self.shared.settle(result.is_ok());
        self.sender.send(result).is_ok()
    }

    /// 调用方是否已丢弃 Future。
    pub fn is_abandoned(&self) -> bool {
        self.sender.is_canceled()
    }
}

impl fmt::Debug for CallCompleter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallCompleter")
            .field("state", &self.shared.state())
            .finish()
    }
}
