//! 派发执行器实现。
//!
//! - [`ThreadPoolExecutor`]：默认实现，基于 `futures` 线程池，不绑定任何异步运行时；
//! - [`TokioExecutor`]：启用 `tokio` 特性后可用，把派发任务交给宿主已有的 Tokio 运行时。

use futures::{executor::ThreadPool, future::BoxFuture};
use serve_core::{DispatchExecutor, ServeError};

/// 基于 `futures::executor::ThreadPool` 的派发执行器。
#[derive(Clone, Debug)]
pub struct ThreadPoolExecutor {
    pool: ThreadPool,
}

impl ThreadPoolExecutor {
    /// 创建线程池；`threads == 0` 时交由线程池按 CPU 数决定。
    pub fn new(threads: usize) -> Result<Self, ServeError> {
        let mut builder = ThreadPool::builder();
        builder.name_prefix("serve-dispatch-");
        if threads > 0 {
            builder.pool_size(threads);
        }
        let pool = builder
            .create()
            .map_err(|err| ServeError::ExecutorUnavailable {
                reason: err.to_string(),
            })?;
        Ok(Self { pool })
    }
}

impl DispatchExecutor for ThreadPoolExecutor {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        self.pool.spawn_ok(task);
    }
}

/// 把派发任务交给 Tokio 运行时。
///
/// 运行时关闭后提交的任务会被直接丢弃，对应调用以 `ExecutorUnavailable` 失败。
#[cfg(feature = "tokio")]
#[derive(Clone, Debug)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

#[cfg(feature = "tokio")]
impl TokioExecutor {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// 绑定当前线程所在的 Tokio 运行时。
    pub fn current() -> Result<Self, ServeError> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|err| ServeError::ExecutorUnavailable {
                reason: err.to_string(),
            })
    }
}

#[cfg(feature = "tokio")]
impl DispatchExecutor for TokioExecutor {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        // JoinHandle 直接丢弃即 detach；结果经兑现器交付。
        drop(self.handle.spawn(task));
    }
}
