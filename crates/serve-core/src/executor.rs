//! 派发执行上下文契约。
//!
//! ## 契约声明
//! * **Contract-only：** 本模块只定义“把派发任务交给另一个执行上下文”的能力，
//!   线程池、Tokio 等具体实现位于 `serve-router`；
//! * **不阻塞：** `spawn` 只允许做入队级别的工作，调用线程不得等待任务完成；
//! * **丢弃语义：** 执行器若在任务完成前丢弃任务，调用方会收到
//!   [`ServeError::ExecutorUnavailable`](crate::error::ServeError::ExecutorUnavailable)。

use std::sync::Arc;

use futures::future::BoxFuture;

/// `DispatchExecutor` 承载派发任务的执行上下文。
///
/// # 设计背景（Why）
/// - 路由核心保持运行时中立：同一个 Router 可以挂在 `futures` 线程池、Tokio 运行时
///   或测试用的手动执行器上；
/// - 采用对象安全接口，Router 只持有 `Arc<dyn DispatchExecutor>`。
///
/// # 契约说明（What）
/// - **输入**：已装箱的 `'static + Send` 任务，输出为 `()`，结果由任务内部经兑现器交付；
/// - **后置条件**：返回时任务已入队或已被执行器丢弃，绝不在调用线程上等待远程完成。
pub trait DispatchExecutor: Send + Sync + 'static {
    /// 提交派发任务。
    fn spawn(&self, task: BoxFuture<'static, ()>);
}

impl<E: DispatchExecutor + ?Sized> DispatchExecutor for Arc<E> {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        (**self).spawn(task)
    }
}
