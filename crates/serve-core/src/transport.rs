//! 传输协作方契约。
//!
//! ## 契约声明
//! * **Contract-only：** 本模块只定义路由器消费的 `send` 能力，序列化与真实网络收发由外部 RPC 层实现；
//! * **错误透传：** 实现返回的 [`TransportError`] 会被路由器原样包进 `ServeError::Transport`，
//!   路由器不分类、不重试；
//! * **并发模型：** `send` 返回的 Future 由派发执行器驱动，实现不得假设特定运行时。

use std::borrow::Cow;

use bytes::Bytes;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::{
    endpoint::Endpoint,
    error::{ErrorCategory, codes},
    invocation::Invocation,
};

/// 传输层报告的失败。
///
/// # 契约说明（What）
/// - 变体覆盖超时、连接被拒绝、远端异常、通道关闭与其他 I/O 错误；
/// - 超时由传输层自行判定，路由核心不施加任何超时。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    #[error("call to `{endpoint}` timed out")]
    Timeout { endpoint: String },

    #[error("connection to `{endpoint}` refused")]
    ConnectionRefused { endpoint: String },

    /// 副本执行方法时抛出的异常，`message` 为远端描述。
    #[error("remote exception: {message}")]
    Remote { message: Cow<'static, str> },

    #[error("transport closed")]
    Closed,

    #[error("transport i/o error: {message}")]
    Io { message: Cow<'static, str> },
}

impl TransportError {
    /// 构造远端异常。
    pub fn remote(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// 构造 I/O 错误。
    pub fn io(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => codes::TRANSPORT_TIMEOUT,
            Self::ConnectionRefused { .. } => codes::TRANSPORT_CONNECTION_REFUSED,
            Self::Remote { .. } => codes::TRANSPORT_REMOTE,
            Self::Closed => codes::TRANSPORT_CLOSED,
            Self::Io { .. } => codes::TRANSPORT_IO,
        }
    }

    /// 建议分类；仅供上层策略参考。
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Remote { .. } => ErrorCategory::NonRetryable,
            Self::Timeout { .. } | Self::ConnectionRefused { .. } | Self::Closed | Self::Io { .. } => {
                ErrorCategory::Retryable
            }
        }
    }
}

/// 传输调用结果。
pub type TransportResult = Result<Bytes, TransportError>;

/// `Transport` 描述“把一次调用送到某个端点并等待回复”的能力。
///
/// # 教案式说明
/// - **意图 (Why)**：将路由核心与具体 Actor 框架 / RPC 栈解耦，路由器只持有 `Arc<dyn Transport>`；
/// - **契约 (What)**：
///   - `invocation` 的方法名已由路由器补全，签名标记与载荷保持调用方原样；
///   - 返回的 Future 必须是 `'static + Send`，以便移交给派发执行器；
///   - Future 被丢弃即表示调用方放弃结果，实现应尽力中止在途请求；
/// - **风险提示 (Trade-offs)**：`send` 本身应当只做入队级别的同步工作，
///   真正的等待发生在返回的 Future 内，否则会拖慢派发线程。
pub trait Transport: Send + Sync + 'static {
    /// 发送调用并返回等待回复的 Future。
    fn send(&self, endpoint: &Endpoint, invocation: Invocation) -> BoxFuture<'static, TransportResult>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, endpoint: &Endpoint, invocation: Invocation) -> BoxFuture<'static, TransportResult> {
        (**self).send(endpoint, invocation)
    }
}
