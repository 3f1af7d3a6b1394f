//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为路由核心对外暴露的失败语义提供集中定义：无副本可用、传输失败、非法调用三类主错误，
//!   以及取消、执行器不可用、部署未注册等外围错误；
//! - 每个变体都映射到稳定错误码与 [`ErrorCategory`]，上层据此组合重试、熔断或降级，
//!   核心本身从不重试。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，可直接交给 `anyhow` 等框架；
//! - 传输层错误以 `#[source]` 原样保留，不做任何改写或分类；
//! - 错误码遵循 `<领域>.<语义>` 命名约定，定义在 [`codes`] 模块。

use std::borrow::Cow;

use thiserror::Error;

use crate::{
    ids::{DeploymentName, ReplicaId},
    transport::TransportError,
};

/// 稳定错误码集合。
///
/// - 码值一经发布不可修改语义，仅允许追加；
/// - 日志字段 [`crate::observability::keys::ERROR_CODE`] 记录的就是这里的字符串。
pub mod codes {
    /// 副本集合为空，当前无法路由。
    pub const ROUTER_NO_REPLICA: &str = "router.no_replica_available";
    /// 调用在进入异步阶段前被判定为非法。
    pub const ROUTER_INVALID_INVOCATION: &str = "router.invalid_invocation";
    /// 路由器配置校验失败。
    pub const ROUTER_INVALID_CONFIG: &str = "router.invalid_config";
    /// 外部输入的标识为空。
    pub const ROUTER_INVALID_IDENTIFIER: &str = "router.invalid_identifier";
    /// 控制面代理中不存在该部署。
    pub const CONTROLLER_DEPLOYMENT_NOT_FOUND: &str = "controller.deployment_not_found";
    /// 调用方取消了在途调用。
    pub const CALL_CANCELLED: &str = "call.cancelled";
    /// 执行器拒绝接收派发任务（通常已关闭）。
    pub const RUNTIME_EXECUTOR_UNAVAILABLE: &str = "runtime.executor_unavailable";
    /// 传输层超时。
    pub const TRANSPORT_TIMEOUT: &str = "transport.timeout";
    /// 传输层连接被拒绝。
    pub const TRANSPORT_CONNECTION_REFUSED: &str = "transport.connection_refused";
    /// 远端副本执行方法时抛出异常。
    pub const TRANSPORT_REMOTE: &str = "transport.remote";
    /// 传输通道已关闭。
    pub const TRANSPORT_CLOSED: &str = "transport.closed";
    /// 其他传输层 I/O 错误。
    pub const TRANSPORT_IO: &str = "transport.io";
}

/// 错误分类，供上层策略判断是否值得重试。
///
/// # 契约说明（What）
/// - `Retryable`：稍后重试可能成功（如副本集合暂时为空、连接被拒绝）；
/// - `NonRetryable`：重试不会改变结果（如非法调用、远端业务异常）；
/// - `Cancelled`：调用方主动放弃，不应再触发任何补偿。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    Retryable,
    NonRetryable,
    Cancelled,
}

/// 路由核心错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：把“选不到副本”“副本调用失败”“调用本身不合法”区分开，
///   让调用方无需解析字符串即可决定是重试、告警还是直接向上返回 503；
/// - **契约 (What)**：
///   - 除 [`ServeError::InvalidInvocation`] / [`ServeError::InvalidIdentifier`] 外，
///     其余变体都只通过调用 Future 交付，不会从 `dispatch` 同步返回；
///   - [`ServeError::Transport`] 的 `source` 与传输层报告的错误逐字节一致；
/// - **设计权衡 (Trade-offs)**：变体携带 `String`/`Arc<str>` 上下文，牺牲少量分配换取可读诊断。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ServeError {
    /// 派发时副本集合为空。
    #[error("no replica available for deployment `{deployment}`")]
    NoReplicaAvailable { deployment: DeploymentName },

    /// 传输层报告失败，原样透传。
    #[error("transport failure on replica `{replica}`")]
    Transport {
        replica: ReplicaId,
        #[source]
        source: TransportError,
    },

    /// 调用在派发前校验失败，例如策略要求方法名但调用未提供。
    #[error("invalid invocation: {reason}")]
    InvalidInvocation { reason: Cow<'static, str> },

    /// 外部输入的标识为空或纯空白。
    #[error("invalid {kind} identifier `{value}`")]
    InvalidIdentifier { kind: &'static str, value: String },

    /// 路由器配置不合法。
    #[error("invalid router config: {reason}")]
    InvalidConfig { reason: String },

    /// 控制面代理未注册该部署。
    #[error("deployment `{deployment}` is not registered")]
    DeploymentNotFound { deployment: DeploymentName },

    /// 调用方在结果返回前取消了调用。
    #[error("call cancelled before completion")]
    Cancelled,

    /// 执行器拒绝接收派发任务。
    #[error("dispatch executor unavailable: {reason}")]
    ExecutorUnavailable { reason: String },
}

impl ServeError {
    /// 构造非法调用错误。
    pub fn invalid_invocation(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidInvocation {
            reason: reason.into(),
        }
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoReplicaAvailable { .. } => codes::ROUTER_NO_REPLICA,
            Self::Transport { source, .. } => source.code(),
            Self::InvalidInvocation { .. } => codes::ROUTER_INVALID_INVOCATION,
            Self::InvalidConfig { .. } => codes::ROUTER_INVALID_CONFIG,
            Self::InvalidIdentifier { .. } => codes::ROUTER_INVALID_IDENTIFIER,
            Self::DeploymentNotFound { .. } => codes::CONTROLLER_DEPLOYMENT_NOT_FOUND,
            Self::Cancelled => codes::CALL_CANCELLED,
            Self::ExecutorUnavailable { .. } => codes::RUNTIME_EXECUTOR_UNAVAILABLE,
        }
    }

    /// 返回结构化分类。
    ///
    /// 传输错误的分类委托给 [`TransportError::category`]；核心不会据此自动重试。
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NoReplicaAvailable { .. } | Self::ExecutorUnavailable { .. } => {
                ErrorCategory::Retryable
            }
            Self::Transport { source, .. } => source.category(),
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::InvalidInvocation { .. }
            | Self::InvalidConfig { .. }
            | Self::InvalidIdentifier { .. }
            | Self::DeploymentNotFound { .. } => ErrorCategory::NonRetryable,
        }
    }

    /// 是否为“暂时无副本”信号。
    pub fn is_no_replica(&self) -> bool {
        matches!(self, Self::NoReplicaAvailable { .. })
    }

    /// 若为传输失败，返回原始传输错误。
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}
