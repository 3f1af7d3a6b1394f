//! serve-telemetry：为路由核心安装全局 `tracing` Subscriber。
//!
//! 路由器、控制面代理只通过 `tracing` 宏发事件，不关心输出去向；宿主进程在启动时调用一次
//! [`install`] 即可获得 `fmt + EnvFilter` 的标准输出。

use std::sync::OnceLock;

use tracing::dispatcher;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

/// `RUST_LOG` 未设置时使用的过滤指令。
pub const DEFAULT_DIRECTIVE: &str = "info";

/// 安装状态的全局缓存，确保安装仅执行一次。
static INSTALL_STATE: OnceLock<InstallState> = OnceLock::new();

/// 安装过程可能出现的错误类型。
///
/// # 教案式说明
/// - **意图（Why）**：归纳安装阶段的全部失败路径，便于调用方在启动流程中统一处理；
/// - **契约（What）**：实现 [`std::error::Error`]，可直接交给 `anyhow` 等上层框架。
#[derive(Debug)]
pub enum Error {
    /// `install` 被重复调用。
    AlreadyInstalled,
    /// 外部提前设置了全局 `tracing` Subscriber，无法再次注册。
    SubscriberAlreadySet,
    /// 缺省过滤指令无法解析。
    InvalidDirective(String),
    /// 设置全局 Subscriber 失败的底层错误。
    SetGlobalSubscriber(tracing::dispatcher::SetGlobalDefaultError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::AlreadyInstalled => f.write_str("serve-telemetry 已完成安装，禁止重复调用 install"),
            Error::SubscriberAlreadySet => {
                f.write_str("全局 tracing Subscriber 已存在，serve-telemetry 无法覆盖")
            }
            Error::InvalidDirective(reason) => write!(f, "过滤指令无法解析: {reason}"),
            Error::SetGlobalSubscriber(err) => {
                write!(f, "设置 tracing 全局 Subscriber 失败: {err}")
            }
        }
    }
}

impl std::error::Error for Error {}

/// 安装后保留的状态。
#[derive(Debug)]
struct InstallState {
    directive: String,
}

/// 以 [`DEFAULT_DIRECTIVE`] 为缺省过滤指令安装。
pub fn install() -> Result<(), Error> {
    install_with(DEFAULT_DIRECTIVE)
}

/// 安装 `fmt + EnvFilter` Subscriber。
///
/// # 教案式说明
/// - **意图（Why）**：示例与宿主进程只需一行即可看到路由器的结构化事件
///   （`serve.deployment`、`serve.replica`、`serve.membership.revision` 等字段）；
/// - **逻辑（How）**：
///   1. 检查重复安装与外部已设置的 Subscriber；
///   2. 优先读取 `RUST_LOG`，缺失或无法解析时使用 `default_directive`；
///   3. 组装 `registry + EnvFilter + fmt` 并设置为全局默认；
/// - **契约（What）**：多次调用返回 [`Error::AlreadyInstalled`]；外部已配置 Subscriber 时返回
///   [`Error::SubscriberAlreadySet`]。
pub fn install_with(default_directive: &str) -> Result<(), Error> {
    if INSTALL_STATE.get().is_some() {
        return Err(Error::AlreadyInstalled);
    }
    if dispatcher::has_been_set() {
        return Err(Error::SubscriberAlreadySet);
    }

    let (filter, directive) = build_env_filter(default_directive)?;
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true));
    tracing::subscriber::set_global_default(subscriber).map_err(Error::SetGlobalSubscriber)?;

    INSTALL_STATE
        .set(InstallState { directive })
        .map_err(|_| Error::AlreadyInstalled)
}

/// 已安装时返回生效的过滤指令。
pub fn installed_directive() -> Option<&'static str> {
    INSTALL_STATE.get().map(|state| state.directive.as_str())
}

fn build_env_filter(default_directive: &str) -> Result<(EnvFilter, String), Error> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        let directive = filter.to_string();
        return Ok((filter, directive));
    }
    EnvFilter::try_new(default_directive)
        .map(|filter| (filter, default_directive.to_owned()))
        .map_err(|err| Error::InvalidDirective(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_directive_is_parsed() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let (_, directive) = build_env_filter("serve_router=debug").expect("合法指令");
        assert_eq!(directive, "serve_router=debug");
        assert!(matches!(
            build_env_filter("serve_router=[[["),
            Err(Error::InvalidDirective(_))
        ));
    }
}
