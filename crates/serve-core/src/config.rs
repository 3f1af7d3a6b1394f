//! 路由器配置。
//!
//! # 设计动机（Why）
//! - 默认方法名、是否强制方法名、默认签名与执行器线程数是路由核心仅有的可调参数，
//!   集中在一个可反序列化的结构中，便于宿主从 TOML 文件或内嵌字符串加载；
//! - 所有字段都有默认值，空文档即合法配置。
//!
//! # 契约说明（What）
//! - [`RouterConfig::from_toml_str`] 解析后立即执行 [`RouterConfig::validate`]；
//! - 校验失败返回 [`ConfigError::Invalid`]，语法错误返回 [`ConfigError::Parse`]。

use serde::Deserialize;
use thiserror::Error;

use crate::{ids::MethodName, invocation::CallSignature};

/// 未显式指定方法名时调用的默认入口。
pub const DEFAULT_METHOD: &str = "__call__";

/// 配置加载错误。
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to parse router config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid router config: {0}")]
    Invalid(&'static str),
}

/// 路由器配置。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// 调用未携带方法名时使用的默认入口。
    pub default_method: String,
    /// 为 `true` 时，未携带方法名的调用在派发前即被拒绝。
    pub require_method: bool,
    /// Handle 未绑定签名时使用的默认签名。
    pub default_signature: CallSignature,
    /// 默认线程池执行器的线程数；`0` 表示交由线程池自行决定（通常为 CPU 数）。
    pub executor_threads: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_method: DEFAULT_METHOD.to_owned(),
            require_method: false,
            default_signature: CallSignature::default(),
            executor_threads: 0,
        }
    }
}

impl RouterConfig {
    /// 从 TOML 文本解析并校验。
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: RouterConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验字段取值。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_method.trim().is_empty() {
            return Err(ConfigError::Invalid("default_method must not be empty"));
        }
        Ok(())
    }

    /// 默认方法名的强类型视图。
    pub fn default_method_name(&self) -> MethodName {
        MethodName::new(self.default_method.as_str())
    }
}
