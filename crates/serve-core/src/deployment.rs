//! 部署元数据：版本标签与控制面下发的部署描述。
//!
//! 版本只用于与控制面交换元数据时检测陈旧，**不参与**任何路由决策。

use std::{fmt, sync::Arc};

use bytes::Bytes;

use crate::ids::DeploymentName;

/// 部署版本标签，在构造 Handle/Router 时捕获。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeploymentVersion(Arc<str>);

impl DeploymentVersion {
    /// 构造版本标签。
    pub fn new(tag: impl Into<Arc<str>>) -> Self {
        Self(tag.into())
    }

    /// 读取标签字符串。
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 与控制面报告的版本不一致即视为本地陈旧。
    ///
    /// 标签是不透明的，这里只做相等比较，不推断新旧顺序。
    pub fn is_stale_against(&self, authoritative: &DeploymentVersion) -> bool {
        self != authoritative
    }
}

impl fmt::Display for DeploymentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 部署配置中路由侧可见的部分。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeploymentConfig {
    /// 单副本建议的最大并发请求数；路由器仅透出，不据此限流。
    pub max_concurrent_queries: Option<u32>,
    /// 用户自定义配置，对路由器不透明。
    pub user_config: Option<Bytes>,
}

/// 控制面下发的部署描述。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentInfo {
    name: DeploymentName,
    version: DeploymentVersion,
    config: DeploymentConfig,
}

impl DeploymentInfo {
    /// 以名字与版本构造，配置取默认值。
    pub fn new(name: impl Into<DeploymentName>, version: DeploymentVersion) -> Self {
        Self {
            name: name.into(),
            version,
            config: DeploymentConfig::default(),
        }
    }

    /// 替换部署配置。
    pub fn with_config(mut self, config: DeploymentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self) -> &DeploymentName {
        &self.name
    }

    pub fn version(&self) -> &DeploymentVersion {
        &self.version
    }

    pub fn config(&self) -> &DeploymentConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staleness_is_plain_tag_inequality() {
        let v1 = DeploymentVersion::new("v1");
        assert!(!v1.is_stale_against(&DeploymentVersion::new("v1")));
        assert!(v1.is_stale_against(&DeploymentVersion::new("v2")));
    }
}
