//! 面向用户的部署句柄。
//!
//! # 设计动机（Why）
//! - 业务代码只关心“调用部署 X 的方法 Y”，不关心副本、端点与轮询；
//! - 句柄是值类型：`with_method` 返回新句柄，原句柄不受影响，可放心在多个任务间复制。
//!
//! # 契约说明（What）
//! - 同一路由器派生出的所有句柄共享同一个 [`ReplicaSet`](crate::ReplicaSet) 与轮询游标；
//! - 句柄本身不做任何缓存，成员变更对已有句柄立即可见。

use std::sync::Arc;

use bytes::Bytes;
use serve_core::{
    CallFuture, CallSignature, DeploymentName, DeploymentVersion, Invocation, MethodName,
    ServeError,
};

use crate::router::Router;

/// 绑定到某个部署的调用句柄。
#[derive(Clone, Debug)]
pub struct Handle {
    router: Arc<Router>,
    method: Option<MethodName>,
    signature: Option<CallSignature>,
}

impl Handle {
    /// 以部署入口方法创建句柄。
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            method: None,
            signature: None,
        }
    }

    /// 返回绑定到指定方法的新句柄，路由器与共享游标保持不变。
    pub fn with_method(&self, method: impl Into<MethodName>) -> Self {
        Self {
            router: Arc::clone(&self.router),
            method: Some(method.into()),
            signature: self.signature,
        }
    }

    /// 返回使用指定参数签名的新句柄。
    pub fn with_signature(&self, signature: CallSignature) -> Self {
        Self {
            router: Arc::clone(&self.router),
            method: self.method.clone(),
            signature: Some(signature),
        }
    }

    /// 发起远程调用。
    ///
    /// # 契约说明（What）
    /// - 方法名未设置时由路由器补全为配置的默认入口；
    /// - 签名未设置时使用路由器配置的 `default_signature`；
    /// - 返回值语义与 [`Router::dispatch`] 一致：只有非法调用同步失败。
    pub fn remote(&self, args: impl Into<Bytes>) -> Result<CallFuture, ServeError> {
        let signature = self
            .signature
            .unwrap_or(self.router.config().default_signature);
        let invocation = Invocation::new(self.method.clone(), signature, args.into());
        self.router.dispatch(invocation)
    }

    pub fn deployment(&self) -> &DeploymentName {
        self.router.deployment()
    }

    /// 创建路由器时捕获的部署版本。
    pub fn version(&self) -> &DeploymentVersion {
        self.router.version()
    }

    pub fn method(&self) -> Option<&MethodName> {
        self.method.as_ref()
    }

    pub fn signature(&self) -> Option<CallSignature> {
        self.signature
    }

    /// 与控制面权威版本比较，判断句柄是否指向旧版本部署。
    pub fn is_stale(&self, authoritative: &DeploymentVersion) -> bool {
        self.router.version().is_stale_against(authoritative)
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }
}
