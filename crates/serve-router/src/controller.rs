//! 控制面代理：部署注册表、句柄签发与成员推送。
//!
//! # 设计动机（Why）
//! - 路由器只认“整表快照”，不感知健康状态与版本；这些控制面关注点集中在代理中处理，
//!   路由热路径保持简单；
//! - 注册表使用 `DashMap` 分片锁，不同部署的推送互不阻塞。
//!
//! # 行为概览（How）
//! 1. [`ControllerProxy::register`] 为部署创建或替换路由器；
//! 2. [`ControllerProxy::get_handle`] 签发绑定该路由器的 [`Handle`]；
//! 3. [`ControllerProxy::push_membership`] 先用 [`HealthCheck`] 过滤快照，再整体替换成员，
//!    若推送所带版本与路由器捕获的版本不一致则记录告警。
//!
//! # 风险提示（Trade-offs）
//! - 推送时先把 `Arc<Router>` 克隆出分片锁再替换成员，避免持锁期间执行写路径；
//! - 版本不一致只告警不拒绝：旧句柄仍可继续服务，是否重建由调用方决定。

use std::{fmt, sync::Arc};

use dashmap::DashMap;
use serve_core::{DeploymentName, DeploymentVersion, ReplicaId, ServeError, codes};
use tracing::{info, warn};

use crate::{
    handle::Handle,
    replica_set::{MembershipUpdate, ReplicaSnapshot},
    router::Router,
};

/// 副本健康探测。
///
/// 实现需保证快速返回；推送路径会对快照中的每个副本同步调用一次。
pub trait HealthCheck: Send + Sync + 'static {
    fn is_healthy(&self, replica: &ReplicaId) -> bool;
}

impl<F> HealthCheck for F
where
    F: Fn(&ReplicaId) -> bool + Send + Sync + 'static,
{
    fn is_healthy(&self, replica: &ReplicaId) -> bool {
        self(replica)
    }
}

/// 一次成员推送的结果。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MembershipPush {
    /// 副本集合的变更摘要。
    pub update: MembershipUpdate,
    /// 因健康检查失败被剔除的副本（按标识排序）。
    pub excluded_unhealthy: Vec<ReplicaId>,
    /// 推送版本与路由器捕获版本不一致。
    pub stale_version: bool,
}

/// 控制面代理。
#[derive(Default)]
pub struct ControllerProxy {
    routers: DashMap<DeploymentName, Arc<Router>>,
    health: Option<Arc<dyn HealthCheck>>,
}

impl ControllerProxy {
    pub fn new() -> Self {
        Self::default()
    }

    /// 挂载健康探测；未挂载时所有副本视为健康。
    pub fn with_health_check(mut self, health: Arc<dyn HealthCheck>) -> Self {
        self.health = Some(health);
        self
    }

    /// 注册部署的路由器，返回被替换的旧路由器（若有）。
    ///
    /// 旧路由器签发的句柄继续指向旧路由器，不会自动迁移。
    pub fn register(&self, router: Router) -> Option<Arc<Router>> {
        let deployment = router.deployment().clone();
        info!(
            serve.deployment = %deployment,
            version = %router.version(),
            "deployment registered"
        );
        self.routers.insert(deployment, Arc::new(router))
    }

    /// 注销部署。
    pub fn deregister(&self, deployment: &DeploymentName) -> Option<Arc<Router>> {
        self.routers.remove(deployment).map(|(_, router)| router)
    }

    /// 查询部署的路由器。
    pub fn router(&self, deployment: &DeploymentName) -> Option<Arc<Router>> {
        self.routers
            .get(deployment)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// 签发部署句柄。
    pub fn get_handle(&self, deployment: &DeploymentName) -> Result<Handle, ServeError> {
        self.router(deployment)
            .map(Handle::new)
            .ok_or_else(|| ServeError::DeploymentNotFound {
                deployment: deployment.clone(),
            })
    }

    /// 过滤不健康副本后整体替换部署的成员。
    pub fn push_membership(
        &self,
        deployment: &DeploymentName,
        version: &DeploymentVersion,
        mut snapshot: ReplicaSnapshot,
    ) -> Result<MembershipPush, ServeError> {
        let Some(router) = self.router(deployment) else {
            warn!(
                serve.deployment = %deployment,
                error.code = codes::CONTROLLER_DEPLOYMENT_NOT_FOUND,
                "membership pushed for unknown deployment"
            );
            return Err(ServeError::DeploymentNotFound {
                deployment: deployment.clone(),
            });
        };

        let mut excluded_unhealthy = Vec::new();
        if let Some(health) = &self.health {
            snapshot.retain(|id, _| {
                let healthy = health.is_healthy(id);
                if !healthy {
                    excluded_unhealthy.push(id.clone());
                }
                healthy
            });
        }
        if !excluded_unhealthy.is_empty() {
            warn!(
                serve.deployment = %deployment,
                excluded = excluded_unhealthy.len(),
                "unhealthy replicas excluded from membership"
            );
        }

        let stale_version = router.version().is_stale_against(version);
        if stale_version {
            warn!(
                serve.deployment = %deployment,
                version = %version,
                router.version = %router.version(),
                "membership pushed with a different deployment version"
            );
        }

        let update = router.set_replica_set(snapshot);
        Ok(MembershipPush {
            update,
            excluded_unhealthy,
            stale_version,
        })
    }

    /// 已注册部署数。
    pub fn len(&self) -> usize {
        self.routers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }
}

impl fmt::Debug for ControllerProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerProxy")
            .field("deployments", &self.routers.len())
            .field("health_check", &self.health.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;
    use serve_core::{DispatchExecutor, Endpoint, Invocation, Transport, TransportResult};
    use tracing_test::traced_test;

    use super::*;

    struct InlineExecutor;

    impl DispatchExecutor for InlineExecutor {
        fn spawn(&self, task: BoxFuture<'static, ()>) {
            futures::executor::block_on(task);
        }
    }

    struct AddressEcho;

    impl Transport for AddressEcho {
        fn send(&self, endpoint: &Endpoint, _: Invocation) -> BoxFuture<'static, TransportResult> {
            let reply = bytes::Bytes::copy_from_slice(endpoint.address().as_bytes());
            Box::pin(async move { Ok(reply) })
        }
    }

    fn router(name: &str, version: &str) -> Router {
        Router::builder(name, Arc::new(AddressEcho))
            .version(DeploymentVersion::new(version))
            .executor(Arc::new(InlineExecutor))
            .build()
            .expect("路由器应当构造成功")
    }

    #[test]
    fn unknown_deployment_is_reported() {
        let proxy = ControllerProxy::new();
        let name = DeploymentName::new("missing");

        let err = proxy.get_handle(&name).unwrap_err();
        assert_eq!(err.code(), codes::CONTROLLER_DEPLOYMENT_NOT_FOUND);
        let err = proxy
            .push_membership(&name, &DeploymentVersion::new("v1"), ReplicaSnapshot::new())
            .unwrap_err();
        assert_eq!(err, ServeError::DeploymentNotFound { deployment: name });
    }

    #[test]
    fn unhealthy_replicas_are_filtered_before_replacement() {
        let proxy = ControllerProxy::new()
            .with_health_check(Arc::new(|id: &ReplicaId| id.as_str() != "sick"));
        proxy.register(router("echo", "v1"));
        let name = DeploymentName::new("echo");

        let push = proxy
            .push_membership(
                &name,
                &DeploymentVersion::new("v1"),
                ReplicaSnapshot::from_names(["ok", "sick"]),
            )
            .unwrap();
        assert_eq!(push.excluded_unhealthy, [ReplicaId::new("sick")]);
        assert!(!push.stale_version);
        assert_eq!(push.update.added, [ReplicaId::new("ok")]);

        let handle = proxy.get_handle(&name).unwrap();
        for _ in 0..3 {
            let reply = handle.remote("x").unwrap().wait().unwrap();
            assert_eq!(reply.as_ref(), b"ok");
        }
    }

    #[traced_test]
    #[test]
    fn version_mismatch_is_flagged_but_applied() {
        let proxy = ControllerProxy::new();
        proxy.register(router("echo", "v1"));
        let name = DeploymentName::new("echo");

        let push = proxy
            .push_membership(
                &name,
                &DeploymentVersion::new("v2"),
                ReplicaSnapshot::from_names(["a"]),
            )
            .unwrap();
        assert!(push.stale_version);
        assert!(push.update.changed);
        assert!(logs_contain("different deployment version"));

        let handle = proxy.get_handle(&name).unwrap();
        assert!(handle.is_stale(&DeploymentVersion::new("v2")));
    }

    #[test]
    fn re_registration_keeps_old_handles_on_old_router() {
        let proxy = ControllerProxy::new();
        proxy.register(router("echo", "v1"));
        let name = DeploymentName::new("echo");
        let old = proxy.get_handle(&name).unwrap();

        let replaced = proxy.register(router("echo", "v2"));
        assert!(replaced.is_some_and(|r| Arc::ptr_eq(&r, old.router())));
        assert_eq!(proxy.get_handle(&name).unwrap().version().as_str(), "v2");
        assert_eq!(old.version().as_str(), "v1");
        assert_eq!(proxy.len(), 1);
        assert!(proxy.deregister(&name).is_some());
        assert!(proxy.is_empty());
    }
}
