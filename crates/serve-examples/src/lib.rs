//! 示例共用的进程内部署：若干副本共享同一张方法表，按副本名寻址。
//!
//! # 设计动机（Why）
//! - 示例需要一个无需网络即可运行的“集群”，同时充当路由器的传输层与控制面的健康检查；
//! - 每个副本回答固定的三个方法，与控制面下发“副本名集合”的约定一致：端点地址即副本名。
//!
//! # 契约说明（What）
//! - `get_deployment_name` 返回部署名，`whoami` 返回副本名，`check_health` 返回 `ok`；
//! - 未部署或已停止的副本返回 `ConnectionRefused`，未知方法返回 `Remote` 错误；
//! - 只有处于运行态的副本被视为健康。

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::BoxFuture;
use serve_core::{
    DeploymentName, Endpoint, Invocation, ReplicaId, Transport, TransportError, TransportResult,
};
use serve_router::HealthCheck;

struct ReplicaProcess {
    whoami: Bytes,
    running: AtomicBool,
}

/// 单个部署在进程内的全部副本。
pub struct InProcessDeployment {
    name: DeploymentName,
    deployment_bytes: Bytes,
    replicas: DashMap<ReplicaId, Arc<ReplicaProcess>>,
}

impl InProcessDeployment {
    pub fn new(name: impl Into<DeploymentName>) -> Self {
        let name = name.into();
        Self {
            deployment_bytes: Bytes::copy_from_slice(name.as_str().as_bytes()),
            name,
            replicas: DashMap::new(),
        }
    }

    pub fn name(&self) -> &DeploymentName {
        &self.name
    }

    /// 启动 `count` 个副本，命名为 `<部署名>_replica_<序号>`，返回副本名。
    pub fn scale_to(&self, count: usize) -> Vec<ReplicaId> {
        (0..count)
            .map(|index| {
                let id = ReplicaId::new(format!("{}_replica_{index}", self.name));
                self.replicas.insert(
                    id.clone(),
                    Arc::new(ReplicaProcess {
                        whoami: Bytes::copy_from_slice(id.as_str().as_bytes()),
                        running: AtomicBool::new(true),
                    }),
                );
                id
            })
            .collect()
    }

    /// 停止副本；停止后调用被拒绝，健康检查失败。返回副本此前是否在运行。
    pub fn stop(&self, replica: &ReplicaId) -> bool {
        self.replicas
            .get(replica)
            .is_some_and(|process| process.running.swap(false, Ordering::AcqRel))
    }

    fn serve(&self, replica: &ReplicaId, method: &str) -> TransportResult {
        let process = self
            .replicas
            .get(replica)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|process| process.running.load(Ordering::Acquire))
            .ok_or_else(|| TransportError::ConnectionRefused {
                endpoint: replica.to_string(),
            })?;
        match method {
            "get_deployment_name" => Ok(self.deployment_bytes.clone()),
            "whoami" => Ok(process.whoami.clone()),
            "check_health" => Ok(Bytes::from_static(b"ok")),
            other => Err(TransportError::remote(format!("method `{other}` not found"))),
        }
    }
}

impl Transport for InProcessDeployment {
    fn send(&self, endpoint: &Endpoint, invocation: Invocation) -> BoxFuture<'static, TransportResult> {
        let replica = ReplicaId::new(endpoint.address());
        let method = invocation.method_name().map(|name| name.as_str()).unwrap_or_default();
        let result = self.serve(&replica, method);
        Box::pin(async move { result })
    }
}

impl HealthCheck for InProcessDeployment {
    fn is_healthy(&self, replica: &ReplicaId) -> bool {
        self.replicas
            .get(replica)
            .is_some_and(|process| process.running.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(deployment: &InProcessDeployment, replica: &ReplicaId, method: &str) -> TransportResult {
        futures::executor::block_on(
            deployment.send(&Endpoint::new(replica.as_str()), Invocation::method(method, "")),
        )
    }

    #[test]
    fn replicas_answer_fixed_methods() {
        let deployment = InProcessDeployment::new("Quickstart");
        let replicas = deployment.scale_to(2);
        assert_eq!(replicas[1].as_str(), "Quickstart_replica_1");

        let name = call(&deployment, &replicas[0], "get_deployment_name").expect("副本在运行");
        assert_eq!(name.as_ref(), b"Quickstart");
        let whoami = call(&deployment, &replicas[1], "whoami").expect("副本在运行");
        assert_eq!(whoami.as_ref(), b"Quickstart_replica_1");
        assert!(matches!(
            call(&deployment, &replicas[0], "missing"),
            Err(TransportError::Remote { .. })
        ));
    }

    #[test]
    fn stopped_replica_is_refused_and_unhealthy() {
        let deployment = InProcessDeployment::new("Quickstart");
        let replicas = deployment.scale_to(1);
        assert!(deployment.is_healthy(&replicas[0]));

        assert!(deployment.stop(&replicas[0]));
        assert!(!deployment.stop(&replicas[0]), "重复停止返回 false");
        assert!(!deployment.is_healthy(&replicas[0]));
        assert!(matches!(
            call(&deployment, &replicas[0], "whoami"),
            Err(TransportError::ConnectionRefused { .. })
        ));
        assert!(!deployment.is_healthy(&ReplicaId::new("never-deployed")));
    }
}
