use std::sync::Arc;

use bytes::Bytes;
use serve_core::{DeploymentName, DeploymentVersion, ReplicaId, TransportError};
use serve_router::{ControllerProxy, ReplicaSnapshot, Router};

use crate::case::{TckCase, TckSuite};
use crate::stubs::{InlineExecutor, LocalReplica, LocalReplicas};

const CASES: &[TckCase] = &[
    TckCase {
        name: "handle_calls_bound_method_end_to_end",
        test: handle_calls_bound_method_end_to_end,
    },
    TckCase {
        name: "unhealthy_replica_is_never_routed",
        test: unhealthy_replica_is_never_routed,
    },
];

const SUITE: TckSuite = TckSuite {
    name: "handle",
    cases: CASES,
};

/// 返回“句柄”主题的测试套件。
pub const fn suite() -> &'static TckSuite {
    &SUITE
}

const DEPLOYMENT: &str = "HandleTck";

fn deployment_replica(name: &str) -> LocalReplica {
    let deployment = Bytes::copy_from_slice(DEPLOYMENT.as_bytes());
    LocalReplica::new()
        .method("get_deployment_name", move |_| Ok(deployment.clone()))
        .method("check_health", |_| Ok(Bytes::from_static(b"ok")))
        .method("whoami", {
            let name = Bytes::copy_from_slice(name.as_bytes());
            move |_| Ok(name.clone())
        })
}

fn proxy_with(replicas: &Arc<LocalReplicas>) -> ControllerProxy {
    let proxy = ControllerProxy::new().with_health_check(replicas.clone());
    let router = Router::builder(DEPLOYMENT, replicas.clone())
        .version(DeploymentVersion::new("v1"))
        .executor(Arc::new(InlineExecutor))
        .build()
        .expect("路由器应当构造成功");
    proxy.register(router);
    proxy
}

/// 控制面签发句柄、绑定方法、推送副本名集合，远程调用返回部署名。
fn handle_calls_bound_method_end_to_end() {
    let replicas = Arc::new(LocalReplicas::new());
    let replica_name = format!("{DEPLOYMENT}_replica");
    replicas.deploy(replica_name.as_str(), deployment_replica(&replica_name));
    let proxy = proxy_with(&replicas);
    let deployment = DeploymentName::new(DEPLOYMENT);

    let handle = proxy
        .get_handle(&deployment)
        .expect("部署已注册")
        .with_method("get_deployment_name");
    let push = proxy
        .push_membership(
            &deployment,
            &DeploymentVersion::new("v1"),
            ReplicaSnapshot::from_names([replica_name.as_str()]),
        )
        .expect("推送应成功");
    assert!(push.update.changed);
    assert!(push.excluded_unhealthy.is_empty());

    let reply = handle
        .remote(Bytes::new())
        .expect("合法调用")
        .wait()
        .expect("远程调用应成功");
    assert_eq!(reply.as_ref(), DEPLOYMENT.as_bytes());

    let err = handle
        .with_method("no_such_method")
        .remote(Bytes::new())
        .expect("合法调用")
        .wait()
        .expect_err("未知方法应失败");
    assert!(matches!(err.transport_error(), Some(TransportError::Remote { .. })));
}

/// 健康检查失败的副本在推送时被剔除，之后的调用只落在健康副本上。
fn unhealthy_replica_is_never_routed() {
    let replicas = Arc::new(LocalReplicas::new());
    for name in ["r1", "r2"] {
        replicas.deploy(name, deployment_replica(name));
    }
    replicas.set_healthy(&ReplicaId::new("r1"), false);
    let proxy = proxy_with(&replicas);
    let deployment = DeploymentName::new(DEPLOYMENT);

    let push = proxy
        .push_membership(
            &deployment,
            &DeploymentVersion::new("v1"),
            ReplicaSnapshot::from_names(["r1", "r2", "r3"]),
        )
        .expect("推送应成功");
    assert_eq!(
        push.excluded_unhealthy,
        [ReplicaId::new("r1"), ReplicaId::new("r3")]
    );

    let whoami = proxy
        .get_handle(&deployment)
        .expect("部署已注册")
        .with_method("whoami");
    for _ in 0..4 {
        let reply = whoami
            .remote(Bytes::new())
            .expect("合法调用")
            .wait()
            .expect("健康副本应当应答");
        assert_eq!(reply.as_ref(), b"r2");
    }
}
