use std::sync::Arc;
use std::time::{Duration, Instant};

use serve_core::{CallState, Invocation, ServeError, TransportError};
use serve_router::ReplicaSnapshot;

use crate::case::{TckCase, TckSuite};
use crate::stubs::{EchoTransport, FailingTransport, StalledTransport};
use crate::support::{eventually, inline_router, pooled_router};

const CASES: &[TckCase] = &[
    TckCase {
        name: "stalled_transport_does_not_block_dispatch",
        test: stalled_transport_does_not_block_dispatch,
    },
    TckCase {
        name: "transport_error_is_delivered_verbatim",
        test: transport_error_is_delivered_verbatim,
    },
    TckCase {
        name: "missing_method_uses_default_entrypoint",
        test: missing_method_uses_default_entrypoint,
    },
];

const SUITE: TckSuite = TckSuite {
    name: "dispatch",
    cases: CASES,
};

/// 返回“派发”主题的测试套件。
pub const fn suite() -> &'static TckSuite {
    &SUITE
}

/// 传输永不返回时，派发依旧立即返回且 Future 处于 Pending。
fn stalled_transport_does_not_block_dispatch() {
    let transport = Arc::new(StalledTransport::new());
    let router = pooled_router(transport.clone());
    router.set_replica_set(ReplicaSnapshot::from_names(["A", "B"]));

    let started = Instant::now();
    let calls: Vec<_> = (0..16)
        .map(|_| {
            router
                .dispatch(Invocation::method("m", "x"))
                .expect("合法调用不应同步失败")
        })
        .collect();
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "派发不应等待传输完成"
    );
    assert!(calls.iter().all(|call| call.state() == CallState::Pending));

    eventually("所有调用都已送达传输层", || transport.sends() == 16);
    drop(calls);
    eventually("取消后挂起调用被释放", || transport.dropped() == 16);
}

/// 传输层错误原样出现在 `ServeError::Transport` 中。
fn transport_error_is_delivered_verbatim() {
    let original = TransportError::Timeout {
        endpoint: "A".to_owned(),
    };
    let router = inline_router(Arc::new(FailingTransport::new(original.clone())));
    router.set_replica_set(ReplicaSnapshot::from_names(["A"]));

    let err = router
        .dispatch(Invocation::method("m", "x"))
        .expect("合法调用")
        .wait()
        .expect_err("传输失败应经 Future 交付");
    match err {
        ServeError::Transport { replica, source } => {
            assert_eq!(replica.as_str(), "A");
            assert_eq!(source, original);
        }
        other => panic!("期望 Transport 错误，实际为 {other:?}"),
    }
}

/// 未指定方法名的调用以配置的默认入口送达，载荷保持原样。
fn missing_method_uses_default_entrypoint() {
    let transport = Arc::new(EchoTransport::new());
    let router = inline_router(transport.clone());
    router.set_replica_set(ReplicaSnapshot::from_names(["A"]));

    router
        .dispatch(Invocation::default_entrypoint("payload"))
        .expect("合法调用")
        .wait()
        .expect("回显成功");

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method.as_deref(), Some(router.config().default_method.as_str()));
    assert_eq!(calls[0].payload.as_ref(), b"payload");
}
