use std::sync::Arc;

use serve_core::{CallState, Invocation, ServeError};
use serve_router::ReplicaSnapshot;

use crate::case::{TckCase, TckSuite};
use crate::stubs::{EchoTransport, StalledTransport};
use crate::support::{eventually, inline_router, pooled_router};

const CASES: &[TckCase] = &[
    TckCase {
        name: "cancel_releases_transport_and_keeps_selection",
        test: cancel_releases_transport_and_keeps_selection,
    },
    TckCase {
        name: "dropping_future_cancels_in_flight_call",
        test: dropping_future_cancels_in_flight_call,
    },
    TckCase {
        name: "cancel_after_completion_keeps_result",
        test: cancel_after_completion_keeps_result,
    },
];

const SUITE: TckSuite = TckSuite {
    name: "cancellation",
    cases: CASES,
};

/// 返回“取消”主题的测试套件。
pub const fn suite() -> &'static TckSuite {
    &SUITE
}

/// 显式取消后调用以 `Cancelled` 结束，传输 Future 被释放，已选副本不变，轮询位置不回退。
fn cancel_releases_transport_and_keeps_selection() {
    let transport = Arc::new(StalledTransport::new());
    let router = pooled_router(transport.clone());
    router.set_replica_set(ReplicaSnapshot::from_names(["A", "B"]));

    let call = router
        .dispatch(Invocation::method("m", "x"))
        .expect("合法调用");
    assert_eq!(call.replica().map(|id| id.as_str()), Some("A"));
    eventually("调用已送达传输层", || transport.sends() == 1);

    call.cancel();
    call.cancel();
    assert_eq!(call.wait(), Err(ServeError::Cancelled));
    eventually("挂起调用被释放", || transport.dropped() == 1);

    let next = router
        .dispatch(Invocation::method("m", "x"))
        .expect("合法调用");
    assert_eq!(next.replica().map(|id| id.as_str()), Some("B"));
}

/// 丢弃未完成的 Future 等价于取消。
fn dropping_future_cancels_in_flight_call() {
    let transport = Arc::new(StalledTransport::new());
    let router = pooled_router(transport.clone());
    router.set_replica_set(ReplicaSnapshot::from_names(["A"]));

    let call = router
        .dispatch(Invocation::method("m", "x"))
        .expect("合法调用");
    eventually("调用已送达传输层", || transport.sends() == 1);
    drop(call);
    eventually("挂起调用被释放", || transport.dropped() == 1);
}

/// 传输已先行完成时，取消不会覆盖真实结果。
fn cancel_after_completion_keeps_result() {
    let router = inline_router(Arc::new(EchoTransport::new()));
    router.set_replica_set(ReplicaSnapshot::from_names(["A"]));

    let call = router
        .dispatch(Invocation::method("m", "x"))
        .expect("合法调用");
    assert_eq!(call.state(), CallState::Fulfilled);
    call.cancel();
    assert_eq!(call.wait().expect("已完成的结果应保留").as_ref(), b"A");
}
