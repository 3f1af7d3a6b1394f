use std::sync::Arc;

use serve_core::{Invocation, ServeError};
use serve_router::ReplicaSnapshot;

use crate::case::{TckCase, TckSuite};
use crate::stubs::EchoTransport;
use crate::support::inline_router;

const CASES: &[TckCase] = &[
    TckCase {
        name: "replacement_routes_only_to_new_members",
        test: replacement_routes_only_to_new_members,
    },
    TckCase {
        name: "empty_set_fails_without_touching_transport",
        test: empty_set_fails_without_touching_transport,
    },
    TckCase {
        name: "identical_push_keeps_rotation",
        test: identical_push_keeps_rotation,
    },
];

const SUITE: TckSuite = TckSuite {
    name: "membership",
    cases: CASES,
};

/// 返回“成员替换”主题的测试套件。
pub const fn suite() -> &'static TckSuite {
    &SUITE
}

/// `{A}` 被替换为 `{B}` 后，之后的派发只会到达 B。
fn replacement_routes_only_to_new_members() {
    let transport = Arc::new(EchoTransport::new());
    let router = inline_router(transport.clone());
    router.set_replica_set(ReplicaSnapshot::from_names(["A"]));
    router
        .dispatch(Invocation::method("m", "x"))
        .expect("合法调用")
        .wait()
        .expect("回显成功");

    let update = router.set_replica_set(ReplicaSnapshot::from_names(["B"]));
    assert!(update.changed);
    for _ in 0..4 {
        router
            .dispatch(Invocation::method("m", "x"))
            .expect("合法调用")
            .wait()
            .expect("回显成功");
    }
    assert_eq!(transport.endpoints(), ["A", "B", "B", "B", "B"]);
}

/// 空集合派发立即以 `NoReplicaAvailable` 失败，传输层调用次数为零。
fn empty_set_fails_without_touching_transport() {
    let transport = Arc::new(EchoTransport::new());
    let router = inline_router(transport.clone());

    let call = router
        .dispatch(Invocation::method("m", "x"))
        .expect("空集合不是同步错误");
    assert!(call.replica().is_none());
    let err = call.wait().expect_err("空集合必须失败");
    assert!(matches!(err, ServeError::NoReplicaAvailable { .. }));
    assert_eq!(transport.call_count(), 0);

    router.set_replica_set(ReplicaSnapshot::from_names(["A"]));
    router.set_replica_set(ReplicaSnapshot::new());
    let err = router
        .dispatch(Invocation::method("m", "x"))
        .expect("空集合不是同步错误")
        .wait()
        .expect_err("清空后必须失败");
    assert!(err.is_no_replica());
    assert_eq!(transport.call_count(), 0);
}

/// 相同成员的重复推送不替换快照，轮询位置保持不变。
fn identical_push_keeps_rotation() {
    let transport = Arc::new(EchoTransport::new());
    let router = inline_router(transport.clone());
    router.set_replica_set(ReplicaSnapshot::from_names(["A", "B"]));
    router
        .dispatch(Invocation::method("m", "x"))
        .expect("合法调用")
        .wait()
        .expect("回显成功");

    let update = router.set_replica_set(ReplicaSnapshot::from_names(["B", "A"]));
    assert!(!update.changed);
    router
        .dispatch(Invocation::method("m", "x"))
        .expect("合法调用")
        .wait()
        .expect("回显成功");
    assert_eq!(transport.endpoints(), ["A", "B"]);
}
