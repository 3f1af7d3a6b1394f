use std::collections::HashMap;
use std::sync::Arc;

use serve_core::Invocation;
use serve_router::{ReplicaSet, ReplicaSnapshot};

use crate::case::{TckCase, TckSuite};
use crate::stubs::EchoTransport;
use crate::support::inline_router;

const CASES: &[TckCase] = &[
    TckCase {
        name: "two_replicas_alternate",
        test: two_replicas_alternate,
    },
    TckCase {
        name: "rotation_follows_identifier_order",
        test: rotation_follows_identifier_order,
    },
    TckCase {
        name: "concurrent_picks_lose_no_increment",
        test: concurrent_picks_lose_no_increment,
    },
];

const SUITE: TckSuite = TckSuite {
    name: "round_robin",
    cases: CASES,
};

/// 返回“轮询选择”主题的测试套件。
pub const fn suite() -> &'static TckSuite {
    &SUITE
}

/// 两个副本时，三次连续派发依次落在 A、B、A。
fn two_replicas_alternate() {
    let transport = Arc::new(EchoTransport::new());
    let router = inline_router(transport.clone());
    router.set_replica_set(ReplicaSnapshot::from_names(["A", "B"]));

    for _ in 0..3 {
        router
            .dispatch(Invocation::method("m", "x"))
            .expect("合法调用不应同步失败")
            .wait()
            .expect("回显传输不应失败");
    }
    assert_eq!(transport.endpoints(), ["A", "B", "A"]);
}

/// 轮询顺序与推送顺序无关，只取决于副本标识的字典序。
fn rotation_follows_identifier_order() {
    let set = ReplicaSet::new();
    set.update_membership(ReplicaSnapshot::from_names(["r3", "r1", "r2"]));
    let picks: Vec<String> = (0..6)
        .map(|_| set.pick_one().expect("集合非空").replica.to_string())
        .collect();
    assert_eq!(picks, ["r1", "r2", "r3", "r1", "r2", "r3"]);
}

/// 多线程并发选择时每张号码牌只发一次，选择结果的多重集合精确均分。
///
/// # 教案式说明
/// - **意图 (Why)**：游标若使用“读-改-写”非原子实现，会出现重复号码，导致某些副本被多选；
/// - **逻辑 (How)**：8 个线程各选 300 次，总计 2400 次落在 3 个副本上，每个副本恰好 800 次；
/// - **契约 (What)**：任意偏差都意味着递增丢失。
fn concurrent_picks_lose_no_increment() {
    const THREADS: usize = 8;
    const PICKS: usize = 300;

    let set = ReplicaSet::new();
    set.update_membership(ReplicaSnapshot::from_names(["a", "b", "c"]));

    let counts = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    let mut local = HashMap::<String, usize>::new();
                    for _ in 0..PICKS {
                        let pick = set.pick_one().expect("集合非空");
                        *local.entry(pick.replica.to_string()).or_default() += 1;
                    }
                    local
                })
            })
            .collect();

        let mut total = HashMap::<String, usize>::new();
        for worker in workers {
            for (replica, count) in worker.join().expect("选择线程不应 panic") {
                *total.entry(replica).or_default() += count;
            }
        }
        total
    });

    assert_eq!(counts.len(), 3);
    for replica in ["a", "b", "c"] {
        assert_eq!(counts[replica], THREADS * PICKS / 3, "副本 {replica} 的选择次数偏离均分");
    }
}
