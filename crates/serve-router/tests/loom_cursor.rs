#![cfg(all(feature = "loom-model", any(loom, serve_loom)))]
//! `ReplicaSet` 轮询游标与快照替换的 Loom 模型检查。
//!
//! 运行方式：`RUSTFLAGS="--cfg serve_loom" cargo test -p serve-router --features loom-model --test loom_cursor`。
//!
//! 在该配置下 `ReplicaSet` 的快照指针、写锁与游标都换成 Loom 原语，穷举调度验证：
//! - 并发选择领取的号码牌互不重复；
//! - 选择只会看到完整的旧快照或完整的新快照，且新快照的游标从零开始；
//! - 并发推送相同成员只产生一次替换。

use loom::{model, sync::Arc, thread};
use serve_router::{ReplicaSet, ReplicaSnapshot};

fn seeded(names: [&'static str; 2]) -> Arc<ReplicaSet> {
    let set = Arc::new(ReplicaSet::new());
    set.update_membership(ReplicaSnapshot::from_names(names));
    set
}

#[test]
fn concurrent_picks_take_distinct_tickets() {
    model(|| {
        let set = seeded(["a", "b"]);

        let pickers: Vec<_> = (0..2)
            .map(|_| {
                let set = Arc::clone(&set);
                thread::spawn(move || set.pick_one().expect("集合非空").replica.to_string())
            })
            .collect();

        let mut picked: Vec<_> = pickers
            .into_iter()
            .map(|picker| picker.join().expect("选择线程不应 panic"))
            .collect();
        picked.sort_unstable();
        assert_eq!(picked, ["a", "b"], "两次并发选择必须覆盖两个副本");
    });
}

#[test]
fn picks_observe_whole_snapshots_during_replacement() {
    model(|| {
        let set = seeded(["old-a", "old-b"]);

        let writer = {
            let set = Arc::clone(&set);
            thread::spawn(move || {
                set.update_membership(ReplicaSnapshot::from_names(["new-a", "new-b"]))
            })
        };
        let reader = {
            let set = Arc::clone(&set);
            thread::spawn(move || set.pick_one().expect("集合非空"))
        };

        let update = writer.join().expect("写线程不应 panic");
        assert!(update.changed);
        assert_eq!(update.revision, 2);

        let pick = reader.join().expect("读线程不应 panic");
        match pick.revision {
            1 => assert!(pick.replica.as_str().starts_with("old-")),
            2 => assert_eq!(pick.replica.as_str(), "new-a", "新快照的第一次选择必须从游标零开始"),
            other => panic!("未知修订号 {other}"),
        }

        let after = set.pick_one().expect("集合非空");
        assert_eq!(after.revision, 2, "替换完成后的选择只能看到新快照");
    });
}

#[test]
fn concurrent_identical_pushes_replace_once() {
    model(|| {
        let set = Arc::new(ReplicaSet::new());

        let pushers: Vec<_> = (0..2)
            .map(|_| {
                let set = Arc::clone(&set);
                thread::spawn(move || {
                    set.update_membership(ReplicaSnapshot::from_names(["a", "b"]))
                        .changed
                })
            })
            .collect();

        let changed = pushers
            .into_iter()
            .map(|pusher| pusher.join().expect("推送线程不应 panic"))
            .filter(|changed| *changed)
            .count();
        assert_eq!(changed, 1, "相同成员只应替换一次");
        assert_eq!(set.revision(), 1);
        assert_eq!(set.pick_one().expect("集合非空").replica.as_str(), "a");
    });
}
