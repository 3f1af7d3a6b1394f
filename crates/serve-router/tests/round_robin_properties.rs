//! 轮询选择与整表替换的性质验证。
//!
//! # 教案级注释概览
//!
//! - **核心目标 (Why)**：对任意副本名集合与任意更新序列，验证
//!   1. 选择序列严格等于“按标识排序后的循环”；
//!   2. 每次实际替换后的第一次选择总是落在新集合的最小标识上（游标相对新快照重置）；
//!   3. 与当前成员相同的推送既不递增修订号，也不打断轮转。
//! - **设计手法 (How)**：用 `BTreeSet<String>` 作为影子模型，记录“当前成员 + 期望游标”，
//!   与真实 [`ReplicaSet`] 逐步比对。

use std::collections::BTreeSet;

use proptest::prelude::*;
use serve_router::{ReplicaSet, ReplicaSnapshot};

fn replica_names() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-z]{1,4}", 0..6)
}

#[derive(Clone, Debug)]
enum Step {
    Push(BTreeSet<String>),
    Pick,
}

fn steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        prop_oneof![
            1 => replica_names().prop_map(Step::Push),
            4 => Just(Step::Pick),
        ],
        1..40,
    )
}

/// 影子模型：当前成员（有序）与下一次应选的位置。
#[derive(Default)]
struct ShadowSet {
    members: Vec<String>,
    cursor: usize,
    revision: u64,
}

impl ShadowSet {
    fn push(&mut self, names: &BTreeSet<String>) {
        let next: Vec<String> = names.iter().cloned().collect();
        if next != self.members {
            self.members = next;
            self.cursor = 0;
            self.revision += 1;
        }
    }

    fn pick(&mut self) -> Option<String> {
        if self.members.is_empty() {
            return None;
        }
        let picked = self.members[self.cursor % self.members.len()].clone();
        self.cursor += 1;
        Some(picked)
    }
}

proptest! {
    #[test]
    fn picks_cycle_in_identifier_order(names in replica_names(), rounds in 1usize..4) {
        let set = ReplicaSet::new();
        set.update_membership(ReplicaSnapshot::from_names(names.iter().map(String::as_str)));

        let ordered: Vec<&String> = names.iter().collect();
        for index in 0..rounds * ordered.len().max(1) {
            let pick = set.pick_one();
            match ordered.get(index % ordered.len().max(1)) {
                Some(expected) if !ordered.is_empty() => {
                    prop_assert_eq!(pick.map(|p| p.replica.to_string()), Some((*expected).clone()));
                }
                _ => prop_assert!(pick.is_none()),
            }
        }
    }

    #[test]
    fn real_set_matches_shadow_model(steps in steps()) {
        let set = ReplicaSet::new();
        let mut shadow = ShadowSet::default();

        for step in steps {
            match step {
                Step::Push(names) => {
                    let update = set.update_membership(
                        ReplicaSnapshot::from_names(names.iter().map(String::as_str)),
                    );
                    shadow.push(&names);
                    prop_assert_eq!(update.revision, shadow.revision);
                    prop_assert_eq!(set.len(), shadow.members.len());
                }
                Step::Pick => {
                    let actual = set.pick_one().map(|pick| pick.replica.to_string());
                    prop_assert_eq!(actual, shadow.pick());
                }
            }
        }
    }
}
