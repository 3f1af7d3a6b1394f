use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serve_router::{ReplicaSet, ReplicaSnapshot};

fn snapshot(size: usize) -> ReplicaSnapshot {
    ReplicaSnapshot::from_names((0..size).map(|index| format!("replica-{index:04}")))
}

/// 读路径开销：一次 `ArcSwap::load` + 一次原子递增 + 取模索引。
///
/// # 设计目的（Why）
/// - 派发热路径上唯一的共享状态访问就是 `pick_one`，需要确认其开销与集合大小无关；
/// - 对比单线程与 4 线程争用同一游标的情况，量化原子递增的缓存行竞争。
fn bench_pick_one(c: &mut Criterion) {
    let mut group = c.benchmark_group("pick_one");
    for size in [1usize, 16, 256] {
        let set = ReplicaSet::new();
        set.update_membership(snapshot(size));
        group.bench_with_input(BenchmarkId::new("single_thread", size), &set, |b, set| {
            b.iter(|| black_box(set.pick_one()))
        });
    }

    let shared = Arc::new(ReplicaSet::new());
    shared.update_membership(snapshot(16));
    group.bench_function("contended_4_threads", |b| {
        b.iter(|| {
            std::thread::scope(|scope| {
                for _ in 0..4 {
                    let set = Arc::clone(&shared);
                    scope.spawn(move || {
                        for _ in 0..256 {
                            black_box(set.pick_one());
                        }
                    });
                }
            })
        })
    });
    group.finish();
}

/// 写路径开销：整表替换（含成员比较与差异计算）。
fn bench_update_membership(c: &mut Criterion) {
    let set = ReplicaSet::new();
    let odd = snapshot(64);
    let even = snapshot(65);
    let mut flip = false;
    c.bench_function("update_membership/64", |b| {
        b.iter(|| {
            flip = !flip;
            let next = if flip { odd.clone() } else { even.clone() };
            black_box(set.update_membership(next))
        })
    });
}

criterion_group!(router_benches, bench_pick_one, bench_update_membership);
criterion_main!(router_benches);
