//! 副本集合：单个部署的成员快照与轮询游标。
//!
//! # 设计动机（Why）
//! - 成员快照是路由核心唯一的共享可变状态。采用 `ArcSwap` 持有不可变的 [`Membership`]，
//!   读路径只做一次 `load`，写路径整表替换，任何选择都只会看到某一个完整快照；
//! - 轮询游标作为快照的显式原子字段：每次选择 `fetch_add` 领取一张号码牌，
//!   并发选择不会丢失递增；快照被替换后新快照的游标从零开始，即“相对新快照重置”。
//!
//! # 行为概览（How）
//! 1. 控制面构造 [`ReplicaSnapshot`]（按副本标识排序、去重）；
//! 2. [`ReplicaSet::update_membership`] 在写锁内比较新旧成员，相同则不替换（幂等），
//!    否则递增修订号并 `store` 新快照；
//! 3. [`ReplicaSet::pick_one`] 加载当前快照并按游标取模选出副本；空快照返回 `None`。
//!
//! # 契约说明（What）
//! - `update_membership` 返回后开始的选择只会观测到新快照；已在进行中的选择在旧快照上完成；
//! - 写锁只串行化写者之间的“比较 + 替换”，读者从不加锁。

use std::{collections::BTreeMap, fmt, ops::DerefMut, sync::Arc};

// 启用 `loom-model` 且带 `--cfg loom`/`--cfg serve_loom` 时，快照指针、写锁与游标切换为
// Loom 原语，模型检查直接驱动本模块的 `ReplicaSet`；`Arc` 保持标准实现。
#[cfg(not(all(feature = "loom-model", any(loom, serve_loom))))]
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(all(feature = "loom-model", any(loom, serve_loom)))]
use loom::sync::atomic::{AtomicUsize, Ordering};

use serve_core::{Endpoint, ReplicaId};

/// 控制面推送的成员快照（可变构造体）。
///
/// 同一标识重复出现时以最后一次为准；内部按标识字典序存放，
/// 发布后的 [`Membership`] 顺序即轮询顺序。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplicaSnapshot {
    entries: BTreeMap<ReplicaId, Endpoint>,
}

impl ReplicaSnapshot {
    /// 空快照。
    pub fn new() -> Self {
        Self::default()
    }

    /// 仅凭副本名构造快照，端点地址即副本名。
    ///
    /// 对应控制面只下发“副本名集合”的场景，由传输层按名字解析真实地址。
    pub fn from_names<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<ReplicaId>,
    {
        names
            .into_iter()
            .map(|name| {
                let id = name.into();
                let endpoint = Endpoint::new(id.as_str());
                (id, endpoint)
            })
            .collect()
    }

    /// 追加或覆盖一个副本。
    pub fn with_replica(mut self, id: impl Into<ReplicaId>, endpoint: Endpoint) -> Self {
        self.insert(id.into(), endpoint);
        self
    }

    /// 追加或覆盖一个副本，返回被覆盖的旧端点。
    pub fn insert(&mut self, id: ReplicaId, endpoint: Endpoint) -> Option<Endpoint> {
        self.entries.insert(id, endpoint)
    }

    /// 只保留满足谓词的副本，通常用于剔除不健康副本。
    pub fn retain(&mut self, mut keep: impl FnMut(&ReplicaId, &Endpoint) -> bool) {
        self.entries.retain(|id, endpoint| keep(id, endpoint));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &ReplicaId) -> bool {
        self.entries.contains_key(id)
    }

    /// 按轮询顺序迭代副本标识。
    pub fn ids(&self) -> impl Iterator<Item = &ReplicaId> {
        self.entries.keys()
    }
}

impl FromIterator<(ReplicaId, Endpoint)> for ReplicaSnapshot {
    fn from_iter<T: IntoIterator<Item = (ReplicaId, Endpoint)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// 一次选择的结果：副本标识、端点与所属快照修订号。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicaPick {
    pub replica: ReplicaId,
    pub endpoint: Endpoint,
    pub revision: u64,
}

/// 已发布的不可变成员快照。
pub struct Membership {
    revision: u64,
    replicas: Vec<(ReplicaId, Endpoint)>,
    cursor: AtomicUsize,
}

impl Membership {
    fn new(revision: u64, snapshot: ReplicaSnapshot) -> Self {
        Self {
            revision,
            replicas: snapshot.entries.into_iter().collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// 快照修订号；初始空快照为 0，每次实际替换加一。
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn contains(&self, id: &ReplicaId) -> bool {
        self.endpoint(id).is_some()
    }

    /// 查找副本端点。
    pub fn endpoint(&self, id: &ReplicaId) -> Option<&Endpoint> {
        self.replicas
            .binary_search_by(|(candidate, _)| candidate.cmp(id))
            .ok()
            .map(|index| &self.replicas[index].1)
    }

    /// 按轮询顺序迭代副本标识。
    pub fn ids(&self) -> impl Iterator<Item = &ReplicaId> {
        self.replicas.iter().map(|(id, _)| id)
    }

    /// 领取游标号码牌并选出副本。
    ///
    /// 号码牌在 `usize` 溢出时回绕，回绕点附近的一次轮转可能不均匀，对路由正确性无影响。
    fn pick(&self) -> Option<ReplicaPick> {
        if self.replicas.is_empty() {
            return None;
        }
        let ticket = self.cursor.fetch_add(1, Ordering::Relaxed);
        let (replica, endpoint) = &self.replicas[ticket % self.replicas.len()];
        Some(ReplicaPick {
            replica: replica.clone(),
            endpoint: endpoint.clone(),
            revision: self.revision,
        })
    }

    fn same_members(&self, snapshot: &ReplicaSnapshot) -> bool {
        self.replicas.len() == snapshot.entries.len()
            && self
                .replicas
                .iter()
                .zip(snapshot.entries.iter())
                .all(|((id, endpoint), (next_id, next_endpoint))| {
                    id == next_id && endpoint == next_endpoint
                })
    }
}

impl fmt::Debug for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Membership")
            .field("revision", &self.revision)
            .field("replicas", &self.replicas)
            .finish()
    }
}

/// 一次成员更新的摘要。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MembershipUpdate {
    /// 更新后生效的修订号；未变化时为原修订号。
    pub revision: u64,
    /// 是否实际替换了快照。
    pub changed: bool,
    /// 新增的副本。
    pub added: Vec<ReplicaId>,
    /// 移除的副本。
    pub removed: Vec<ReplicaId>,
}

/// 单个部署的副本集合。
///
/// # 教案式说明
/// - **意图 (Why)**：为 Router 提供“读路径零锁、写路径整表替换”的成员视图；
/// - **契约 (What)**：
///   - 构造时为空快照（修订号 0）；
///   - 成员只会被整体替换，从不增量合并；
///   - 由所属 Router 独占，其他组件只能经 Router 提交快照；
/// - **风险提示 (Trade-offs)**：替换快照会使游标归零，成员变更前后的公平性不作保证。
pub struct ReplicaSet {
    current: SnapshotCell,
    writer: WriterLock,
}

impl ReplicaSet {
    /// 构造空集合。
    pub fn new() -> Self {
        Self {
            current: SnapshotCell::new(Membership::new(0, ReplicaSnapshot::new())),
            writer: WriterLock::new(),
        }
    }

    /// 整体替换成员。
    ///
    /// 与当前成员完全相同的快照不会触发替换，游标与修订号保持不变。
    pub fn update_membership(&self, snapshot: ReplicaSnapshot) -> MembershipUpdate {
        let mut revision = self.writer.lock();
        let current = self.current.load_full();

        if current.same_members(&snapshot) {
            return MembershipUpdate {
                revision: current.revision,
                changed: false,
                added: Vec::new(),
                removed: Vec::new(),
            };
        }

        let added = snapshot
            .ids()
            .filter(|id| !current.contains(id))
            .cloned()
            .collect();
        let removed = current
            .ids()
            .filter(|id| !snapshot.contains(id))
            .cloned()
            .collect();

        *revision += 1;
        self.current
            .store(Arc::new(Membership::new(*revision, snapshot)));

        MembershipUpdate {
            revision: *revision,
            changed: true,
            added,
            removed,
        }
    }

    /// 按轮询策略选出一个副本；集合为空时返回 `None`（不是错误）。
    pub fn pick_one(&self) -> Option<ReplicaPick> {
        self.current.load().pick()
    }

    /// 当前快照。
    pub fn snapshot(&self) -> Arc<Membership> {
        self.current.load_full()
    }

    pub fn revision(&self) -> u64 {
        self.current.load().revision()
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }
}

/// 已发布快照的指针：常规构建为 `ArcSwap`，Loom 模型下为互斥锁保护的 `Arc`。
#[cfg(not(all(feature = "loom-model", any(loom, serve_loom))))]
struct SnapshotCell(arc_swap::ArcSwap<Membership>);

#[cfg(not(all(feature = "loom-model", any(loom, serve_loom))))]
impl SnapshotCell {
    fn new(initial: Membership) -> Self {
        Self(arc_swap::ArcSwap::from_pointee(initial))
    }

    fn load(&self) -> arc_swap::Guard<Arc<Membership>> {
        self.0.load()
    }

    fn load_full(&self) -> Arc<Membership> {
        self.0.load_full()
    }

    fn store(&self, next: Arc<Membership>) {
        self.0.store(next);
    }
}

#[cfg(all(feature = "loom-model", any(loom, serve_loom)))]
struct SnapshotCell(loom::sync::Mutex<Arc<Membership>>);

#[cfg(all(feature = "loom-model", any(loom, serve_loom)))]
impl SnapshotCell {
    fn new(initial: Membership) -> Self {
        Self(loom::sync::Mutex::new(Arc::new(initial)))
    }

    fn load(&self) -> Arc<Membership> {
        self.load_full()
    }

    fn load_full(&self) -> Arc<Membership> {
        let guard = self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn store(&self, next: Arc<Membership>) {
        *self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = next;
    }
}

/// 串行化写者的锁，保护修订号。
#[cfg(not(all(feature = "loom-model", any(loom, serve_loom))))]
struct WriterLock(parking_lot::Mutex<u64>);

#[cfg(not(all(feature = "loom-model", any(loom, serve_loom))))]
impl WriterLock {
    fn new() -> Self {
        Self(parking_lot::Mutex::new(0))
    }

    fn lock(&self) -> impl DerefMut<Target = u64> + '_ {
        self.0.lock()
    }
}

#[cfg(all(feature = "loom-model", any(loom, serve_loom)))]
struct WriterLock(loom::sync::Mutex<u64>);

#[cfg(all(feature = "loom-model", any(loom, serve_loom)))]
impl WriterLock {
    fn new() -> Self {
        Self(loom::sync::Mutex::new(0))
    }

    fn lock(&self) -> impl DerefMut<Target = u64> + '_ {
        self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for ReplicaSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReplicaSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicaSet")
            .field("current", &self.current.load())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(set: &ReplicaSet, picks: usize) -> Vec<String> {
        (0..picks)
            .map(|_| set.pick_one().expect("集合非空").replica.to_string())
            .collect()
    }

    #[test]
    fn empty_set_yields_sentinel() {
        let set = ReplicaSet::new();
        assert!(set.is_empty());
        assert_eq!(set.revision(), 0);
        assert!(set.pick_one().is_none());
    }

    #[test]
    fn round_robin_follows_lexicographic_order() {
        let set = ReplicaSet::new();
        set.update_membership(ReplicaSnapshot::from_names(["c", "a", "b"]));
        assert_eq!(ids(&set, 6), ["a", "b", "c", "a", "b", "c"]);
    }

    #[test]
    fn identical_snapshot_is_idempotent() {
        let set = ReplicaSet::new();
        let first = set.update_membership(ReplicaSnapshot::from_names(["a", "b"]));
        assert!(first.changed);
        assert_eq!(first.revision, 1);
        assert_eq!(ids(&set, 1), ["a"]);

        let again = set.update_membership(ReplicaSnapshot::from_names(["b", "a"]));
        assert!(!again.changed, "相同成员不应替换快照");
        assert_eq!(again.revision, 1);
        assert_eq!(ids(&set, 1), ["b"], "幂等更新不得重置游标");
    }

    #[test]
    fn replacement_resets_cursor_and_reports_diff() {
        let set = ReplicaSet::new();
        set.update_membership(ReplicaSnapshot::from_names(["a", "b", "c"]));
        assert_eq!(ids(&set, 2), ["a", "b"]);

        let update = set.update_membership(ReplicaSnapshot::from_names(["b", "d"]));
        assert_eq!(update.added, [ReplicaId::new("d")]);
        assert_eq!(update.removed, [ReplicaId::new("a"), ReplicaId::new("c")]);
        assert_eq!(ids(&set, 3), ["b", "d", "b"]);
    }

    #[test]
    fn endpoint_change_counts_as_membership_change() {
        let set = ReplicaSet::new();
        set.update_membership(ReplicaSnapshot::new().with_replica("a", Endpoint::new("10.0.0.1")));
        let update = set
            .update_membership(ReplicaSnapshot::new().with_replica("a", Endpoint::new("10.0.0.2")));
        assert!(update.changed);
        assert!(update.added.is_empty() && update.removed.is_empty());
        let pick = set.pick_one().expect("集合非空");
        assert_eq!(pick.endpoint.address(), "10.0.0.2");
        assert_eq!(pick.revision, 2);
    }

    #[test]
    fn in_flight_snapshot_survives_replacement() {
        let set = ReplicaSet::new();
        set.update_membership(ReplicaSnapshot::from_names(["a"]));
        let held = set.snapshot();
        set.update_membership(ReplicaSnapshot::from_names(["b"]));

        assert!(held.contains(&ReplicaId::new("a")), "旧快照对持有者保持完整");
        assert_eq!(ids(&set, 2), ["b", "b"]);
    }
}
