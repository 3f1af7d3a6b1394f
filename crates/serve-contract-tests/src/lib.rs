//! serve 契约测试套件（TCK）入口。
//!
//! # 教案式综述（Why / How / What）
//! - **为什么存在**：路由核心的正确性主要体现在并发与时序契约上（轮询顺序、整表替换、
//!   派发不阻塞、取消语义），这些契约需要对任何 `Transport`/`DispatchExecutor` 组合都成立，
//!   因此集中在独立 crate 中维护，下游实现可一键回归；
//! - **如何集成**：在目标仓库的 `tests` 目录下调用 `run_*` 入口函数，即可将对应套件编译为标准测试；
//!   [`stubs`] 模块同时公开了回显、挂起、失败三类传输替身与进程内副本注册表，供示例与集成测试复用；
//! - **测试对象**：以 `serve-core` 与 `serve-router` 暴露的稳定面为边界。
//!
//! # 契约说明（What）
//! - 所有用例失败时 `panic`，由 `run_suite` 附加“套件/用例”上下文后重新抛出；
//! - 套件内部自行创建执行器与传输替身，无需调用方准备环境。
//!
//! # 风险提示（Trade-offs）
//! - 取消相关用例依赖线程池调度，使用带超时的轮询等待，极端负载下可能偏慢但不会误判。
//!
//! # 模块结构
//! - `case` 模块：用例与套件元信息以及统一执行函数；
//! - `round_robin`、`membership`、`dispatch`、`cancellation`、`handle` 分别实现各主题断言。

mod cancellation;
mod dispatch;
mod handle;
mod membership;
mod round_robin;
mod support;

pub mod stubs;

use case::run_suite;
pub use case::{TckCase, TckSuite};

const ALL_SUITES: [&TckSuite; 5] = [
    round_robin::suite(),
    membership::suite(),
    dispatch::suite(),
    cancellation::suite(),
    handle::suite(),
];

mod case {
    use super::support;
    use std::panic;

    /// 单个 TCK 用例。
    ///
    /// `test` 必须在失败时 `panic`；`name` 会出现在失败信息中。
    #[derive(Clone, Copy)]
    pub struct TckCase {
        /// 用例的人类可读名称。
        pub name: &'static str,
        /// 实际执行的断言逻辑。
        pub test: fn(),
    }

    /// 同一主题的一组 TCK 用例。
    #[derive(Clone, Copy)]
    pub struct TckSuite {
        /// 套件名称，供日志使用。
        pub name: &'static str,
        /// 归属该套件的用例集合，不允许为空。
        pub cases: &'static [TckCase],
    }

    /// 在捕获 panic 的前提下执行整个套件。
    ///
    /// # 教案式说明
    /// - **意图 (Why)**：一旦用例失败即可附加“套件/用例”上下文后重新 panic；
    /// - **逻辑 (How)**：遍历 `cases`，借助 [`panic::catch_unwind`] 捕获 panic，
    ///   再交给 `support::panic_with_context`；
    /// - **契约 (What)**：全部成功时静默返回，任一失败时 panic。
    pub fn run_suite(suite: &TckSuite) {
        assert!(!suite.cases.is_empty(), "TCK 套件不应为空");
        for case in suite.cases {
            let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| (case.test)()));
            if let Err(payload) = outcome {
                support::panic_with_context(suite.name, case.name, payload);
            }
        }
    }
}

/// 返回所有已注册的 TCK 套件，顺序固定。
pub fn all_suites() -> &'static [&'static TckSuite] {
    &ALL_SUITES
}

/// 运行“轮询选择”主题：字典序轮转、两副本交替、并发选择无丢失。
pub fn run_round_robin_suite() {
    run_suite(round_robin::suite());
}

/// 运行“成员替换”主题：整表替换、空集合快速失败、幂等推送。
pub fn run_membership_suite() {
    run_suite(membership::suite());
}

/// 运行“派发”主题：派发不阻塞、错误原样透传、默认方法补全。
pub fn run_dispatch_suite() {
    run_suite(dispatch::suite());
}

/// 运行“取消”主题。
///
/// # 教案式说明
/// - **意图 (Why)**：确认取消只影响在途传输调用，不回滚已经发生的副本选择；
/// - **流程 (How)**：分别覆盖显式 `cancel()`、丢弃 Future 与“完成后取消”三种时序；
/// - **契约 (What)**：执行成功即表示传输 Future 会在取消后被释放，且已完成的结果不会被覆盖。
pub fn run_cancellation_suite() {
    run_suite(cancellation::suite());
}

/// 运行“句柄”主题：控制面签发句柄、绑定方法并完成一次端到端调用。
pub fn run_handle_suite() {
    run_suite(handle::suite());
}

/// 依次运行全部套件。
pub fn run_all_suites() {
    for suite in all_suites() {
        run_suite(suite);
    }
}
