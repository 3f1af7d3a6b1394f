use std::any::Any;
use std::panic;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serve_core::{DeploymentVersion, DispatchExecutor, Transport};
use serve_router::{Router, ThreadPoolExecutor};

use crate::stubs::InlineExecutor;

/// 把用例 panic 重新抛出为 `套件/用例: 原始信息` 形式的字符串载荷。
pub fn panic_with_context(suite: &str, case: &str, payload: Box<dyn Any + Send>) -> ! {
    panic::resume_unwind(Box::new(format!(
        "{suite}/{case}: {}",
        panic_message(payload.as_ref())
    )));
}

/// 提取 panic 载荷中的文本；`panic!` 只会产生 `&str` 或 `String`，其余载荷原样标注。
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

/// 构造在调用线程上同步完成派发的路由器，派发顺序即完成顺序。
pub fn inline_router(transport: Arc<dyn Transport>) -> Router {
    router_with(transport, Arc::new(InlineExecutor))
}

/// 构造使用真实线程池派发的路由器。
pub fn pooled_router(transport: Arc<dyn Transport>) -> Router {
    let executor = ThreadPoolExecutor::new(2).expect("测试线程池应能创建");
    router_with(transport, Arc::new(executor))
}

fn router_with(transport: Arc<dyn Transport>, executor: Arc<dyn DispatchExecutor>) -> Router {
    Router::builder("tck", transport)
        .version(DeploymentVersion::new("v1"))
        .executor(executor)
        .build()
        .expect("TCK 路由器应当构造成功")
}

/// 在超时前反复检查条件，适用于等待线程池上的异步副作用。
pub fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "等待超时：{what}");
        std::thread::sleep(Duration::from_millis(1));
    }
}
