#![deny(unsafe_code)]
#![doc = "serve-router: 可热更新的副本集合、轮询路由器与调用方 Handle。"]
#![doc = ""]
#![doc = "读路径零锁（`ArcSwap::load` + 原子游标），写路径整表替换；"]
#![doc = "控制面代理负责健康过滤与版本比对，路由器本身只做选择与派发。"]

pub mod controller;
pub mod executor;
pub mod handle;
pub mod replica_set;
pub mod router;

pub use controller::{ControllerProxy, HealthCheck, MembershipPush};
#[cfg(feature = "tokio")]
pub use executor::TokioExecutor;
pub use executor::ThreadPoolExecutor;
pub use handle::Handle;
pub use replica_set::{Membership, MembershipUpdate, ReplicaPick, ReplicaSet, ReplicaSnapshot};
pub use router::{Router, RouterBuilder, RouterStats};
