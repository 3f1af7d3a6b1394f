#![deny(unsafe_code)]
#![doc = "serve-core: 副本路由核心契约。"]
#![doc = ""]
#![doc = "本 Crate 只定义契约：标识、部署元数据、逻辑调用、传输与执行器能力、错误域、配置与调用 Future。"]
#![doc = "选择策略、成员快照与 Handle 的实现位于 `serve-router`。"]

pub mod call;
pub mod config;
pub mod deployment;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod ids;
pub mod invocation;
pub mod observability;
pub mod prelude;
pub mod transport;

pub use bytes::Bytes;
pub use call::{CallCompleter, CallFuture, CallResult, CallState};
pub use config::{ConfigError, DEFAULT_METHOD, RouterConfig};
pub use deployment::{DeploymentConfig, DeploymentInfo, DeploymentVersion};
pub use endpoint::Endpoint;
pub use error::{ErrorCategory, ServeError, codes};
pub use executor::DispatchExecutor;
pub use ids::{DeploymentName, MethodName, ReplicaId};
pub use invocation::{CallSignature, Invocation};
pub use transport::{Transport, TransportError, TransportResult};
