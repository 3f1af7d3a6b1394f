//! 常用契约的一站式引入：`use serve_core::prelude::*;`。

pub use crate::{
    Bytes, CallFuture, CallSignature, CallState, DeploymentName, DeploymentVersion,
    DispatchExecutor, Endpoint, Invocation, MethodName, ReplicaId, RouterConfig, ServeError,
    Transport, TransportError,
};
