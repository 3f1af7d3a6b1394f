//! 可观测性字段名。
//!
//! 路由、控制面与遥测安装共用同一组 `tracing` 字段键，日志检索时无需猜测拼写。

/// 日志字段键。
pub mod keys {
    /// 部署名。
    pub const DEPLOYMENT: &str = "serve.deployment";
    /// 选中的副本标识。
    pub const REPLICA: &str = "serve.replica";
    /// 调用的方法名。
    pub const METHOD: &str = "serve.method";
    /// 成员快照修订号。
    pub const REVISION: &str = "serve.membership.revision";
    /// 稳定错误码。
    pub const ERROR_CODE: &str = "error.code";
}
