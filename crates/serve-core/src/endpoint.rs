use std::{fmt, sync::Arc};

/// 不透明的传输端点引用。
///
/// # 设计背景（Why）
/// - 路由核心只需要“把调用交给某个地址”，至于地址背后是远程 Actor、TCP 连接还是进程内对象，
///   由 [`crate::transport::Transport`] 的实现自行解释；
/// - 以 `Arc<str>` 承载地址，快照替换时克隆端点只是一次引用计数。
///
/// # 契约说明（What）
/// - `address` 的格式对路由器完全不透明，路由器从不解析；
/// - 按名字推导端点时（见 `ReplicaSnapshot::from_names`），地址即副本名。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    address: Arc<str>,
}

impl Endpoint {
    /// 以地址构造端点。
    pub fn new(address: impl Into<Arc<str>>) -> Self {
        Self {
            address: address.into(),
        }
    }

    /// 读取地址。
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}
