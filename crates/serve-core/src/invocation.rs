//! 逻辑调用单元。
//!
//! # 设计动机（Why）
//! - 路由器只关心“调哪个方法、参数如何展开、载荷是什么”，载荷对路由器完全不透明；
//! - `Invocation` 在 Handle 中构造、在 Router 中补全默认方法名，随后按值移交给传输层，
//!   整个过程不复制载荷（`Bytes` 为引用计数缓冲）。

use bytes::Bytes;
use serde::Deserialize;

use crate::ids::MethodName;

/// 参数签名标记：参数是预先打包为单个对象，还是按位置展开。
///
/// 路由器不解释该标记，只原样转交传输层与副本。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallSignature {
    /// 载荷是一个整体对象，副本直接以其作为唯一参数。
    Packed,
    /// 载荷是按位置编码的参数列表，副本需先展开。
    #[default]
    Expanded,
}

/// 一次逻辑调用。
///
/// # 契约说明（What）
/// - `method` 为 `None` 表示调用部署的默认入口；Router 会在派发前用配置的默认方法名补全；
/// - `payload` 原样透传，路由器不读取、不修改。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    method: Option<MethodName>,
    signature: CallSignature,
    payload: Bytes,
}

impl Invocation {
    /// 构造调用。
    pub fn new(method: Option<MethodName>, signature: CallSignature, payload: Bytes) -> Self {
        Self {
            method,
            signature,
            payload,
        }
    }

    /// 调用默认入口的便捷构造。
    pub fn default_entrypoint(payload: impl Into<Bytes>) -> Self {
        Self::new(None, CallSignature::default(), payload.into())
    }

    /// 指定方法名的便捷构造。
    pub fn method(method: impl Into<MethodName>, payload: impl Into<Bytes>) -> Self {
        Self::new(
            Some(method.into()),
            CallSignature::default(),
            payload.into(),
        )
    }

    /// 替换签名标记。
    pub fn with_signature(mut self, signature: CallSignature) -> Self {
        self.signature = signature;
        self
    }

    /// 目标方法名；`None` 表示默认入口。
    pub fn method_name(&self) -> Option<&MethodName> {
        self.method.as_ref()
    }

    /// 签名标记。
    pub fn signature(&self) -> CallSignature {
        self.signature
    }

    /// 不透明载荷。
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// 若未指定方法名，则以 `default` 补全。
    pub fn resolve_method(mut self, default: &MethodName) -> Self {
        if self.method.is_none() {
            self.method = Some(default.clone());
        }
        self
    }

    /// 拆分为组成部分，供传输实现使用。
    pub fn into_parts(self) -> (Option<MethodName>, CallSignature, Bytes) {
        (self.method, self.signature, self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_method_only_fills_missing_name() {
        let default = MethodName::new("__call__");

        let bare = Invocation::default_entrypoint("x").resolve_method(&default);
        assert_eq!(bare.method_name(), Some(&default));

        let named = Invocation::method("predict", "x").resolve_method(&default);
        assert_eq!(named.method_name().map(MethodName::as_str), Some("predict"));
    }
}
