//! 标识符契约：部署名、副本标识与方法名。
//!
//! # 设计动机（Why）
//! - 消除“字符串即 ID”造成的隐式耦合，部署、副本、方法三类名字各自拥有新类型，避免互相误传；
//! - 底层统一使用 `Arc<str>`，快照替换与调用构造时克隆成本只是一次引用计数；
//! - 派生 `Ord`，使副本集合在快照内拥有确定的字典序，轮询顺序因此可复现。
//!
//! # 集成方式（How）
//! - 测试与示例中直接使用 `::new`；来自控制面或外部输入的名字应经过 `::parse` 校验非空。

use std::{fmt, sync::Arc};

use crate::error::ServeError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            /// 以任意字符串构造标识，不做校验。
            pub fn new(value: impl Into<Arc<str>>) -> Self {
                Self(value.into())
            }

            /// 解析外部输入；空串或纯空白返回 [`ServeError::InvalidIdentifier`]。
            pub fn parse(value: impl Into<Arc<str>>) -> Result<Self, ServeError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(ServeError::InvalidIdentifier {
                        kind: $kind,
                        value: value.to_string(),
                    });
                }
                Ok(Self(value))
            }

            /// 返回底层字符串切片。
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// 部署名：一组可互换副本背后的逻辑服务。
    DeploymentName,
    "deployment"
);

string_id!(
    /// 副本标识：在单个部署的副本集合内唯一且稳定。
    ///
    /// # 契约说明（What）
    /// - 比较与排序按字节序进行，快照内的轮询顺序即此顺序；
    /// - 标识本身不携带地址信息，地址由 [`crate::endpoint::Endpoint`] 承载。
    ReplicaId,
    "replica"
);

string_id!(
    /// 副本上被调用的方法名；缺省时由路由配置决定默认入口。
    MethodName,
    "method"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_blank_identifiers() {
        let err = ReplicaId::parse("   ").expect_err("纯空白不是合法副本标识");
        assert!(matches!(
            err,
            ServeError::InvalidIdentifier {
                kind: "replica",
                ..
            }
        ));
        assert_eq!(DeploymentName::parse("echo").unwrap().as_str(), "echo");
    }

    #[test]
    fn replica_ids_order_lexicographically() {
        let mut ids = vec![ReplicaId::new("b"), ReplicaId::new("a"), ReplicaId::new("c")];
        ids.sort();
        let names: Vec<_> = ids.iter().map(ReplicaId::as_str).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }
}
