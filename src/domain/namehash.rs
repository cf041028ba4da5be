//! 域名与节点哈希
//!
//! node("") = 0x00..00
//! node(label.domain) = keccak256(node(domain) ++ keccak256(label))

use std::fmt;

use ethers::types::{Address, H256};
use sha3::{Digest, Keccak256};

use crate::error::{EnsError, Result};

/// 反向解析分支的顶级域
pub const REVERSE_TLD: &str = "reverse";
/// `addr.reverse` 下的标签
pub const ADDR_LABEL: &str = "addr";
/// 反向解析根域名
pub const ADDR_REVERSE_DOMAIN: &str = "addr.reverse";

fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// 标签哈希：keccak256(utf8(label))
pub fn label_hash(label: &str) -> H256 {
    H256::from(keccak256(label.as_bytes()))
}

/// 计算名称的节点哈希（纯函数，不做规范化）
pub fn node_hash(name: &str) -> H256 {
    if name.is_empty() {
        return H256::zero();
    }

    name.rsplit('.').fold(H256::zero(), |node, label| {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(node.as_bytes());
        buf[32..].copy_from_slice(label_hash(label).as_bytes());
        H256::from(keccak256(&buf))
    })
}

/// 地址的反向解析名称：小写十六进制（无0x前缀）+ ".addr.reverse"
pub fn reverse_name(address: Address) -> String {
    format!("{}.{}", hex::encode(address.as_bytes()), ADDR_REVERSE_DOMAIN)
}

/// 校验过的完整域名，例如 `alex.mylogin.eth`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DomainName(String);

impl DomainName {
    pub fn parse(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(EnsError::InvalidName(name.to_string()));
        }
        let valid = name
            .split('.')
            .all(|label| !label.is_empty() && !label.chars().any(char::is_whitespace));
        if !valid {
            return Err(EnsError::InvalidName(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// 单标签名称（顶级域）
    pub fn top_level(label: &str) -> Result<Self> {
        let name = Self::parse(label)?;
        if !name.is_top_level() {
            return Err(EnsError::InvalidName(label.to_string()));
        }
        Ok(name)
    }

    /// 在当前域名下构造子域名
    pub fn child(&self, label: &str) -> Result<Self> {
        if label.contains('.') {
            return Err(EnsError::InvalidName(label.to_string()));
        }
        Self::parse(&format!("{}.{}", label, self.0))
    }

    /// 最左侧标签
    pub fn label(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// 父域名；顶级域返回 None
    pub fn parent(&self) -> Option<DomainName> {
        self.0
            .split_once('.')
            .map(|(_, parent)| DomainName(parent.to_string()))
    }

    pub fn is_top_level(&self) -> bool {
        !self.0.contains('.')
    }

    pub fn node(&self) -> H256 {
        node_hash(&self.0)
    }

    pub fn label_hash(&self) -> H256 {
        label_hash(self.label())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DomainName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
