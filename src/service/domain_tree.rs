//! 域名树（编排器内存中的簿记）
//!
//! 只记录本次会话注册过的域名及其注册器，不是链上状态的镜像。
//! 链上所有权被转走后，这里的注册器句柄会失效，但不会被删除。

use std::collections::BTreeMap;

use ethers::types::Address;

use super::deployer::ContractHandle;
use crate::domain::{namehash::ADDR_REVERSE_DOMAIN, DomainName};

#[derive(Debug, Default, Clone)]
pub struct DomainTree {
    /// 完整域名 → 该域名的注册器
    registrars: BTreeMap<DomainName, ContractHandle>,
    /// addr.reverse 分支的反向注册器
    reverse_registrar: Option<ContractHandle>,
    /// 本次会话绑定过地址的名称
    bindings: BTreeMap<DomainName, Address>,
}

impl DomainTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registrar(&self, name: &DomainName) -> Option<&ContractHandle> {
        self.registrars.get(name)
    }

    pub fn insert_registrar(&mut self, name: DomainName, registrar: ContractHandle) {
        self.registrars.insert(name, registrar);
    }

    pub fn reverse_registrar(&self) -> Option<&ContractHandle> {
        self.reverse_registrar.as_ref()
    }

    pub fn set_reverse_registrar(&mut self, registrar: ContractHandle) {
        self.reverse_registrar = Some(registrar);
    }

    pub fn binding(&self, name: &DomainName) -> Option<Address> {
        self.bindings.get(name).copied()
    }

    pub fn record_binding(&mut self, name: DomainName, address: Address) {
        self.bindings.insert(name, address);
    }

    /// 名称是否已在本次会话中注册（作为域名、绑定名或 addr.reverse）
    pub fn contains(&self, name: &DomainName) -> bool {
        if self.reverse_registrar.is_some() && name.as_str() == ADDR_REVERSE_DOMAIN {
            return true;
        }
        self.registrars.contains_key(name) || self.bindings.contains_key(name)
    }

    pub fn domains(&self) -> impl Iterator<Item = &DomainName> {
        self.registrars.keys()
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&DomainName, &Address)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.registrars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrars.is_empty()
    }

    pub fn clear(&mut self) {
        self.registrars.clear();
        self.reverse_registrar = None;
        self.bindings.clear();
    }
}
