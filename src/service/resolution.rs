//! 名称解析（只读）
//!
//! 正向：name → registry.resolver(node) → resolver.addr(node)
//! 反向：address → <hex>.addr.reverse → resolver.name(node)，再用正向解析校验
//!
//! 全部是 eth_call，可并发调用。

use std::sync::Arc;

use ethers::{
    abi::Token,
    types::{Address, H256},
};
use futures::future::try_join_all;

use super::{deployer::ContractHandle, node_token};
use crate::{
    domain::{node_hash, reverse_name, ContractArtifacts, ContractTemplate},
    error::Result,
    infrastructure::ChainIdentity,
};

#[derive(Clone)]
pub struct NameResolver {
    registry: ContractHandle,
    resolver_template: Arc<ContractTemplate>,
}

impl NameResolver {
    pub fn new(
        reader: Arc<dyn ChainIdentity>,
        registry: Address,
        artifacts: &ContractArtifacts,
    ) -> Self {
        Self {
            registry: ContractHandle::at(registry, artifacts.registry.clone(), reader),
            resolver_template: artifacts.resolver.clone(),
        }
    }

    pub fn registry_address(&self) -> Address {
        self.registry.address()
    }

    /// 正向解析；未设置解析器或地址记录时返回 None
    pub async fn resolve_name(&self, name: &str) -> Result<Option<Address>> {
        let node = node_hash(name);
        let Some(resolver) = self.resolver_for(node).await? else {
            return Ok(None);
        };

        let address = first_address(resolver.query("addr", &[node_token(node)]).await?);
        Ok(address.filter(|a| !a.is_zero()))
    }

    /// 反向解析；结果必须能正向解析回同一地址
    pub async fn lookup_address(&self, address: Address) -> Result<Option<String>> {
        let node = node_hash(&reverse_name(address));
        let Some(resolver) = self.resolver_for(node).await? else {
            return Ok(None);
        };

        let name = resolver
            .query("name", &[node_token(node)])
            .await?
            .into_iter()
            .next()
            .and_then(Token::into_string)
            .filter(|n| !n.is_empty());

        let Some(name) = name else {
            return Ok(None);
        };

        if self.resolve_name(&name).await? != Some(address) {
            tracing::debug!(
                address = ?address,
                name = %name,
                "Reverse record does not resolve back to the address"
            );
            return Ok(None);
        }

        Ok(Some(name))
    }

    /// 并发解析多个名称，结果顺序与输入一致
    pub async fn resolve_all(&self, names: &[&str]) -> Result<Vec<Option<Address>>> {
        try_join_all(names.iter().map(|name| self.resolve_name(name))).await
    }

    async fn resolver_for(&self, node: H256) -> Result<Option<ContractHandle>> {
        let resolver = first_address(self.registry.query("resolver", &[node_token(node)]).await?)
            .filter(|a| !a.is_zero());

        Ok(resolver.map(|address| {
            ContractHandle::at(
                address,
                self.resolver_template.clone(),
                self.registry.signer().clone(),
            )
        }))
    }
}

fn first_address(tokens: Vec<Token>) -> Option<Address> {
    tokens.into_iter().next().and_then(Token::into_address)
}
