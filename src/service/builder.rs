//! 命名树编排器
//!
//! 按依赖顺序部署注册表、解析器和各级注册器并互相关联。
//! 每笔交易都要等到确认后才提交下一笔：后面的交易依赖前面交易的链上结果
//! （例如节点注册之前不能为它设置解析器）。
//!
//! 调用方负责按顺序调用各操作；任何一步失败都直接返回，已完成的步骤不回滚。

use std::sync::Arc;

use ethers::{
    abi::Token,
    types::{Address, TransactionReceipt, H256},
};

use super::{
    confirmation::{ensure_success, ConfirmationPolicy, ConfirmationWaiter},
    deployer::{ContractDeployer, ContractHandle},
    domain_tree::DomainTree,
    node_token,
    resolution::NameResolver,
};
use crate::{
    config::Config,
    domain::{
        label_hash,
        namehash::{ADDR_LABEL, REVERSE_TLD},
        ContractArtifacts, ContractTemplate, DomainName, TxOptions, TxOverrides,
    },
    error::{EnsError, Result},
    infrastructure::ChainIdentity,
};

/// 零节点在日志和错误中的名称
const ROOT_DOMAIN: &str = "[root]";

/// 编排器参数
#[derive(Debug, Clone)]
pub struct BuilderOptions {
    /// 部署交易默认参数
    pub deploy: TxOptions,
    /// 合约调用交易参数
    pub call: TxOptions,
    pub confirmation: ConfirmationPolicy,
    /// 使用注册器前核对链上所有权
    pub verify_ownership: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            deploy: TxOptions::deploy_defaults(),
            call: TxOptions::call_defaults(),
            confirmation: ConfirmationPolicy::default(),
            verify_ownership: true,
        }
    }
}

impl From<&Config> for BuilderOptions {
    fn from(config: &Config) -> Self {
        Self {
            deploy: config.transactions.deploy_options(),
            call: config.transactions.call_options(),
            confirmation: ConfirmationPolicy::from(&config.confirmation),
            verify_ownership: config.builder.verify_ownership,
        }
    }
}

/// 编排计划中的一步
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapStep {
    Bootstrap,
    RegisterTopLevel(String),
    RegisterReverseRoot,
    RegisterSubdomain { label: String, parent: String },
}

impl BootstrapStep {
    /// bootstrap → 顶级域 → 反向解析 → 子域名
    pub fn standard_plan(label: &str, top_level_domain: &str) -> Vec<BootstrapStep> {
        vec![
            Self::Bootstrap,
            Self::RegisterTopLevel(top_level_domain.to_string()),
            Self::RegisterReverseRoot,
            Self::RegisterSubdomain {
                label: label.to_string(),
                parent: top_level_domain.to_string(),
            },
        ]
    }
}

/// bootstrap 后的核心合约
#[derive(Debug, Clone)]
struct Session {
    registry: ContractHandle,
    root_registrar: ContractHandle,
    resolver: ContractHandle,
}

/// 命名树编排器
///
/// 一个实例驱动一个部署身份，所有操作串行执行（`&mut self`）。
pub struct EnsBuilder {
    deployer: Arc<dyn ChainIdentity>,
    artifacts: ContractArtifacts,
    contract_deployer: ContractDeployer,
    waiter: ConfirmationWaiter,
    options: BuilderOptions,
    session: Option<Session>,
    tree: DomainTree,
}

impl EnsBuilder {
    pub fn new(
        deployer: Arc<dyn ChainIdentity>,
        artifacts: ContractArtifacts,
        options: BuilderOptions,
    ) -> Self {
        // 部署器使用独立的等待器实例，策略相同
        let contract_deployer =
            ContractDeployer::new(options.deploy, ConfirmationWaiter::new(options.confirmation));

        Self {
            deployer,
            artifacts,
            contract_deployer,
            waiter: ConfirmationWaiter::new(options.confirmation),
            options,
            session: None,
            tree: DomainTree::new(),
        }
    }

    pub fn deployer_address(&self) -> Address {
        self.deployer.address()
    }

    pub fn registry_address(&self) -> Option<Address> {
        self.session.as_ref().map(|s| s.registry.address())
    }

    pub fn resolver_address(&self) -> Option<Address> {
        self.session.as_ref().map(|s| s.resolver.address())
    }

    pub fn registry(&self) -> Option<&ContractHandle> {
        self.session.as_ref().map(|s| &s.registry)
    }

    pub fn registrar(&self, domain: &str) -> Option<&ContractHandle> {
        DomainName::parse(domain)
            .ok()
            .and_then(|name| self.tree.registrar(&name))
    }

    pub fn reverse_registrar(&self) -> Option<&ContractHandle> {
        self.tree.reverse_registrar()
    }

    pub fn domain_tree(&self) -> &DomainTree {
        &self.tree
    }

    /// 基于当前注册表的只读解析器（以部署身份发起 eth_call）
    pub fn name_resolver(&self) -> Result<NameResolver> {
        let session = self.session()?;
        Ok(NameResolver::new(
            self.deployer.clone(),
            session.registry.address(),
            &self.artifacts,
        ))
    }

    /// 部署注册表、根注册器（零节点）和共享解析器，并把零节点交给根注册器
    ///
    /// 重复调用会开始新的会话并清空域名树。
    pub async fn bootstrap(&mut self) -> Result<()> {
        tracing::info!(deployer = ?self.deployer.address(), "Bootstrapping naming registry");

        let registry = self
            .deploy(self.artifacts.registry.clone(), &[])
            .await?;
        let root_registrar = self
            .deploy(
                self.artifacts.registrar.clone(),
                &[Token::Address(registry.address()), node_token(H256::zero())],
            )
            .await?;
        let resolver = self
            .deploy(
                self.artifacts.resolver.clone(),
                &[Token::Address(registry.address())],
            )
            .await?;

        self.transact(
            &registry,
            "setOwner",
            &[node_token(H256::zero()), Token::Address(root_registrar.address())],
        )
        .await?;

        tracing::info!(
            registry = ?registry.address(),
            root_registrar = ?root_registrar.address(),
            resolver = ?resolver.address(),
            "Registry bootstrapped"
        );

        self.tree.clear();
        self.session = Some(Session {
            registry,
            root_registrar,
            resolver,
        });
        Ok(())
    }

    /// 注册顶级域并为其部署独立的注册器
    pub async fn register_top_level(&mut self, name: &str) -> Result<ContractHandle> {
        let domain = DomainName::top_level(name)?;
        let root_registrar = self.session()?.root_registrar.clone();
        self.ensure_unregistered(&domain)?;
        if self.options.verify_ownership {
            self.ensure_owner(ROOT_DOMAIN, H256::zero(), &root_registrar)
                .await?;
        }

        self.register_and_delegate(&root_registrar, domain).await
    }

    /// 注册 `reverse` 顶级域，部署反向注册器并把 `addr.reverse` 交给它
    pub async fn register_reverse_root(&mut self) -> Result<ContractHandle> {
        let reverse_tld = self.register_top_level(REVERSE_TLD).await?;

        let (registry, resolver) = {
            let session = self.session()?;
            (session.registry.address(), session.resolver.address())
        };
        let reverse_registrar = self
            .deploy(
                self.artifacts.reverse_registrar.clone(),
                &[Token::Address(registry), Token::Address(resolver)],
            )
            .await?;

        self.register_label(&reverse_tld, ADDR_LABEL, reverse_registrar.address())
            .await?;

        tracing::info!(
            reverse_registrar = ?reverse_registrar.address(),
            "Reverse resolution root registered"
        );

        self.tree.set_reverse_registrar(reverse_registrar.clone());
        Ok(reverse_registrar)
    }

    /// 在已注册的父域名下注册子域名，并为其部署独立的注册器
    pub async fn register_subdomain(
        &mut self,
        label: &str,
        parent_domain: &str,
    ) -> Result<ContractHandle> {
        self.session()?;
        let parent = DomainName::parse(parent_domain)?;
        let domain = parent.child(label)?;
        self.ensure_unregistered(&domain)?;
        let parent_registrar = self.verified_registrar(&parent).await?;

        self.register_and_delegate(&parent_registrar, domain).await
    }

    /// 把 `label.domain` 解析到给定地址
    pub async fn bind_address(&mut self, label: &str, domain: &str, address: Address) -> Result<()> {
        self.session()?;
        let parent = DomainName::parse(domain)?;
        let name = parent.child(label)?;
        self.ensure_unregistered(&name)?;
        let registrar = self.verified_registrar(&parent).await?;

        let node = name.node();
        self.register_label(&registrar, name.label(), self.deployer.address())
            .await?;
        self.point_to_resolver(node).await?;

        let resolver = self.session()?.resolver.clone();
        self.transact(
            &resolver,
            "setAddr",
            &[node_token(node), Token::Address(address)],
        )
        .await?;

        tracing::info!(name = %name, address = ?address, "Address bound");
        self.tree.record_binding(name, address);
        Ok(())
    }

    /// 正向绑定 `label.domain` → identity 地址，并以 identity 身份发布反向记录
    ///
    /// 本次会话已把该名称绑定到同一地址时跳过正向绑定，只发布反向记录。
    pub async fn bind_address_with_reverse(
        &mut self,
        label: &str,
        domain: &str,
        identity: Arc<dyn ChainIdentity>,
    ) -> Result<()> {
        if self.tree.reverse_registrar().is_none() {
            return Err(EnsError::ReverseRegistrarMissing);
        }

        let name = DomainName::parse(domain)?.child(label)?;
        if self.tree.binding(&name) == Some(identity.address()) {
            tracing::info!(name = %name, "Forward binding already in place");
        } else {
            self.bind_address(label, domain, identity.address()).await?;
        }

        self.publish_reverse(name.as_str(), identity).await
    }

    /// 以 identity 身份在反向注册器上登记名称
    pub async fn publish_reverse(&self, name: &str, identity: Arc<dyn ChainIdentity>) -> Result<()> {
        let name = DomainName::parse(name)?;
        let reverse_registrar = self
            .tree
            .reverse_registrar()
            .ok_or(EnsError::ReverseRegistrarMissing)?
            .connect(identity.clone());

        self.transact(&reverse_registrar, "setName", &[Token::String(name.to_string())])
            .await?;

        tracing::info!(name = %name, address = ?identity.address(), "Reverse record published");
        Ok(())
    }

    /// bootstrap → register_top_level → register_reverse_root → register_subdomain
    ///
    /// 返回注册表地址。
    pub async fn bootstrap_with(&mut self, label: &str, top_level_domain: &str) -> Result<Address> {
        self.run_plan(&BootstrapStep::standard_plan(label, top_level_domain))
            .await?;
        self.session().map(|s| s.registry.address())
    }

    /// 按顺序执行计划，遇到第一个失败即停止
    pub async fn run_plan(&mut self, steps: &[BootstrapStep]) -> Result<()> {
        for (index, step) in steps.iter().enumerate() {
            tracing::info!(step = index + 1, total = steps.len(), ?step, "Running bootstrap step");

            let outcome = match step {
                BootstrapStep::Bootstrap => self.bootstrap().await,
                BootstrapStep::RegisterTopLevel(name) => {
                    self.register_top_level(name).await.map(|_| ())
                }
                BootstrapStep::RegisterReverseRoot => self.register_reverse_root().await.map(|_| ()),
                BootstrapStep::RegisterSubdomain { label, parent } => {
                    self.register_subdomain(label, parent).await.map(|_| ())
                }
            };

            if let Err(e) = outcome {
                tracing::error!(step = index + 1, ?step, error = %e, "Bootstrap step failed");
                return Err(e);
            }
        }
        Ok(())
    }

    // ============ 内部步骤 ============

    /// 注册标签 → 设置解析器 → 部署注册器 → 转移节点所有权 → 记入域名树
    async fn register_and_delegate(
        &mut self,
        parent_registrar: &ContractHandle,
        domain: DomainName,
    ) -> Result<ContractHandle> {
        let node = domain.node();

        self.register_label(parent_registrar, domain.label(), self.deployer.address())
            .await?;
        self.point_to_resolver(node).await?;

        let registry = self.session()?.registry.clone();
        let registrar = self
            .deploy(
                self.artifacts.registrar.clone(),
                &[Token::Address(registry.address()), node_token(node)],
            )
            .await?;
        self.transact(
            &registry,
            "setOwner",
            &[node_token(node), Token::Address(registrar.address())],
        )
        .await?;

        tracing::info!(
            domain = %domain,
            node = ?node,
            registrar = ?registrar.address(),
            "Domain registered and delegated"
        );

        self.tree.insert_registrar(domain, registrar.clone());
        Ok(registrar)
    }

    async fn register_label(
        &self,
        registrar: &ContractHandle,
        label: &str,
        owner: Address,
    ) -> Result<TransactionReceipt> {
        self.transact(
            registrar,
            "register",
            &[
                node_token(label_hash(label)),
                Token::Address(owner),
            ],
        )
        .await
    }

    async fn point_to_resolver(&self, node: H256) -> Result<TransactionReceipt> {
        let session = self.session()?;
        self.transact(
            &session.registry,
            "setResolver",
            &[node_token(node), Token::Address(session.resolver.address())],
        )
        .await
    }

    /// 提交并等待确认
    async fn transact(
        &self,
        contract: &ContractHandle,
        method: &str,
        args: &[Token],
    ) -> Result<TransactionReceipt> {
        let tx_hash = contract.submit(method, args, &self.options.call).await?;
        let receipt = self
            .waiter
            .await_confirmation(contract.signer().as_ref(), tx_hash)
            .await?;
        ensure_success(&receipt)?;

        tracing::debug!(
            contract = %contract.kind(),
            method,
            tx_hash = ?tx_hash,
            "Contract call confirmed"
        );
        Ok(receipt)
    }

    async fn deploy(
        &self,
        template: Arc<ContractTemplate>,
        args: &[Token],
    ) -> Result<ContractHandle> {
        self.contract_deployer
            .deploy(self.deployer.clone(), template, args, &TxOverrides::default())
            .await
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(EnsError::NotBootstrapped)
    }

    fn ensure_unregistered(&self, name: &DomainName) -> Result<()> {
        if self.tree.contains(name) {
            return Err(EnsError::AlreadyRegistered(name.to_string()));
        }
        Ok(())
    }

    /// 从域名树取注册器；开启校验时确认它仍是链上节点的所有者
    async fn verified_registrar(&self, domain: &DomainName) -> Result<ContractHandle> {
        let registrar = self
            .tree
            .registrar(domain)
            .cloned()
            .ok_or_else(|| EnsError::UnknownDomain(domain.to_string()))?;

        if self.options.verify_ownership {
            self.ensure_owner(domain.as_str(), domain.node(), &registrar)
                .await?;
        }

        Ok(registrar)
    }

    /// 读取 registry.owner(node)，必须等于给定注册器
    async fn ensure_owner(
        &self,
        domain: &str,
        node: H256,
        registrar: &ContractHandle,
    ) -> Result<()> {
        let registry = &self.session()?.registry;
        let owner = registry
            .query("owner", &[node_token(node)])
            .await?
            .into_iter()
            .next()
            .and_then(Token::into_address)
            .ok_or_else(|| {
                EnsError::Artifact(format!("{}.owner did not return an address", registry.kind()))
            })?;

        if owner != registrar.address() {
            tracing::warn!(
                domain = %domain,
                registrar = ?registrar.address(),
                owner = ?owner,
                "Registrar no longer owns its node"
            );
            return Err(EnsError::InconsistentTree {
                domain: domain.to_string(),
                registrar: registrar.address(),
                owner,
            });
        }
        Ok(())
    }
}
