//! 测试辅助模块
//! 内存链：按固定调用接口模拟注册表、FIFS注册器、公共解析器和反向注册器

#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use ens_builder::{
    domain::{node_hash, ContractArtifacts, ContractKind, ContractTemplate},
    infrastructure::ChainIdentity,
    service::{BuilderOptions, ConfirmationPolicy, EnsBuilder},
    TransportError,
};
use ethers::{
    abi::{ParamType, Token},
    types::{
        Address, Bytes, NameOrAddress, TransactionReceipt, TransactionRequest, TxHash, H256, U64,
    },
    utils::keccak256,
};

pub const REGISTRY_CODE: &[u8] = b"mock:ENSRegistry";
pub const REGISTRAR_CODE: &[u8] = b"mock:FIFSRegistrar";
pub const RESOLVER_CODE: &[u8] = b"mock:PublicResolver";
pub const REVERSE_REGISTRAR_CODE: &[u8] = b"mock:ReverseRegistrar";

/// 使用内存链字节码标记的合约模板
pub fn test_artifacts() -> ContractArtifacts {
    ContractArtifacts::new(
        ContractTemplate::new(ContractKind::Registry, REGISTRY_CODE.to_vec()).unwrap(),
        ContractTemplate::new(ContractKind::Registrar, REGISTRAR_CODE.to_vec()).unwrap(),
        ContractTemplate::new(ContractKind::Resolver, RESOLVER_CODE.to_vec()).unwrap(),
        ContractTemplate::new(ContractKind::ReverseRegistrar, REVERSE_REGISTRAR_CODE.to_vec())
            .unwrap(),
    )
}

/// 毫秒级轮询，避免测试等待
pub fn fast_options() -> BuilderOptions {
    BuilderOptions {
        confirmation: ConfirmationPolicy {
            poll_interval: Duration::from_millis(1),
            max_attempts: 20,
        },
        ..BuilderOptions::default()
    }
}

/// 新链 + 部署身份 + 编排器
pub fn setup() -> (Arc<InMemoryChain>, Arc<TestIdentity>, EnsBuilder) {
    let chain = InMemoryChain::new();
    let deployer = chain.identity(1);
    let builder = EnsBuilder::new(deployer.clone(), test_artifacts(), fast_options());
    (chain, deployer, builder)
}

fn hash_pair(node: H256, label: H256) -> H256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(node.as_bytes());
    buf[32..].copy_from_slice(label.as_bytes());
    H256::from(keccak256(buf))
}

fn as_h256(token: &Token) -> H256 {
    match token {
        Token::FixedBytes(bytes) => H256::from_slice(bytes),
        other => panic!("expected bytes32, got {other:?}"),
    }
}

fn as_address(token: &Token) -> Address {
    match token {
        Token::Address(address) => *address,
        other => panic!("expected address, got {other:?}"),
    }
}

fn as_string(token: &Token) -> String {
    match token {
        Token::String(s) => s.clone(),
        other => panic!("expected string, got {other:?}"),
    }
}

enum Contract {
    Registry {
        owners: HashMap<H256, Address>,
        resolvers: HashMap<H256, Address>,
    },
    Registrar {
        registry: Address,
        node: H256,
    },
    Resolver {
        registry: Address,
        addrs: HashMap<H256, Address>,
        names: HashMap<H256, String>,
    },
    ReverseRegistrar {
        registry: Address,
        resolver: Address,
    },
}

impl Contract {
    fn kind(&self) -> ContractKind {
        match self {
            Contract::Registry { .. } => ContractKind::Registry,
            Contract::Registrar { .. } => ContractKind::Registrar,
            Contract::Resolver { .. } => ContractKind::Resolver,
            Contract::ReverseRegistrar { .. } => ContractKind::ReverseRegistrar,
        }
    }
}

#[derive(Default)]
struct ChainState {
    contracts: HashMap<Address, Contract>,
    receipts: HashMap<TxHash, TransactionReceipt>,
    remaining_polls: HashMap<TxHash, u32>,
    stalled: HashSet<TxHash>,
    next_id: u64,
    confirm_after_polls: u32,
    stall_next: bool,
    revert_next: bool,
    reject_next: Option<String>,
    revert_method: Option<String>,
    empty_next_call: bool,
    log: Vec<String>,
    last_transaction: Option<TransactionRequest>,
}

type Revert = String;

impl ChainState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn registry_owner(&self, registry: Address, node: H256) -> Address {
        match self.contracts.get(&registry) {
            Some(Contract::Registry { owners, .. }) => {
                owners.get(&node).copied().unwrap_or_default()
            }
            _ => Address::zero(),
        }
    }

    fn registry_mut(
        &mut self,
        registry: Address,
    ) -> Result<(&mut HashMap<H256, Address>, &mut HashMap<H256, Address>), Revert> {
        match self.contracts.get_mut(&registry) {
            Some(Contract::Registry { owners, resolvers }) => Ok((owners, resolvers)),
            _ => Err(format!("{registry:?} is not a registry")),
        }
    }

    fn set_subnode_owner(
        &mut self,
        registry: Address,
        caller: Address,
        node: H256,
        label: H256,
        owner: Address,
    ) -> Result<H256, Revert> {
        if self.registry_owner(registry, node) != caller {
            return Err("revert: caller does not own parent node".into());
        }
        let (owners, _) = self.registry_mut(registry)?;
        let subnode = hash_pair(node, label);
        owners.insert(subnode, owner);
        Ok(subnode)
    }

    fn deploy(&mut self, sender: Address, data: &[u8]) -> Result<Address, Revert> {
        let decode = |code: &[u8], params: &[ParamType]| {
            ethers::abi::decode(params, &data[code.len()..]).map_err(|e| e.to_string())
        };

        let contract = if data.starts_with(REGISTRY_CODE) {
            let mut owners = HashMap::new();
            owners.insert(H256::zero(), sender);
            Contract::Registry {
                owners,
                resolvers: HashMap::new(),
            }
        } else if data.starts_with(REGISTRAR_CODE) {
            let args = decode(
                REGISTRAR_CODE,
                &[ParamType::Address, ParamType::FixedBytes(32)],
            )?;
            Contract::Registrar {
                registry: as_address(&args[0]),
                node: as_h256(&args[1]),
            }
        } else if data.starts_with(RESOLVER_CODE) {
            let args = decode(RESOLVER_CODE, &[ParamType::Address])?;
            Contract::Resolver {
                registry: as_address(&args[0]),
                addrs: HashMap::new(),
                names: HashMap::new(),
            }
        } else if data.starts_with(REVERSE_REGISTRAR_CODE) {
            let args = decode(
                REVERSE_REGISTRAR_CODE,
                &[ParamType::Address, ParamType::Address],
            )?;
            Contract::ReverseRegistrar {
                registry: as_address(&args[0]),
                resolver: as_address(&args[1]),
            }
        } else {
            return Err("unknown bytecode".into());
        };

        let address = Address::from_low_u64_be(0xC000 + self.next_id());
        self.log.push(format!("deploy {}", contract.kind()));
        self.contracts.insert(address, contract);
        Ok(address)
    }

    fn decode_call(&self, to: Address, data: &[u8]) -> Result<(ContractKind, String, Vec<Token>), Revert> {
        let kind = self
            .contracts
            .get(&to)
            .map(Contract::kind)
            .ok_or_else(|| format!("no contract at {to:?}"))?;
        if data.len() < 4 {
            return Err("calldata too short".into());
        }
        let abi = kind.builtin_abi().map_err(|e| e.to_string())?;
        let function = abi
            .functions()
            .find(|f| f.short_signature() == data[..4])
            .ok_or_else(|| format!("unknown selector for {kind}"))?;
        let args = function.decode_input(&data[4..]).map_err(|e| e.to_string())?;
        Ok((kind, function.name.clone(), args))
    }

    fn transact(&mut self, sender: Address, to: Address, data: &[u8]) -> Result<(), Revert> {
        let (kind, method, args) = self.decode_call(to, data)?;

        match (kind, method.as_str()) {
            (ContractKind::Registry, "setOwner") => {
                let node = as_h256(&args[0]);
                if self.registry_owner(to, node) != sender {
                    return Err("revert: only owner".into());
                }
                self.registry_mut(to)?.0.insert(node, as_address(&args[1]));
            }
            (ContractKind::Registry, "setSubnodeOwner") => {
                self.set_subnode_owner(
                    to,
                    sender,
                    as_h256(&args[0]),
                    as_h256(&args[1]),
                    as_address(&args[2]),
                )?;
            }
            (ContractKind::Registry, "setResolver") => {
                let node = as_h256(&args[0]);
                if self.registry_owner(to, node) != sender {
                    return Err("revert: only owner".into());
                }
                self.registry_mut(to)?.1.insert(node, as_address(&args[1]));
            }
            (ContractKind::Registrar, "register") => {
                let (registry, root) = match self.contracts.get(&to) {
                    Some(Contract::Registrar { registry, node }) => (*registry, *node),
                    _ => unreachable!(),
                };
                let label = as_h256(&args[0]);
                let current = self.registry_owner(registry, hash_pair(root, label));
                if !current.is_zero() && current != sender {
                    return Err("revert: label already taken".into());
                }
                self.set_subnode_owner(registry, to, root, label, as_address(&args[1]))?;
            }
            (ContractKind::Resolver, "setAddr") | (ContractKind::Resolver, "setName") => {
                let node = as_h256(&args[0]);
                let registry = match self.contracts.get(&to) {
                    Some(Contract::Resolver { registry, .. }) => *registry,
                    _ => unreachable!(),
                };
                if self.registry_owner(registry, node) != sender {
                    return Err("revert: not authorised".into());
                }
                if let Some(Contract::Resolver { addrs, names, .. }) = self.contracts.get_mut(&to) {
                    if method == "setAddr" {
                        addrs.insert(node, as_address(&args[1]));
                    } else {
                        names.insert(node, as_string(&args[1]));
                    }
                }
            }
            (ContractKind::ReverseRegistrar, "setName") => {
                let (registry, resolver) = match self.contracts.get(&to) {
                    Some(Contract::ReverseRegistrar { registry, resolver }) => (*registry, *resolver),
                    _ => unreachable!(),
                };
                let addr_reverse = node_hash("addr.reverse");
                let label = H256::from(keccak256(hex::encode(sender.as_bytes())));
                let node = self.set_subnode_owner(registry, to, addr_reverse, label, to)?;
                self.registry_mut(registry)?.1.insert(node, resolver);
                if let Some(Contract::Resolver { names, .. }) = self.contracts.get_mut(&resolver) {
                    names.insert(node, as_string(&args[0]));
                }
                self.registry_mut(registry)?.0.insert(node, sender);
            }
            (kind, method) => return Err(format!("{kind}.{method} is not callable")),
        }

        self.log.push(format!("{kind}.{method}"));
        Ok(())
    }

    fn view(&self, to: Address, data: &[u8]) -> Result<Vec<Token>, Revert> {
        let (_, method, args) = self.decode_call(to, data)?;
        let contract = self.contracts.get(&to).ok_or("no contract")?;

        let output = match (contract, method.as_str()) {
            (Contract::Registry { owners, .. }, "owner") => {
                Token::Address(owners.get(&as_h256(&args[0])).copied().unwrap_or_default())
            }
            (Contract::Registry { resolvers, .. }, "resolver") => {
                Token::Address(resolvers.get(&as_h256(&args[0])).copied().unwrap_or_default())
            }
            (Contract::Resolver { addrs, .. }, "addr") => {
                Token::Address(addrs.get(&as_h256(&args[0])).copied().unwrap_or_default())
            }
            (Contract::Resolver { names, .. }, "name") => {
                Token::String(names.get(&as_h256(&args[0])).cloned().unwrap_or_default())
            }
            (Contract::ReverseRegistrar { resolver, .. }, "defaultResolver") => {
                Token::Address(*resolver)
            }
            (_, method) => return Err(format!("{method} is not a view")),
        };
        Ok(vec![output])
    }
}

/// 内存链
pub struct InMemoryChain {
    state: Mutex<ChainState>,
}

impl InMemoryChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ChainState::default()),
        })
    }

    pub fn identity(self: &Arc<Self>, seed: u64) -> Arc<TestIdentity> {
        Arc::new(TestIdentity {
            address: Address::from_low_u64_be(0xA000 + seed),
            chain: self.clone(),
        })
    }

    /// 之后的交易需要查询 n 次才出现回执
    pub fn set_confirm_after_polls(&self, polls: u32) {
        self.state.lock().unwrap().confirm_after_polls = polls;
    }

    /// 下一笔交易永远不会上链
    pub fn stall_next_transaction(&self) {
        self.state.lock().unwrap().stall_next = true;
    }

    /// 下一笔交易被节点拒绝
    pub fn reject_next_transaction(&self, reason: &str) {
        self.state.lock().unwrap().reject_next = Some(reason.to_string());
    }

    /// 下一笔交易上链但执行失败（status = 0）
    pub fn revert_next_transaction(&self) {
        self.state.lock().unwrap().revert_next = true;
    }

    /// 下一笔调用 `method`（如 "ReverseRegistrar.setName"）的交易上链但执行失败
    pub fn revert_next_call_to(&self, method: &str) {
        self.state.lock().unwrap().revert_method = Some(method.to_string());
    }

    /// 下一次只读调用返回空数据
    pub fn empty_next_call(&self) {
        self.state.lock().unwrap().empty_next_call = true;
    }

    /// 成功执行的交易（部署和调用）
    pub fn submission_log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn last_transaction(&self) -> Option<TransactionRequest> {
        self.state.lock().unwrap().last_transaction.clone()
    }

    pub fn registry_owner(&self, registry: Address, node: H256) -> Address {
        self.state.lock().unwrap().registry_owner(registry, node)
    }

    pub fn registry_resolver(&self, registry: Address, node: H256) -> Address {
        match self.state.lock().unwrap().contracts.get(&registry) {
            Some(Contract::Registry { resolvers, .. }) => {
                resolvers.get(&node).copied().unwrap_or_default()
            }
            _ => Address::zero(),
        }
    }

    /// 绕过合约规则直接改写节点所有者（模拟外部转移）
    pub fn force_owner(&self, registry: Address, node: H256, owner: Address) {
        if let Some(Contract::Registry { owners, .. }) =
            self.state.lock().unwrap().contracts.get_mut(&registry)
        {
            owners.insert(node, owner);
        }
    }

    fn submit(&self, sender: Address, tx: TransactionRequest) -> Result<TxHash, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.last_transaction = Some(tx.clone());

        if let Some(reason) = state.reject_next.take() {
            return Err(TransportError::Rejected(reason));
        }

        let data = tx.data.clone().unwrap_or_default();
        let to = match tx.to {
            Some(NameOrAddress::Address(address)) => Some(address),
            Some(NameOrAddress::Name(name)) => {
                return Err(TransportError::Rejected(format!("unresolved name {name}")))
            }
            None => None,
        };

        let mut reverted = std::mem::take(&mut state.revert_next);
        if let (Some(to), Some(method)) = (to, state.revert_method.clone()) {
            if let Ok((kind, name, _)) = state.decode_call(to, &data) {
                if format!("{kind}.{name}") == method {
                    state.revert_method = None;
                    reverted = true;
                }
            }
        }
        let contract_address = if reverted {
            None
        } else {
            match to {
                None => Some(state.deploy(sender, &data).map_err(TransportError::Rejected)?),
                Some(to) => {
                    state
                        .transact(sender, to, &data)
                        .map_err(TransportError::Rejected)?;
                    None
                }
            }
        };

        let id = state.next_id();
        let tx_hash = H256::from_low_u64_be(id);
        let receipt = TransactionReceipt {
            transaction_hash: tx_hash,
            from: sender,
            to,
            contract_address,
            block_number: Some(U64::from(id)),
            status: Some(if reverted { U64::zero() } else { U64::one() }),
            ..Default::default()
        };
        state.receipts.insert(tx_hash, receipt);

        if std::mem::take(&mut state.stall_next) {
            state.stalled.insert(tx_hash);
        }
        let polls = state.confirm_after_polls;
        state.remaining_polls.insert(tx_hash, polls);

        Ok(tx_hash)
    }

    fn receipt(&self, tx_hash: TxHash) -> Option<TransactionReceipt> {
        let mut state = self.state.lock().unwrap();
        if state.stalled.contains(&tx_hash) {
            return None;
        }
        if let Some(remaining) = state.remaining_polls.get_mut(&tx_hash) {
            if *remaining > 0 {
                *remaining -= 1;
                return None;
            }
        }
        state.receipts.get(&tx_hash).cloned()
    }

    fn view(&self, tx: TransactionRequest) -> Result<Bytes, TransportError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.empty_next_call) {
            return Ok(Bytes::default());
        }
        let to = match tx.to {
            Some(NameOrAddress::Address(address)) => address,
            _ => return Err(TransportError::Rpc("call without target".into())),
        };
        let data = tx.data.unwrap_or_default();
        let tokens = state.view(to, &data).map_err(TransportError::Rpc)?;
        Ok(ethers::abi::encode(&tokens).into())
    }
}

/// 内存链上的签名身份
pub struct TestIdentity {
    address: Address,
    chain: Arc<InMemoryChain>,
}

#[async_trait]
impl ChainIdentity for TestIdentity {
    fn address(&self) -> Address {
        self.address
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, TransportError> {
        self.chain.submit(self.address, tx)
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, TransportError> {
        Ok(self.chain.receipt(tx_hash))
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, TransportError> {
        self.chain.view(tx)
    }
}
