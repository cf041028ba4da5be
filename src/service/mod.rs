pub mod builder; // 命名树编排
pub mod confirmation; // 交易确认等待
pub mod deployer; // 合约部署 + 合约句柄
pub mod domain_tree; // 本次会话的域名簿记
pub mod resolution; // 只读解析

pub use builder::{BootstrapStep, BuilderOptions, EnsBuilder};
pub use confirmation::{ConfirmationPolicy, ConfirmationWaiter};
pub use deployer::{ContractDeployer, ContractHandle};
pub use domain_tree::DomainTree;
pub use resolution::NameResolver;

use ethers::{abi::Token, types::H256};

/// bytes32 节点参数
pub(crate) fn node_token(node: H256) -> Token {
    Token::FixedBytes(node.as_bytes().to_vec())
}
