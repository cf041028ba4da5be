//! Domain 模块
//!
//! 域名、节点哈希、合约模板和交易参数

pub mod contracts;
pub mod namehash;
pub mod transaction_options;

pub use contracts::{ContractArtifacts, ContractKind, ContractTemplate};
pub use namehash::{label_hash, node_hash, reverse_name, DomainName};
pub use transaction_options::{TxOptions, TxOverrides};
