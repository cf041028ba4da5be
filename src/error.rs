//! 统一错误定义
//!
//! 编排流程中的每一步失败都同步返回给调用方，不做回滚或补偿

use ethers::types::{Address, TxHash};
use thiserror::Error;

use crate::domain::ContractKind;

pub type Result<T, E = EnsError> = std::result::Result<T, E>;

/// 传输层错误（链客户端返回）
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// 节点直接拒绝交易（nonce错误、余额不足、执行revert）
    #[error("transaction rejected: {0}")]
    Rejected(String),
    /// RPC 调用失败
    #[error("rpc error: {0}")]
    Rpc(String),
}

#[derive(Debug, Error)]
pub enum EnsError {
    #[error("transaction {method} rejected: {reason}")]
    Submission { method: String, reason: String },

    #[error("deployment of {contract} failed: {reason}")]
    Deployment {
        contract: ContractKind,
        reason: String,
    },

    /// 超过轮询次数仍未拿到回执（交易可能已被丢弃）
    #[error("transaction {tx_hash:?} not confirmed after {attempts} attempts")]
    ConfirmationTimeout { tx_hash: TxHash, attempts: u32 },

    #[error("transaction {tx_hash:?} reverted")]
    TransactionReverted { tx_hash: TxHash },

    /// 内存中的域名树与链上所有权不一致
    #[error("registrar {registrar:?} for {domain} no longer owns its node (owner is {owner:?})")]
    InconsistentTree {
        domain: String,
        registrar: Address,
        owner: Address,
    },

    #[error("domain {0} is not registered in this session")]
    UnknownDomain(String),

    #[error("name {0} was already registered in this session")]
    AlreadyRegistered(String),

    #[error("invalid name {0:?}")]
    InvalidName(String),

    #[error("registry has not been bootstrapped")]
    NotBootstrapped,

    #[error("reverse registrar has not been deployed")]
    ReverseRegistrarMissing,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("abi error: {0}")]
    Abi(#[from] ethers::abi::Error),

    #[error("artifact error: {0}")]
    Artifact(String),
}

impl EnsError {
    /// 是否为链上交易层面的失败（相对于调用顺序或参数错误）
    pub fn is_transaction_failure(&self) -> bool {
        matches!(
            self,
            Self::Submission { .. }
                | Self::Deployment { .. }
                | Self::ConfirmationTimeout { .. }
                | Self::TransactionReverted { .. }
        )
    }
}
