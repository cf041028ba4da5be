//! 交易确认等待
//!
//! 提交后按固定间隔查询回执，直到交易上链或次数用尽。
//! 节点不区分"尚未打包"和"永远不会打包"，所以这里只能用次数上限兜底。

use std::time::Duration;

use ethers::types::{TransactionReceipt, TxHash, U64};
use tokio::time::sleep;

use crate::{
    config::ConfirmationConfig,
    error::{EnsError, Result},
    infrastructure::ChainIdentity,
};

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// 默认最多查询次数
pub const DEFAULT_MAX_ATTEMPTS: u32 = 150;

/// 轮询策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// 两次查询之间的间隔
    pub poll_interval: Duration,
    /// 最多查询次数（含第一次）
    pub max_attempts: u32,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl From<&ConfirmationConfig> for ConfirmationPolicy {
    fn from(config: &ConfirmationConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_attempts: config.max_attempts.max(1),
        }
    }
}

/// 交易确认等待器
#[derive(Debug, Clone, Default)]
pub struct ConfirmationWaiter {
    policy: ConfirmationPolicy,
}

impl ConfirmationWaiter {
    pub fn new(policy: ConfirmationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ConfirmationPolicy {
        &self.policy
    }

    /// 等待交易回执
    ///
    /// 返回第一次查到的回执（不检查执行状态）。查询失败记为一次尝试。
    pub async fn await_confirmation(
        &self,
        client: &dyn ChainIdentity,
        tx_hash: TxHash,
    ) -> Result<TransactionReceipt> {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match client.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => {
                    tracing::debug!(
                        tx_hash = ?tx_hash,
                        attempt,
                        block = ?receipt.block_number,
                        "Transaction confirmed"
                    );
                    return Ok(receipt);
                }
                Ok(None) => {
                    tracing::trace!(tx_hash = ?tx_hash, attempt, "Transaction not yet mined");
                }
                Err(e) => {
                    tracing::warn!(
                        tx_hash = ?tx_hash,
                        attempt,
                        error = %e,
                        "Receipt lookup failed, will retry"
                    );
                }
            }

            if attempt < max_attempts {
                sleep(self.policy.poll_interval).await;
            }
        }

        tracing::error!(
            tx_hash = ?tx_hash,
            attempts = max_attempts,
            "Transaction not confirmed within retry budget"
        );

        Err(EnsError::ConfirmationTimeout {
            tx_hash,
            attempts: max_attempts,
        })
    }
}

/// 回执状态为 0 时视为执行失败
pub fn ensure_success(receipt: &TransactionReceipt) -> Result<()> {
    if receipt.status == Some(U64::zero()) {
        return Err(EnsError::TransactionReverted {
            tx_hash: receipt.transaction_hash,
        });
    }
    Ok(())
}
