//! 交易参数
//!
//! 默认值 + 逐字段覆盖：覆盖项中为 Some 的字段替换默认值，None 保留默认值

use ethers::types::TransactionRequest;
use serde::{Deserialize, Serialize};

/// 部署交易默认 Gas 上限
pub const DEFAULT_DEPLOY_GAS_LIMIT: u64 = 8_000_000;
/// 默认 Gas 价格（9 gwei）
pub const DEFAULT_GAS_PRICE: u64 = 9_000_000_000;
/// 合约调用默认 Gas 上限
pub const DEFAULT_CALL_GAS_LIMIT: u64 = 120_000;

/// 交易参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOptions {
    /// 执行成本上限
    pub gas_limit: u64,
    /// 单位 Gas 费率上限（wei）
    pub gas_price: u64,
}

impl TxOptions {
    pub const fn deploy_defaults() -> Self {
        Self {
            gas_limit: DEFAULT_DEPLOY_GAS_LIMIT,
            gas_price: DEFAULT_GAS_PRICE,
        }
    }

    pub const fn call_defaults() -> Self {
        Self {
            gas_limit: DEFAULT_CALL_GAS_LIMIT,
            gas_price: DEFAULT_GAS_PRICE,
        }
    }

    pub fn with_overrides(self, overrides: &TxOverrides) -> Self {
        Self {
            gas_limit: overrides.gas_limit.unwrap_or(self.gas_limit),
            gas_price: overrides.gas_price.unwrap_or(self.gas_price),
        }
    }

    /// 写入交易请求
    pub fn apply(&self, tx: TransactionRequest) -> TransactionRequest {
        tx.gas(self.gas_limit).gas_price(self.gas_price)
    }
}

impl Default for TxOptions {
    fn default() -> Self {
        Self::deploy_defaults()
    }
}

/// 单次调用的参数覆盖
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOverrides {
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u64>,
}

impl TxOverrides {
    pub fn gas_limit(limit: u64) -> Self {
        Self {
            gas_limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn gas_price(price: u64) -> Self {
        Self {
            gas_price: Some(price),
            ..Self::default()
        }
    }
}
