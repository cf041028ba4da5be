//! 合约部署
//!
//! 提交创建交易（字节码 + 构造参数），等待回执中出现合约地址，返回可调用的句柄。
//! 提交失败不重试，只有回执查询会重试。

use std::{fmt, sync::Arc};

use ethers::{
    abi::Token,
    types::{Address, TransactionRequest, TxHash},
};

use super::confirmation::{ensure_success, ConfirmationWaiter};
use crate::{
    domain::{ContractKind, ContractTemplate, TxOptions, TxOverrides},
    error::{EnsError, Result, TransportError},
    infrastructure::ChainIdentity,
};

/// 已部署合约的句柄：地址 + 接口 + 默认签名身份
#[derive(Clone)]
pub struct ContractHandle {
    address: Address,
    template: Arc<ContractTemplate>,
    signer: Arc<dyn ChainIdentity>,
}

impl ContractHandle {
    /// 绑定到已有地址
    pub fn at(
        address: Address,
        template: Arc<ContractTemplate>,
        signer: Arc<dyn ChainIdentity>,
    ) -> Self {
        Self {
            address,
            template,
            signer,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn kind(&self) -> ContractKind {
        self.template.kind()
    }

    pub fn signer(&self) -> &Arc<dyn ChainIdentity> {
        &self.signer
    }

    /// 换一个签名身份调用同一个合约
    pub fn connect(&self, signer: Arc<dyn ChainIdentity>) -> Self {
        Self {
            address: self.address,
            template: self.template.clone(),
            signer,
        }
    }

    /// 提交一笔调用交易，只返回交易哈希（不等待确认）
    pub async fn submit(
        &self,
        method: &str,
        args: &[Token],
        options: &TxOptions,
    ) -> Result<TxHash, EnsError> {
        let data = self.template.encode_call(method, args)?;
        let tx = options.apply(
            TransactionRequest::new()
                .from(self.signer.address())
                .to(self.address)
                .data(data),
        );

        tracing::debug!(
            contract = %self.kind(),
            address = ?self.address,
            method,
            from = ?self.signer.address(),
            "Submitting contract call"
        );

        self.signer
            .send_transaction(tx)
            .await
            .map_err(|e| EnsError::Submission {
                method: format!("{}.{}", self.kind(), method),
                reason: match e {
                    TransportError::Rejected(reason) | TransportError::Rpc(reason) => reason,
                },
            })
    }

    /// 只读调用并解码返回值
    pub async fn query(&self, method: &str, args: &[Token]) -> Result<Vec<Token>> {
        let data = self.template.encode_call(method, args)?;
        let tx = TransactionRequest::new()
            .from(self.signer.address())
            .to(self.address)
            .data(data);

        let output = self.signer.call(tx).await?;
        self.template.decode_output(method, &output)
    }
}

impl fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractHandle")
            .field("kind", &self.kind())
            .field("address", &self.address)
            .field("signer", &self.signer.address())
            .finish()
    }
}

/// 合约部署器
#[derive(Debug, Clone, Default)]
pub struct ContractDeployer {
    defaults: TxOptions,
    waiter: ConfirmationWaiter,
}

impl ContractDeployer {
    pub fn new(defaults: TxOptions, waiter: ConfirmationWaiter) -> Self {
        Self { defaults, waiter }
    }

    pub fn defaults(&self) -> &TxOptions {
        &self.defaults
    }

    /// 部署合约并等待确认
    pub async fn deploy(
        &self,
        deployer: Arc<dyn ChainIdentity>,
        template: Arc<ContractTemplate>,
        constructor_args: &[Token],
        overrides: &TxOverrides,
    ) -> Result<ContractHandle> {
        let kind = template.kind();
        let options = self.defaults.with_overrides(overrides);
        let data = template.deployment_data(constructor_args)?;
        let tx = options.apply(TransactionRequest::new().from(deployer.address()).data(data));

        tracing::info!(
            contract = %kind,
            deployer = ?deployer.address(),
            gas_limit = options.gas_limit,
            gas_price = options.gas_price,
            "Deploying contract"
        );

        let tx_hash = deployer
            .send_transaction(tx)
            .await
            .map_err(|e| EnsError::Deployment {
                contract: kind,
                reason: e.to_string(),
            })?;

        let receipt = self
            .waiter
            .await_confirmation(deployer.as_ref(), tx_hash)
            .await?;

        ensure_success(&receipt).map_err(|_| EnsError::Deployment {
            contract: kind,
            reason: format!("creation transaction {:?} reverted", tx_hash),
        })?;

        let address = receipt.contract_address.ok_or_else(|| EnsError::Deployment {
            contract: kind,
            reason: format!("receipt for {:?} has no contract address", tx_hash),
        })?;

        tracing::info!(contract = %kind, address = ?address, tx_hash = ?tx_hash, "Contract deployed");

        Ok(ContractHandle::at(address, template, deployer))
    }
}
