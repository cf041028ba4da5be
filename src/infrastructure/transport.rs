//! 链客户端接口
//!
//! 一个 `ChainIdentity` = 签名身份 + 它所连接的节点。
//! 编排器只通过这里提交交易、查询回执和执行只读调用。

use std::sync::Arc;

use async_trait::async_trait;
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, Bytes, TransactionReceipt, TransactionRequest, TxHash},
};

use crate::error::TransportError;

#[async_trait]
pub trait ChainIdentity: Send + Sync {
    /// 签名地址
    fn address(&self) -> Address;

    /// 签名并提交交易，返回交易哈希
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, TransportError>;

    /// 查询回执；尚未上链时返回 None
    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, TransportError>;

    /// 只读调用（eth_call）
    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, TransportError>;
}

#[async_trait]
impl<M, S> ChainIdentity for SignerMiddleware<M, S>
where
    M: Middleware + 'static,
    S: Signer + 'static,
{
    fn address(&self) -> Address {
        SignerMiddleware::address(self)
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, TransportError> {
        let pending = Middleware::send_transaction(self, tx, None)
            .await
            .map_err(|e| TransportError::Rejected(e.to_string()))?;
        Ok(pending.tx_hash())
    }

    async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, TransportError> {
        self.get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| TransportError::Rpc(e.to_string()))
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, TransportError> {
        Middleware::call(self, &tx.into(), None)
            .await
            .map_err(|e| TransportError::Rpc(e.to_string()))
    }
}

pub type HttpIdentity = SignerMiddleware<Provider<Http>, LocalWallet>;

/// 通过 HTTP RPC 连接一个私钥身份，链ID从节点读取
pub async fn connect_http(
    rpc_url: &str,
    private_key: &str,
) -> Result<Arc<HttpIdentity>, TransportError> {
    let provider = Provider::<Http>::try_from(rpc_url)
        .map_err(|e| TransportError::Rpc(format!("invalid rpc url {}: {}", rpc_url, e)))?;

    let wallet: LocalWallet = private_key
        .trim()
        .trim_start_matches("0x")
        .parse()
        .map_err(|e| TransportError::Rejected(format!("invalid private key: {}", e)))?;

    let client = SignerMiddleware::new_with_provider_chain(provider, wallet)
        .await
        .map_err(|e| TransportError::Rpc(e.to_string()))?;

    tracing::info!(
        rpc = %rpc_url,
        address = ?ChainIdentity::address(&client),
        "Connected chain identity"
    );

    Ok(Arc::new(client))
}
