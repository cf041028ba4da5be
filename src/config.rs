//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::transaction_options::{
    TxOptions, DEFAULT_CALL_GAS_LIMIT, DEFAULT_DEPLOY_GAS_LIMIT, DEFAULT_GAS_PRICE,
};

/// 应用配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub transactions: TransactionConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub builder: BuilderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 链连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    /// 部署身份私钥（hex）
    #[serde(default)]
    pub deployer_private_key: Option<String>,
}

/// 交易 Gas 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionConfig {
    pub deploy_gas_limit: u64,
    pub deploy_gas_price: u64,
    pub call_gas_limit: u64,
    pub call_gas_price: u64,
}

/// 交易确认轮询配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    pub poll_interval_ms: u64,
    /// 最多查询回执的次数
    pub max_attempts: u32,
}

/// 合约编译产物目录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    pub dir: String,
}

/// 编排器行为
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderConfig {
    /// 使用注册器前先核对链上所有权
    pub verify_ownership: bool,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: std::env::var("ENS_RPC_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8545".into()),
            deployer_private_key: std::env::var("ENS_DEPLOYER_KEY").ok(),
        }
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            deploy_gas_limit: std::env::var("DEPLOY_GAS_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DEPLOY_GAS_LIMIT),
            deploy_gas_price: std::env::var("DEPLOY_GAS_PRICE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_GAS_PRICE),
            call_gas_limit: std::env::var("CALL_GAS_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_CALL_GAS_LIMIT),
            call_gas_price: std::env::var("CALL_GAS_PRICE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_GAS_PRICE),
        }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: std::env::var("CONFIRMATION_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2000),
            max_attempts: std::env::var("CONFIRMATION_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(150), // 2秒 × 150 ≈ 5分钟
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: std::env::var("ENS_ARTIFACTS_DIR").unwrap_or_else(|_| "./abi".into()),
        }
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            verify_ownership: std::env::var("ENS_VERIFY_OWNERSHIP")
                .ok()
                .map(|v| v != "0")
                .unwrap_or(true),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        }
    }
}

impl TransactionConfig {
    pub fn deploy_options(&self) -> TxOptions {
        TxOptions {
            gas_limit: self.deploy_gas_limit,
            gas_price: self.deploy_gas_price,
        }
    }

    pub fn call_options(&self) -> TxOptions {
        TxOptions {
            gas_limit: self.call_gas_limit,
            gas_price: self.call_gas_price,
        }
    }
}

impl ConfirmationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self::default())
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件中出现的段覆盖环境变量）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) if path.as_ref().exists() => Self::from_file(path),
            _ => Self::from_env(),
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if !self.chain.rpc_url.starts_with("http://") && !self.chain.rpc_url.starts_with("https://")
        {
            anyhow::bail!("ENS_RPC_URL must start with http:// or https://");
        }

        if self.transactions.deploy_gas_limit == 0 || self.transactions.call_gas_limit == 0 {
            anyhow::bail!("gas limits must be greater than zero");
        }

        if self.confirmation.poll_interval_ms == 0 {
            anyhow::bail!("CONFIRMATION_POLL_INTERVAL_MS must be greater than zero");
        }

        if self.confirmation.max_attempts == 0 {
            anyhow::bail!("CONFIRMATION_MAX_ATTEMPTS must be greater than zero");
        }

        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        Ok(())
    }
}
