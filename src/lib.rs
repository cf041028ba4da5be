//! ens-builder - 命名注册表一键部署
//!
//! 在 EVM 链上部署注册表、解析器和分级注册器，绑定名称与地址并发布反向记录，
//! 用于测试和开发环境。

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod service;

// 重新导出常用类型
pub use error::{EnsError, Result, TransportError};
pub use service::{EnsBuilder, NameResolver};

pub mod prelude {
    pub use crate::{
        config::Config,
        domain::{ContractArtifacts, ContractKind, ContractTemplate, DomainName, TxOptions, TxOverrides},
        error::{EnsError, Result},
        infrastructure::ChainIdentity,
        service::{BootstrapStep, BuilderOptions, ContractHandle, EnsBuilder, NameResolver},
    };
}
