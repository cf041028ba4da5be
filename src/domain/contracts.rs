//! 合约模板
//!
//! 合约内部逻辑不在本 crate 范围内，这里只描述固定的调用接口（ABI）和部署字节码。

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use ethers::{
    abi::{Abi, Token},
    types::Bytes,
};
use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::error::{EnsError, Result};

const REGISTRY_ABI: &[&str] = &[
    "function owner(bytes32 node) view returns (address)",
    "function resolver(bytes32 node) view returns (address)",
    "function setOwner(bytes32 node, address owner)",
    "function setSubnodeOwner(bytes32 node, bytes32 label, address owner)",
    "function setResolver(bytes32 node, address resolver)",
];

const REGISTRAR_ABI: &[&str] = &[
    "constructor(address ensAddr, bytes32 node)",
    "function register(bytes32 label, address owner)",
];

const RESOLVER_ABI: &[&str] = &[
    "constructor(address ensAddr)",
    "function addr(bytes32 node) view returns (address)",
    "function setAddr(bytes32 node, address addr)",
    "function name(bytes32 node) view returns (string)",
    "function setName(bytes32 node, string name)",
];

const REVERSE_REGISTRAR_ABI: &[&str] = &[
    "constructor(address ensAddr, address resolverAddr)",
    "function setName(string name) returns (bytes32)",
    "function node(address addr) view returns (bytes32)",
    "function defaultResolver() view returns (address)",
];

/// 合约种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    /// 根注册表
    Registry,
    /// 先到先得注册器（FIFS）
    Registrar,
    /// 公共解析器
    Resolver,
    /// 反向注册器（addr.reverse）
    ReverseRegistrar,
}

impl ContractKind {
    pub const ALL: [ContractKind; 4] = [
        Self::Registry,
        Self::Registrar,
        Self::Resolver,
        Self::ReverseRegistrar,
    ];

    /// 编译产物名称
    pub fn artifact_name(&self) -> &'static str {
        match self {
            Self::Registry => "ENSRegistry",
            Self::Registrar => "FIFSRegistrar",
            Self::Resolver => "PublicResolver",
            Self::ReverseRegistrar => "ReverseRegistrar",
        }
    }

    /// 内置的调用接口
    pub fn builtin_abi(&self) -> Result<&'static Abi> {
        static REGISTRY: OnceCell<Abi> = OnceCell::new();
        static REGISTRAR: OnceCell<Abi> = OnceCell::new();
        static RESOLVER: OnceCell<Abi> = OnceCell::new();
        static REVERSE_REGISTRAR: OnceCell<Abi> = OnceCell::new();

        let (cell, source) = match self {
            Self::Registry => (&REGISTRY, REGISTRY_ABI),
            Self::Registrar => (&REGISTRAR, REGISTRAR_ABI),
            Self::Resolver => (&RESOLVER, RESOLVER_ABI),
            Self::ReverseRegistrar => (&REVERSE_REGISTRAR, REVERSE_REGISTRAR_ABI),
        };
        cell.get_or_try_init(|| {
            ethers::abi::parse_abi(source)
                .map_err(|e| EnsError::Artifact(format!("{}: {}", self.artifact_name(), e)))
        })
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.artifact_name())
    }
}

/// 可部署的合约模板：接口 + 字节码
#[derive(Debug, Clone)]
pub struct ContractTemplate {
    kind: ContractKind,
    abi: Abi,
    bytecode: Bytes,
}

impl ContractTemplate {
    /// 使用内置接口
    pub fn new(kind: ContractKind, bytecode: impl Into<Bytes>) -> Result<Self> {
        Ok(Self {
            kind,
            abi: kind.builtin_abi()?.clone(),
            bytecode: bytecode.into(),
        })
    }

    pub fn with_abi(kind: ContractKind, abi: Abi, bytecode: impl Into<Bytes>) -> Self {
        Self {
            kind,
            abi,
            bytecode: bytecode.into(),
        }
    }

    /// 只用于读取已部署合约（无字节码）
    pub fn interface_only(kind: ContractKind) -> Result<Self> {
        Self::new(kind, Bytes::default())
    }

    /// 解析编译产物 JSON：`bytecode`（可带0x）+ `interface`/`abi`（数组或JSON字符串）
    pub fn from_artifact_json(kind: ContractKind, json: &str) -> Result<Self> {
        let artifact: ArtifactFile = serde_json::from_str(json)
            .map_err(|e| EnsError::Artifact(format!("{}: {}", kind, e)))?;

        let hex_code = artifact.bytecode.trim();
        let hex_code = hex_code.strip_prefix("0x").unwrap_or(hex_code);
        let bytecode =
            hex::decode(hex_code).map_err(|e| EnsError::Artifact(format!("{}: {}", kind, e)))?;

        let abi = match artifact.interface {
            Some(serde_json::Value::String(raw)) => serde_json::from_str::<Abi>(&raw),
            Some(value) => serde_json::from_value::<Abi>(value),
            None => return Self::new(kind, bytecode),
        }
        .map_err(|e| EnsError::Artifact(format!("{} interface: {}", kind, e)))?;

        Ok(Self::with_abi(kind, abi, bytecode))
    }

    pub fn kind(&self) -> ContractKind {
        self.kind
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    pub fn bytecode(&self) -> &Bytes {
        &self.bytecode
    }

    /// 部署数据：字节码 ++ ABI 编码的构造参数
    pub fn deployment_data(&self, args: &[Token]) -> Result<Bytes> {
        let data = match self.abi.constructor() {
            Some(constructor) => constructor.encode_input(self.bytecode.to_vec(), args)?,
            None if args.is_empty() => self.bytecode.to_vec(),
            None => {
                return Err(EnsError::Artifact(format!(
                    "{} has no constructor but {} arguments were given",
                    self.kind,
                    args.len()
                )))
            }
        };
        Ok(data.into())
    }

    /// 编码函数调用数据（含4字节选择器）
    pub fn encode_call(&self, method: &str, args: &[Token]) -> Result<Bytes> {
        let function = self.abi.function(method)?;
        Ok(function.encode_input(args)?.into())
    }

    pub fn decode_output(&self, method: &str, data: &[u8]) -> Result<Vec<Token>> {
        let function = self.abi.function(method)?;
        Ok(function.decode_output(data)?)
    }
}

#[derive(Debug, Deserialize)]
struct ArtifactFile {
    #[serde(default, alias = "abi")]
    interface: Option<serde_json::Value>,
    bytecode: String,
}

/// 一次编排所需的全部合约模板
#[derive(Debug, Clone)]
pub struct ContractArtifacts {
    pub registry: Arc<ContractTemplate>,
    pub registrar: Arc<ContractTemplate>,
    pub resolver: Arc<ContractTemplate>,
    pub reverse_registrar: Arc<ContractTemplate>,
}

impl ContractArtifacts {
    pub fn new(
        registry: ContractTemplate,
        registrar: ContractTemplate,
        resolver: ContractTemplate,
        reverse_registrar: ContractTemplate,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            registrar: Arc::new(registrar),
            resolver: Arc::new(resolver),
            reverse_registrar: Arc::new(reverse_registrar),
        }
    }

    /// 从目录读取 `<ArtifactName>.json`
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let load = |kind: ContractKind| -> Result<ContractTemplate> {
            let path = artifact_path(dir, kind);
            let json = std::fs::read_to_string(&path)
                .map_err(|e| EnsError::Artifact(format!("{}: {}", path.display(), e)))?;
            tracing::debug!(path = %path.display(), contract = %kind, "Loaded contract artifact");
            ContractTemplate::from_artifact_json(kind, &json)
        };

        Ok(Self::new(
            load(ContractKind::Registry)?,
            load(ContractKind::Registrar)?,
            load(ContractKind::Resolver)?,
            load(ContractKind::ReverseRegistrar)?,
        ))
    }

    pub fn template(&self, kind: ContractKind) -> &Arc<ContractTemplate> {
        match kind {
            ContractKind::Registry => &self.registry,
            ContractKind::Registrar => &self.registrar,
            ContractKind::Resolver => &self.resolver,
            ContractKind::ReverseRegistrar => &self.reverse_registrar,
        }
    }
}

fn artifact_path(dir: &Path, kind: ContractKind) -> PathBuf {
    dir.join(format!("{}.json", kind.artifact_name()))
}
