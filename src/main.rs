//! ens-builder 主入口
//! 部署一套完整的命名注册表并注册 `<label>.<tld>`

use anyhow::{Context, Result};
use ens_builder::{
    config::Config,
    domain::ContractArtifacts,
    infrastructure::{connect_http, logging::init_logging},
    service::{BuilderOptions, EnsBuilder},
};

#[derive(Debug)]
struct CliArgs {
    config_path: Option<String>,
    label: String,
    tld: String,
}

fn parse_args() -> CliArgs {
    let mut cli = CliArgs {
        config_path: std::env::var("CONFIG_PATH").ok(),
        label: "mylogin".to_string(),
        tld: "eth".to_string(),
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => cli.config_path = args.next(),
            "--label" => {
                if let Some(v) = args.next() {
                    cli.label = v;
                }
            }
            "--tld" => {
                if let Some(v) = args.next() {
                    cli.tld = v;
                }
            }
            other => eprintln!("ignoring unknown argument: {}", other),
        }
    }

    cli
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载环境变量
    dotenvy::dotenv().ok();
    let cli = parse_args();

    // 2. 加载并验证配置
    let config = Config::from_env_and_file(cli.config_path.as_deref())?;
    config.validate()?;

    // 3. 初始化日志
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    tracing::info!(
        rpc = %config.chain.rpc_url,
        label = %cli.label,
        tld = %cli.tld,
        "Starting ens-builder"
    );

    // 4. 连接部署身份
    let private_key = config
        .chain
        .deployer_private_key
        .as_deref()
        .context("ENS_DEPLOYER_KEY must be set")?;
    let deployer = connect_http(&config.chain.rpc_url, private_key).await?;

    // 5. 读取合约编译产物
    let artifacts = ContractArtifacts::load_dir(&config.artifacts.dir)
        .with_context(|| format!("Failed to load contract artifacts from {}", config.artifacts.dir))?;

    // 6. 执行部署
    let mut builder = EnsBuilder::new(deployer, artifacts, BuilderOptions::from(&config));
    let registry = builder.bootstrap_with(&cli.label, &cli.tld).await?;

    tracing::info!(
        registry = ?registry,
        domain = %format!("{}.{}", cli.label, cli.tld),
        "Naming registry ready"
    );
    println!("{:?}", registry);

    Ok(())
}
