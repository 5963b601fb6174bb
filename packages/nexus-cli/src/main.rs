use anyhow::Result;
use clap::{Parser, Subcommand};
use nexus_core::{
    relayer::Relayer,
    types::Address,
    Config, HandlerChain, MemoryNexus, MessageHandler, Messenger,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 验证并解析配置文件
    ValidateConfig {
        /// 配置文件路径
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },
    /// 以网关合约身份分发自定义消息
    Dispatch {
        /// 配置文件路径
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
        /// 状态文件路径，不存在时根据配置创建
        #[arg(short, long, value_name = "FILE")]
        state: PathBuf,
        /// 调用方合约地址
        #[arg(long)]
        caller: String,
        /// JSON 消息文件
        #[arg(required = true)]
        payloads: Vec<PathBuf>,
    },
    /// 重试路由 Approved 状态的消息
    Relay {
        /// 配置文件路径
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
        /// 状态文件路径
        #[arg(short, long, value_name = "FILE")]
        state: PathBuf,
        /// 持续轮询直到 Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// 查看已保存的链和消息
    Status {
        /// 状态文件路径
        #[arg(short, long, value_name = "FILE")]
        state: PathBuf,
    },
}

fn open_nexus(config: &Config, state: &Path) -> Result<MemoryNexus> {
    if state.exists() {
        info!("从 {:?} 加载状态", state);
        Ok(MemoryNexus::load(state)?)
    } else {
        info!("状态文件 {:?} 不存在，根据配置初始化", state);
        Ok(config.build_nexus()?)
    }
}

/// 逐个分发消息文件，每个文件输出一行结果；读取失败只影响该文件
fn dispatch_payloads(handler: &dyn MessageHandler, caller: &Address, payloads: &[PathBuf]) -> Vec<Value> {
    payloads
        .iter()
        .map(|path| {
            let payload = match std::fs::read(path) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("读取消息文件 {:?} 失败: {}", path, e);
                    return json!({
                        "payload": path.display().to_string(),
                        "ok": false,
                        "unknown_msg": false,
                        "error": format!("Failed to read payload: {}", e),
                    });
                }
            };

            match handler.dispatch_msg(caller, &payload) {
                Ok(response) => {
                    if !response.routed {
                        warn!("消息 {} 已保存，但尚未路由", response.message_id);
                    }
                    json!({ "payload": path.display().to_string(), "ok": true, "response": response })
                }
                Err(e) => json!({
                    "payload": path.display().to_string(),
                    "ok": false,
                    "unknown_msg": e.is_unknown_msg(),
                    "error": e.to_string(),
                }),
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ValidateConfig { config } => {
            info!("正在验证配置文件: {:?}", config);
            let config = Config::load(config)?;
            println!("配置文件验证成功!");
            if config.gateway.is_empty() {
                println!("- 网关: <未设置>");
            } else {
                println!("- 网关: {}", config.gateway);
            }
            println!("- 支持的链:");
            for chain in &config.chains {
                let state = if chain.activated { "已激活" } else { "未激活" };
                println!("  - {} ({}, {})", chain.name, chain.module, state);
            }
            println!("- 中继器配置:");
            println!("  - 轮询间隔: {}秒", config.relayer.poll_interval);
            println!("  - 最大重试次数: {}", config.relayer.max_retries);
            Ok(())
        }
        Commands::Dispatch {
            config,
            state,
            caller,
            payloads,
        } => {
            let config = Config::load(config)?;
            let nexus = Arc::new(open_nexus(&config, &state)?);
            let handlers = HandlerChain::new().with_handler(Box::new(Messenger::from_nexus(nexus.clone())));

            for line in dispatch_payloads(&handlers, &Address::new(caller), &payloads) {
                println!("{}", line);
            }

            // 已发放的 ID 和已保存的消息必须落盘，否则下次会重复发放
            nexus.save(&state)?;
            Ok(())
        }
        Commands::Relay {
            config,
            state,
            watch,
        } => {
            let config = Config::load(config)?;
            let nexus = Arc::new(open_nexus(&config, &state)?);
            let relayer = Relayer::new(config.relayer.clone(), nexus.clone(), nexus.clone());

            if watch {
                info!("中继器开始运行，按 Ctrl-C 退出");
                relayer
                    .start(async {
                        if let Err(e) = tokio::signal::ctrl_c().await {
                            warn!("监听 Ctrl-C 失败: {}", e);
                        }
                    })
                    .await;
            } else {
                let report = relayer.relay_pending().await;
                println!(
                    "{}",
                    json!({ "routed": report.routed, "pending": report.pending, "failed": report.failed })
                );
            }

            nexus.save(&state)?;
            Ok(())
        }
        Commands::Status { state } => {
            let nexus = MemoryNexus::load(&state)?;
            println!("- 已注册的链:");
            for chain in nexus.chains() {
                let active = if nexus.is_chain_activated(&chain.name) { "已激活" } else { "未激活" };
                println!("  - {} ({}, {})", chain.name, chain.module, active);
            }
            println!("- 消息:");
            for message in nexus.messages() {
                println!(
                    "  - {} {:?} {} -> {} ({})",
                    message.id,
                    message.status,
                    message.sender.chain.name,
                    message.recipient.chain.name,
                    message.recipient.address
                );
            }
            Ok(())
        }
    }
}
