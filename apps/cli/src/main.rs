use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chatrelay_core_sdk::{
    config::Settings,
    models::{ChatRequest, DEFAULT_MODEL},
    server,
    service::ChatService,
};

/**
 * \brief CLI 程序入口：启动中转服务，或在终端里直接发一条消息。
 */
#[derive(Parser, Debug)]
#[command(name = "chatrelay", version, about = "Claude chat relay")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 启动 HTTP 服务。
     */
    Serve {
        #[arg(long, default_value = "127.0.0.1:8000", env = "ADDR")]
        addr: String,
    },

    /**
     * \brief 发送一条用户消息并打印完整回复。
     * \param prompt  消息内容
     * \param model   模型 ID
     * \param api_key 覆盖服务端默认 Key
     */
    Chat {
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,
        #[arg(long)]
        api_key: Option<String>,
    },

    /**
     * \brief 列出可用模型。
     */
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli.settings.into_shared();

    match cli.command {
        Commands::Serve { addr } => {
            if !settings.anthropic_configured() {
                tracing::warn!("ANTHROPIC_API_KEY not set - requests must carry their own api_key");
            }
            server::run(settings, &addr).await.context("server failed")?;
        }
        Commands::Chat {
            prompt,
            model,
            api_key,
        } => {
            let service = ChatService::new(settings);
            let response = service
                .send_message(ChatRequest {
                    message: prompt,
                    model,
                    conversation_history: Vec::new(),
                    api_key,
                })
                .await
                .context("send message failed")?;
            println!("{}", response.content);
            println!(
                "[{}] input_tokens={} output_tokens={}",
                response.model, response.usage.input_tokens, response.usage.output_tokens
            );
        }
        Commands::Models => {
            for model in ChatService::new(settings).models() {
                println!("{}\t{}", model.id, model.name);
            }
        }
    }

    Ok(())
}
