use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

mod artifacts;
mod elicitation;
mod gateway;
mod server;
mod session;
mod settings;
mod store;

#[derive(Debug, Parser)]
#[command(name = "requirements_assistant")]
#[command(about = "Conversational requirements elicitation assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Start {
        #[arg(long, default_value = "127.0.0.1:7272")]
        listen: String,
        /// Model identifier; overrides ASSISTANT_MODEL.
        #[arg(long)]
        model: Option<String>,
        /// Chat endpoint base URL; overrides ASSISTANT_BASE_URL.
        #[arg(long)]
        base_url: Option<String>,
        /// Root for conversation snapshots and generated specifications.
        #[arg(long)]
        artifacts_dir: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Start { listen, model, base_url, artifacts_dir } => {
            let addr: SocketAddr = listen.parse()?;
            let gateway_config = settings::GatewayConfig::from_env()
                .with_overrides(model, base_url);
            let artifact_config = settings::ArtifactConfig::resolve(artifacts_dir);

            let gateway = Arc::new(gateway::OllamaGateway::new(gateway_config)?);
            let store = Arc::new(store::ConversationStore::new(
                &artifact_config.conversations_dir,
            )?);
            let engine = Arc::new(elicitation::ElicitationEngine::new(gateway.clone()));

            if !gateway.check_connection().await {
                tracing::warn!(
                    model = gateway.model(),
                    "model service unreachable at startup, conversations will degrade to the fallback message"
                );
            }

            let state = server::AppState {
                store,
                engine,
                gateway,
                specifications_dir: artifact_config.specifications_dir,
            };
            server::serve(addr, state).await?;
        }
    }
    Ok(())
}
