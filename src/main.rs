use anyhow::Context;
use clap::{Parser, Subcommand};
use flight_instructor_stream::{
    ChatEvent, GatewayClient, InstructorClient, RelayConfig,
    handler::{AppState, router},
    models::{ChatMessage, ChatMode},
    prompt::study_guide_request,
};
use futures::StreamExt;
use std::io::Write;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flight-instructor", version, about = "AI flight instructor chat relay")]
struct Cli {
    /// TOML configuration file; environment variables are used when absent
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the chat relay
    Serve {
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Ask the instructor through a running relay and stream the answer
    Ask {
        question: Option<String>,

        /// Request a study guide instead of a plain answer
        #[arg(long)]
        study_guide: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => RelayConfig::from_file(path)?,
        None => RelayConfig::from_env()?,
    };

    match cli.command {
        Command::Serve { listen } => {
            if let Some(listen) = listen {
                config.server.listen_addr = listen;
            }
            serve(config).await
        }
        Command::Ask {
            question,
            study_guide,
        } => ask(config, question, study_guide).await,
    }
}

async fn serve(config: RelayConfig) -> anyhow::Result<()> {
    config.validate()?;

    let provider = Arc::new(GatewayClient::new(config.gateway.clone())?);
    let app = router(Arc::new(AppState::new(provider)));

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;

    info!(
        listen = %config.server.listen_addr,
        gateway = %config.gateway.endpoint,
        model = %config.gateway.model,
        "Relay ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn ask(config: RelayConfig, question: Option<String>, study_guide: bool) -> anyhow::Result<()> {
    config.client.validate()?;
    let client = InstructorClient::new(config.client)?;

    let (message, mode) = match (question, study_guide) {
        (_, true) => (study_guide_request(client.document_context()), Some(ChatMode::StudyGuide)),
        (Some(question), false) => (ChatMessage::user(question), None),
        (None, false) => anyhow::bail!("A question is required unless --study-guide is set"),
    };

    let mut events = client.begin_stream(vec![message], mode);
    let mut printed = 0;
    let mut stdout = std::io::stdout();

    while let Some(event) = events.next().await {
        match event {
            ChatEvent::ContentUpdated(message) => {
                write!(stdout, "{}", &message.content[printed..])?;
                stdout.flush()?;
                printed = message.content.len();
            }
            ChatEvent::Completed(_) => {
                writeln!(stdout)?;
                return Ok(());
            }
            ChatEvent::Failed(e) => return Err(e.into()),
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
