use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tidesync::{FeedEngine, HttpGateway, Identity, SyncConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod input;
mod render;

use render::TerminalSink;

#[derive(Parser, Debug)]
#[command(
    name = "tidechat",
    about = "Line-oriented chat client that keeps a local timeline in sync over long polling",
    version
)]
struct Cli {
    /// Base URL of the chat server
    #[arg(
        long,
        env = "TIDECHAT_SERVER",
        default_value = "http://127.0.0.1:8080"
    )]
    server: String,

    /// Username, used to decide which messages may be deleted remotely
    #[arg(long, env = "TIDECHAT_USER")]
    user: Option<String>,

    /// Treat this identity as an admin for deletion purposes; the server
    /// still confirms every remote deletion
    #[arg(long)]
    admin: bool,

    /// Number of recent messages fetched by the initial load
    #[arg(long, default_value_t = 50)]
    init_size: u32,

    /// Default page size for /older
    #[arg(long, default_value_t = 20)]
    page_size: u32,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let gateway =
        Arc::new(HttpGateway::new(&cli.server).context("invalid server url")?);
    debug!(server = %gateway.base_url(), "gateway configured");

    let sink = Arc::new(TerminalSink::new());
    let config = SyncConfig {
        initial_backlog: cli.init_size,
        page_size: cli.page_size,
        ..SyncConfig::default()
    };
    let identity = Identity {
        username: cli.user,
        admin: cli.admin,
    };

    let engine = FeedEngine::new(gateway, sink, config, identity);
    engine.start();
    input::run(engine).await
}
