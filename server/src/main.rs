use anyhow::Result;
use axum::Router;
use clap::Parser;
use server::{build_app, AppOptions};
use skripsi_core::Profile;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory written by the indexer
    #[arg(long, default_value = "./index")]
    data: PathBuf,
    /// Search history file
    #[arg(long, default_value = "./search_history.json")]
    history: PathBuf,
    /// Ranking profile: strict or balanced
    #[arg(long, default_value = "strict")]
    profile: Profile,
    /// JSON file overriding ranking parameters
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON file replacing the built-in typo, synonym and domain tables
    #[arg(long)]
    lexicon: Option<PathBuf>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let app: Router = build_app(AppOptions {
        data_dir: args.data,
        history_path: args.history,
        profile: args.profile,
        ranker_config: args.config,
        lexicon: args.lexicon,
        admin_token: std::env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty()),
    })?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, profile = ?args.profile, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
