use clap::Parser;
use ride_chat::cli::{self, Args};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ride_chat=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    cli::run(Args::parse()).await?;
    Ok(())
}
