//! devtrack-deps CLI binary.

use anyhow::Result;
use devtrack_deps::cli::Cli;
use tracing_subscriber::EnvFilter;

/// Uses tokio's current_thread runtime; every command is a short sequence
/// of local I/O.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // RUST_LOG overrides, e.g. RUST_LOG=devtrack_deps=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("devtrack_deps=info,devtrack_jsonl=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting devtrack-deps");

    let cli = Cli::parse_args();
    cli.execute().await?;

    Ok(())
}
