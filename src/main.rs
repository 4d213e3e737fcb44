use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use novel_sft::Pipeline;
use novel_sft::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG wins; otherwise info for this crate only
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("novel_sft=info"));
    fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let args = cli.command.args();
    let config = args.load_config().context("Failed to load configuration")?;

    let pipeline = Pipeline::new(config)?.quiet(cli.quiet);
    let report = pipeline
        .run(&args.input, &args.output, cli.command.mode())
        .await
        .with_context(|| format!("Run into {} failed", args.output.display()))?;

    tracing::info!(
        "Done: {} documents, {} samples, {} failed files",
        report.documents(),
        report.samples_written(),
        report.failures.len()
    );

    Ok(())
}
