use anyhow::Context as _;
use clap::Parser;
use condition_survey::{cli, commands, config};
use cli::Cli;
use config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG があれば優先、なければ -v で debug
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().context("設定ファイルの読み込みに失敗しました")?;
    let ctx = commands::Context::new(config, cli.store.as_deref(), cli.assessment)?;
    tracing::debug!("store: {}", ctx.store_path.display());

    commands::run(ctx, cli.command).await?;
    Ok(())
}
