mod cli;
mod run;

use opskit_strategies::builtin_registry;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr, strategy output to stdout
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let registry = builtin_registry();
    let cli = cli::Cli::parse_with_help(&registry);
    cli.execute(&registry).await
}
