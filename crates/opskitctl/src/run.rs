//! Resolve, build and execute one strategy

use anyhow::Context;
use opskit_core::{CancellationToken, Executor, Settings, StrategyRegistry};
use opskit_strategies::StrategyContext;
use tracing::{debug, info};

pub async fn execute(
    registry: &StrategyRegistry<StrategyContext>,
    name: &str,
    args: Vec<String>,
) -> anyhow::Result<()> {
    // Unknown names fail before settings or clients are touched
    registry.resolve(name)?;

    let settings = Settings::from_env().context("Failed to load settings")?;
    let cancel = CancellationToken::new();
    let watcher = spawn_interrupt_watcher(cancel.clone());

    let context = StrategyContext::new(settings, cancel.clone());
    let built = tokio::select! {
        biased;
        result = registry.build(name, args, context) => result,
        _ = cancel.cancelled() => {
            info!(strategy = name, "Interrupted while connecting");
            watcher.abort();
            return Ok(());
        }
    };
    let strategy = built.with_context(|| format!("Failed to construct strategy '{}'", name))?;

    let executor = Executor::new(strategy);
    let output = tokio::select! {
        biased;
        result = executor.execute_strategy() => {
            result.with_context(|| format!("Strategy '{}' failed", name))?
        }
        _ = cancel.cancelled() => {
            info!(strategy = name, "Interrupted");
            watcher.abort();
            return Ok(());
        }
    };
    watcher.abort();

    match output.render() {
        Some(text) => println!("{}", text),
        None => debug!(strategy = name, "Strategy produced no output"),
    }
    Ok(())
}

fn spawn_interrupt_watcher(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("SIGINT or CTRL-C detected. Exiting gracefully");
            cancel.cancel();
        }
    })
}
