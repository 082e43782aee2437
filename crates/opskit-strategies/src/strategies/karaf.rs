//! Karaf container strategies

use async_trait::async_trait;
use opskit_clients::KarafClient;
use opskit_core::{
    CancellationToken, OpsResult, PollLoop, PollOutcome, Strategy, StrategyArgs, StrategyOutput,
};
use tracing::info;

use super::{boxed, Built, Descriptor};
use crate::context::{Reporter, StrategyContext};

pub(crate) fn descriptors() -> Vec<Descriptor> {
    vec![Descriptor {
        name: "MonitorKarafBundleList",
        summary: "Print the Karaf bundle list every interval_seconds until CTRL-C",
        params: &["interval_seconds"],
        build: build_monitor_bundles,
    }]
}

pub struct MonitorKarafBundleList {
    karaf: KarafClient,
    reporter: Reporter,
    cancel: CancellationToken,
    interval_secs: u64,
}

#[async_trait]
impl Strategy for MonitorKarafBundleList {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        (self.reporter)("Monitoring Karaf bundle list. Press CTRL-C to exit.");

        let poller = PollLoop::from_secs(self.interval_secs, self.cancel.clone());
        let PollOutcome::Cancelled { polls } = poller
            .run(|_| {
                let karaf = &self.karaf;
                let reporter = self.reporter.clone();
                async move {
                    let bundles = karaf.bundle().list().await?;
                    reporter(bundles.trim_end());
                    Ok(())
                }
            })
            .await?;

        info!(polls, "Stopped monitoring bundle list");
        Ok(StrategyOutput::None)
    }
}

fn build_monitor_bundles(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let interval_secs = args.interval_secs("interval_seconds")?;
        args.finish()?;
        let karaf = ctx.clients().karaf().await?;
        boxed(MonitorKarafBundleList {
            karaf,
            reporter: ctx.reporter(),
            cancel: ctx.cancel_token(),
            interval_secs,
        })
    })
}
