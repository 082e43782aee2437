//! Elasticsearch strategies

use async_trait::async_trait;
use opskit_clients::elastic::CatOptions;
use opskit_clients::ElasticClient;
use opskit_core::{
    CancellationToken, OpsResult, PollLoop, PollOutcome, Strategy, StrategyArgs, StrategyOutput,
};
use tracing::info;

use super::{boxed, Built, Descriptor};
use crate::context::{Reporter, StrategyContext};

pub(crate) fn descriptors() -> Vec<Descriptor> {
    vec![
        Descriptor {
            name: "MonitorElasticClusterHealth",
            summary: "Print the Elastic cluster health every interval_seconds until CTRL-C",
            params: &["interval_seconds", "[verbose]"],
            build: build_monitor_health,
        },
        Descriptor {
            name: "ElasticClusterState",
            summary: "Very verbose cluster state. metric is one of nodes, routing_table, \
                      routing_nodes, metadata, master_node, blocks, version (default _all)",
            params: &["[metric]"],
            build: build_cluster_state,
        },
        Descriptor {
            name: "ElasticClusterHealth",
            summary: "Elastic cluster health",
            params: &[],
            build: build_cluster_health,
        },
        Descriptor {
            name: "ElasticClusterStats",
            summary: "Elastic cluster stats",
            params: &[],
            build: build_cluster_stats,
        },
        Descriptor {
            name: "AllCurrentElasticTasks",
            summary: "Get all current Elastic tasks",
            params: &[],
            build: build_current_tasks,
        },
        Descriptor {
            name: "ElasticIndexInfo",
            summary: "Get Elastic index_name info",
            params: &["index_name"],
            build: build_index_info,
        },
    ]
}

pub struct MonitorElasticClusterHealth {
    elastic: ElasticClient,
    reporter: Reporter,
    cancel: CancellationToken,
    interval_secs: u64,
    verbose: bool,
}

#[async_trait]
impl Strategy for MonitorElasticClusterHealth {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        (self.reporter)("Monitoring ElasticSearch Cluster Health. Press CTRL-C to exit.");
        let options = CatOptions {
            verbose: self.verbose,
            ..CatOptions::default()
        };

        let poller = PollLoop::from_secs(self.interval_secs, self.cancel.clone());
        let PollOutcome::Cancelled { polls } = poller
            .run(|_| {
                let elastic = &self.elastic;
                let reporter = self.reporter.clone();
                async move {
                    let health = elastic.cat().health(options).await?;
                    reporter(health.trim_end());
                    Ok(())
                }
            })
            .await?;

        info!(polls, "Stopped monitoring cluster health");
        Ok(StrategyOutput::None)
    }
}

fn build_monitor_health(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let interval_secs = args.interval_secs("interval_seconds")?;
        let verbose = args.flag("verbose", false)?;
        args.finish()?;
        let elastic = ctx.clients().elastic().await?;
        boxed(MonitorElasticClusterHealth {
            elastic,
            reporter: ctx.reporter(),
            cancel: ctx.cancel_token(),
            interval_secs,
            verbose,
        })
    })
}

pub struct ElasticClusterState {
    elastic: ElasticClient,
    metric: String,
}

#[async_trait]
impl Strategy for ElasticClusterState {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        Ok(StrategyOutput::Json(self.elastic.cluster().state(&self.metric).await?))
    }
}

fn build_cluster_state(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let metric = args
            .optional::<String>("metric")?
            .unwrap_or_else(|| "_all".to_string());
        args.finish()?;
        let elastic = ctx.clients().elastic().await?;
        boxed(ElasticClusterState { elastic, metric })
    })
}

pub struct ElasticClusterHealth {
    elastic: ElasticClient,
}

#[async_trait]
impl Strategy for ElasticClusterHealth {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        Ok(StrategyOutput::Json(self.elastic.cluster().health().await?))
    }
}

fn build_cluster_health(args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        args.finish()?;
        let elastic = ctx.clients().elastic().await?;
        boxed(ElasticClusterHealth { elastic })
    })
}

pub struct ElasticClusterStats {
    elastic: ElasticClient,
}

#[async_trait]
impl Strategy for ElasticClusterStats {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        Ok(StrategyOutput::Json(self.elastic.cluster().stats().await?))
    }
}

fn build_cluster_stats(args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        args.finish()?;
        let elastic = ctx.clients().elastic().await?;
        boxed(ElasticClusterStats { elastic })
    })
}

pub struct AllCurrentElasticTasks {
    elastic: ElasticClient,
}

#[async_trait]
impl Strategy for AllCurrentElasticTasks {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        let tasks = self.elastic.cat().tasks(CatOptions::verbose()).await?;
        Ok(StrategyOutput::text(tasks))
    }
}

fn build_current_tasks(args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        args.finish()?;
        let elastic = ctx.clients().elastic().await?;
        boxed(AllCurrentElasticTasks { elastic })
    })
}

pub struct ElasticIndexInfo {
    elastic: ElasticClient,
    index_name: String,
}

#[async_trait]
impl Strategy for ElasticIndexInfo {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        Ok(StrategyOutput::Json(
            self.elastic.indices().get(&self.index_name).await?,
        ))
    }
}

fn build_index_info(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let index_name = args.required("index_name")?;
        args.finish()?;
        let elastic = ctx.clients().elastic().await?;
        boxed(ElasticIndexInfo { elastic, index_name })
    })
}
