use async_trait::async_trait;
use opskit_clients::OpenShiftClient;
use opskit_core::{OpsResult, Strategy, StrategyArgs, StrategyOutput};

use super::{boxed, Built, Descriptor};
use crate::context::StrategyContext;

pub(crate) fn descriptors() -> Vec<Descriptor> {
    vec![Descriptor {
        name: "OpenShiftProjects",
        summary: "Names of the OpenShift projects visible to the logged in user",
        params: &[],
        build: build_projects,
    }]
}

pub struct OpenShiftProjects {
    openshift: OpenShiftClient,
}

#[async_trait]
impl Strategy for OpenShiftProjects {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        StrategyOutput::json(&self.openshift.projects().names().await?)
    }
}

fn build_projects(args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        args.finish()?;
        let openshift = ctx.clients().openshift().await?;
        boxed(OpenShiftProjects { openshift })
    })
}
