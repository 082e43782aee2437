use async_trait::async_trait;
use opskit_clients::GitRepo;
use opskit_core::{OpsResult, Strategy, StrategyArgs, StrategyOutput};
use serde_json::json;
use std::path::PathBuf;

use super::{boxed, Built, Descriptor};
use crate::context::StrategyContext;

const RECENT_COMMITS: usize = 10;

pub(crate) fn descriptors() -> Vec<Descriptor> {
    vec![Descriptor {
        name: "GitRecentCommits",
        summary: "Branch, head and latest commits of the repository at repo_path",
        params: &["repo_path"],
        build: build_recent_commits,
    }]
}

pub struct GitRecentCommits {
    repo: GitRepo,
}

#[async_trait]
impl Strategy for GitRecentCommits {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        Ok(StrategyOutput::Json(json!({
            "repo": self.repo.name(),
            "branch": self.repo.current_branch().await?,
            "head": self.repo.head_commit(true).await?,
            "commits": self.repo.log(RECENT_COMMITS).await?,
        })))
    }
}

fn build_recent_commits(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let repo_path: PathBuf = args.required("repo_path")?;
        args.finish()?;
        let repo = ctx.clients().git(&repo_path).await?;
        boxed(GitRecentCommits { repo })
    })
}
