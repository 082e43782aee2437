//! Gerrit review strategies

use async_trait::async_trait;
use opskit_clients::GerritClient;
use opskit_core::{OpsResult, Strategy, StrategyArgs, StrategyOutput};
use serde_json::Value;
use tracing::{info, warn};

use super::{boxed, Built, Descriptor};
use crate::context::{Reporter, StrategyContext};

pub(crate) fn descriptors() -> Vec<Descriptor> {
    vec![
        Descriptor {
            name: "SuggestAddGerritReviewers",
            summary: "Suggest reviewers for change_id of project, adding them when auto_add is true",
            params: &["project", "change_id", "[auto_add]"],
            build: build_suggest_reviewers,
        },
        Descriptor {
            name: "AddTopicToGerritChange",
            summary: "Set topic on change_id of project",
            params: &["project", "change_id", "topic"],
            build: build_add_topic,
        },
    ]
}

/// `username/name/email` of a suggested reviewer entry
fn describe_account(suggestion: &Value) -> Option<(String, String)> {
    let account = suggestion.get("account")?;
    let field = |key: &str| {
        account
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    };
    let username = account.get("username").and_then(Value::as_str)?.to_string();
    let label = format!("{}/{}/{}", username, field("name"), field("email"));
    Some((username, label))
}

pub struct SuggestAddGerritReviewers {
    gerrit: GerritClient,
    reporter: Reporter,
    change_id: String,
    auto_add: bool,
}

#[async_trait]
impl Strategy for SuggestAddGerritReviewers {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        let changes = self.gerrit.changes();
        let suggested = changes.suggest_reviewers(&self.change_id, None).await?;

        if self.auto_add {
            for suggestion in suggested.as_array().into_iter().flatten() {
                let Some((username, label)) = describe_account(suggestion) else {
                    warn!(entry = %suggestion, "Suggestion without a username, skipping");
                    continue;
                };
                changes.add_reviewer(&self.change_id, &username).await?;
                (self.reporter)(&format!("Added reviewer {}", label));
            }
        }

        Ok(StrategyOutput::Json(suggested))
    }
}

fn build_suggest_reviewers(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let project: String = args.required("project")?;
        let change_id = args.required("change_id")?;
        let auto_add = args.flag("auto_add", false)?;
        args.finish()?;
        let gerrit = ctx.clients().gerrit(&project).await?;
        boxed(SuggestAddGerritReviewers {
            gerrit,
            reporter: ctx.reporter(),
            change_id,
            auto_add,
        })
    })
}

pub struct AddTopicToGerritChange {
    gerrit: GerritClient,
    change_id: String,
    topic: String,
}

#[async_trait]
impl Strategy for AddTopicToGerritChange {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        let topic = self
            .gerrit
            .changes()
            .set_topic(&self.change_id, &self.topic)
            .await?;
        info!(change = %self.change_id, topic = %self.topic, "Added topic to change");
        Ok(StrategyOutput::Json(topic))
    }
}

fn build_add_topic(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let project: String = args.required("project")?;
        let change_id = args.required("change_id")?;
        let topic = args.required("topic")?;
        args.finish()?;
        let gerrit = ctx.clients().gerrit(&project).await?;
        boxed(AddTopicToGerritChange {
            gerrit,
            change_id,
            topic,
        })
    })
}
