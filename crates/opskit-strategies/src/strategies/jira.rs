//! Jira strategies, including the ticket filed from a Jenkins view

use async_trait::async_trait;
use chrono::Local;
use opskit_clients::{JenkinsClient, JiraClient};
use opskit_core::{OpsError, OpsResult, Strategy, StrategyArgs, StrategyOutput, TicketTemplate};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::jenkins::{job_names, jobs_health};
use super::{boxed, Built, Descriptor};
use crate::context::StrategyContext;

const SEPARATOR: &str = "====================";

pub(crate) fn descriptors() -> Vec<Descriptor> {
    vec![
        Descriptor {
            name: "CreateJiraFromLastJobsExecution",
            summary: "Create a Jira story with the health report of view_name and one comment \
                      per job linking its last robot results",
            params: &["view_name"],
            build: build_create_jira,
        },
        Descriptor {
            name: "GetJiraIssue",
            summary: "Get Jira issue issue_key",
            params: &["issue_key"],
            build: build_get_issue,
        },
        Descriptor {
            name: "LogWorkInJira",
            summary: "Log time_spent (e.g. '2h 30m') with a comment on issue_key",
            params: &["issue_key", "time_spent", "comment"],
            build: build_log_work,
        },
    ]
}

/// Create payload for the story tracking a view's failed tests
pub fn ticket_payload(template: &TicketTemplate, view: &str, today: &str) -> OpsResult<Value> {
    let project_key = template.project_key.as_deref().ok_or_else(|| {
        OpsError::config("jira.ticket.project_key is required to file tickets")
    })?;

    let mut fields = Map::new();
    fields.insert("project".into(), json!({ "key": project_key }));
    fields.insert("summary".into(), json!(format!("{} Fix {} TC results", today, view)));
    fields.insert("description".into(), json!(format!("{}: Fix the failed tests", view)));
    fields.insert("issuetype".into(), json!({ "name": template.issue_type }));
    if !template.labels.is_empty() {
        fields.insert("labels".into(), json!(template.labels));
    }
    if let Some(assignee) = &template.assignee {
        fields.insert("assignee".into(), json!({ "name": assignee }));
    }
    for (key, value) in &template.extra_fields {
        fields.insert(key.clone(), value.clone());
    }

    Ok(json!({ "fields": fields }))
}

/// Comment pointing at the robot results of one build
pub fn build_comment(jenkins: &JenkinsClient, job: &str, number: u64) -> String {
    format!(
        "{sep}\n{job} build {n}\n\n\
         TEST RESULTS: {results}\n\
         REPORT: {report}\n\
         LOG: {log}\n\
         CONSOLE: {console}",
        sep = SEPARATOR,
        job = job,
        n = number,
        results = jenkins.job_url(job, &format!("{}/robot/", number)),
        report = jenkins.job_url(job, &format!("{}/robot/report/report_all.html", number)),
        log = jenkins.job_url(job, &format!("{}/robot/report/log_all.html", number)),
        console = jenkins.job_url(job, &format!("{}/console", number)),
    )
}

pub struct CreateJiraFromLastJobsExecution {
    jenkins: JenkinsClient,
    jira: JiraClient,
    template: TicketTemplate,
    view_name: String,
}

#[async_trait]
impl Strategy for CreateJiraFromLastJobsExecution {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        let jobs = job_names(&self.jenkins.jobs_in_view(&self.view_name).await?);
        let health = jobs_health(&self.jenkins, &jobs).await?;

        let today = Local::now().format("%d/%m").to_string();
        let payload = ticket_payload(&self.template, &self.view_name, &today)?;
        let issue = self.jira.create_issue(&payload).await?;
        let key = issue
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| OpsError::parse("jira", "created issue has no key"))?
            .to_string();

        let report = serde_json::to_string_pretty(&health).map_err(|e| OpsError::parse("jira", e))?;
        self.jira.post_comment(&key, &report).await?;

        for job in jobs {
            let number = match self.jenkins.last_build_number(&job).await {
                Ok(n) => n,
                Err(OpsError::Parse { message, .. }) => {
                    warn!(job = %job, reason = %message, "Skipping job without builds");
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.jira
                .post_comment(&key, &build_comment(&self.jenkins, &job, number))
                .await?;
        }

        info!(issue = %key, url = %self.jira.browse_url(&key), "Ticket filed");
        Ok(StrategyOutput::Json(issue))
    }
}

fn build_create_jira(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let view_name = args.required("view_name")?;
        args.finish()?;
        let template = ctx.settings().jira.ticket.clone();
        let jenkins = ctx.clients().jenkins().await?;
        let jira = ctx.clients().jira().await?;
        boxed(CreateJiraFromLastJobsExecution {
            jenkins,
            jira,
            template,
            view_name,
        })
    })
}

pub struct GetJiraIssue {
    jira: JiraClient,
    issue_key: String,
}

#[async_trait]
impl Strategy for GetJiraIssue {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        Ok(StrategyOutput::Json(self.jira.issue(&self.issue_key).await?))
    }
}

fn build_get_issue(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let issue_key = args.required("issue_key")?;
        args.finish()?;
        let jira = ctx.clients().jira().await?;
        boxed(GetJiraIssue { jira, issue_key })
    })
}

pub struct LogWorkInJira {
    jira: JiraClient,
    issue_key: String,
    time_spent: String,
    comment: String,
}

#[async_trait]
impl Strategy for LogWorkInJira {
    async fn execute(&self) -> OpsResult<StrategyOutput> {
        let worklog = self
            .jira
            .add_worklog(&self.issue_key, &self.time_spent, &self.comment)
            .await?;
        Ok(StrategyOutput::Json(worklog))
    }
}

fn build_log_work(mut args: StrategyArgs, ctx: StrategyContext) -> Built {
    Box::pin(async move {
        let issue_key = args.required("issue_key")?;
        let time_spent = args.required("time_spent")?;
        let comment = args.required("comment")?;
        args.finish()?;
        let jira = ctx.clients().jira().await?;
        boxed(LogWorkInJira {
            jira,
            issue_key,
            time_spent,
            comment,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> TicketTemplate {
        TicketTemplate {
            project_key: Some("OPS".into()),
            labels: vec!["nightly".into()],
            assignee: Some("qa-bot".into()),
            ..TicketTemplate::default()
        }
    }

    #[test]
    fn test_ticket_payload_fields() {
        let mut t = template();
        t.extra_fields.insert("customfield_10010".into(), json!("ops-sprint"));
        let payload = ticket_payload(&t, "Regression", "14/10").unwrap();
        let fields = &payload["fields"];

        assert_eq!(fields["project"]["key"], "OPS");
        assert_eq!(fields["summary"], "14/10 Fix Regression TC results");
        assert_eq!(fields["description"], "Regression: Fix the failed tests");
        assert_eq!(fields["issuetype"]["name"], "Story");
        assert_eq!(fields["labels"], json!(["nightly"]));
        assert_eq!(fields["assignee"]["name"], "qa-bot");
        assert_eq!(fields["customfield_10010"], "ops-sprint");
    }

    #[test]
    fn test_ticket_payload_requires_project() {
        let err = ticket_payload(&TicketTemplate::default(), "Regression", "14/10").unwrap_err();
        assert!(matches!(err, OpsError::Config(_)));
    }
}
