//! Jira client (REST API v2)
//!
//! Supports:
//! - Projects and issue create metadata
//! - Issues (get, create, update)
//! - Comments, attachments and worklogs

use opskit_core::settings::require_url;
use opskit_core::{EnvLookup, OpsError, OpsResult, Settings};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde_json::{json, Value};
use std::path::Path;
use tracing::info;

use crate::common::{encode_segment, RestClient};

const SERVICE: &str = "jira";

/// Handle to one Jira server
#[derive(Debug, Clone)]
pub struct JiraClient {
    rest: RestClient,
}

impl JiraClient {
    /// Connect and verify the credentials against `/myself`
    pub async fn connect(
        url: &str,
        auth: (String, String),
        timeout_secs: Option<u64>,
    ) -> OpsResult<Self> {
        let rest = RestClient::new(SERVICE, url, Some(auth), timeout_secs)?;
        let client = Self { rest };
        let me = client.rest.get_json(&api_path("myself")).await?;
        let user = me.get("name").and_then(Value::as_str).unwrap_or("?");
        info!(url = %url, user = %user, "Connected to Jira");
        Ok(client)
    }

    pub async fn from_settings(settings: &Settings, env: EnvLookup<'_>) -> OpsResult<Self> {
        let url = require_url(&settings.jira.url, "Jira", "JIRA_URL")?;
        let auth = settings.jira.credentials.resolve(env)?;
        Self::connect(url, auth, settings.request_timeout_secs).await
    }

    pub fn base_url(&self) -> &str {
        self.rest.base_url()
    }

    /// Browser URL of an issue
    pub fn browse_url(&self, issue_key: &str) -> String {
        self.rest.url(&format!("browse/{}", encode_segment(issue_key)))
    }

    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------

    pub async fn project(&self, project_key: &str) -> OpsResult<Value> {
        self.rest
            .get_json(&api_path(&format!("project/{}", encode_segment(project_key))))
            .await
    }

    pub async fn projects(&self) -> OpsResult<Value> {
        self.rest.get_json(&api_path("project")).await
    }

    /// Create metadata for every project visible to the user
    pub async fn create_meta(&self) -> OpsResult<Value> {
        self.rest.get_json(&api_path("issue/createmeta")).await
    }

    /// Issue types creatable in one project
    pub async fn issue_types(&self, project_key: &str) -> OpsResult<Vec<Value>> {
        let meta = self.create_meta().await?;
        Ok(issue_types_of(&meta, project_key))
    }

    // ------------------------------------------------------------------
    // Issues
    // ------------------------------------------------------------------

    pub async fn issue(&self, issue_key: &str) -> OpsResult<Value> {
        self.rest.get_json(&issue_path(issue_key, "")).await
    }

    pub async fn issue_type_name(&self, issue_key: &str) -> OpsResult<String> {
        let issue = self.issue(issue_key).await?;
        issue
            .pointer("/fields/issuetype/name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| OpsError::parse(SERVICE, format!("issue {} has no issue type", issue_key)))
    }

    /// Create an issue; `payload` is the full `{"fields": {...}}` document.
    /// Returns Jira's reply (`id`, `key`, `self`).
    pub async fn create_issue(&self, payload: &Value) -> OpsResult<Value> {
        let created = self.rest.post_json(&api_path("issue"), Some(payload)).await?;
        if let Some(key) = created.get("key").and_then(Value::as_str) {
            info!(issue = %key, "Created Jira issue");
        }
        Ok(created)
    }

    pub async fn update_issue(&self, issue_key: &str, payload: &Value) -> OpsResult<()> {
        self.rest
            .put_json(&issue_path(issue_key, ""), Some(payload))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------

    pub async fn comments(&self, issue_key: &str) -> OpsResult<Value> {
        self.rest.get_json(&issue_path(issue_key, "/comment")).await
    }

    pub async fn post_comment(&self, issue_key: &str, body: &str) -> OpsResult<Value> {
        self.rest
            .post_json(&issue_path(issue_key, "/comment"), Some(&json!({ "body": body })))
            .await
    }

    pub async fn comment(&self, issue_key: &str, comment_id: &str) -> OpsResult<Value> {
        self.rest
            .get_json(&comment_path(issue_key, comment_id))
            .await
    }

    pub async fn edit_comment(&self, issue_key: &str, comment_id: &str, body: &str) -> OpsResult<Value> {
        self.rest
            .put_json(&comment_path(issue_key, comment_id), Some(&json!({ "body": body })))
            .await
    }

    pub async fn delete_comment(&self, issue_key: &str, comment_id: &str) -> OpsResult<()> {
        self.rest.delete(&comment_path(issue_key, comment_id)).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Attachments and worklogs
    // ------------------------------------------------------------------

    pub async fn attachments(&self, issue_key: &str) -> OpsResult<Vec<Value>> {
        let issue = self
            .rest
            .get_json(&issue_path(issue_key, "?fields=attachment"))
            .await?;
        Ok(issue
            .pointer("/fields/attachment")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Upload a local file as an attachment
    pub async fn upload_attachment(&self, issue_key: &str, file: &Path) -> OpsResult<Value> {
        let bytes = tokio::fs::read(file).await?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "attachment".to_string());
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));

        let request = self
            .rest
            .request(Method::POST, &issue_path(issue_key, "/attachments"))
            .header("X-Atlassian-Token", "no-check")
            .multipart(form);
        let response = self.rest.send(request).await?;
        self.rest.json_body(response).await
    }

    /// Log work, e.g. `time_spent = "2h 30m"`
    pub async fn add_worklog(&self, issue_key: &str, time_spent: &str, comment: &str) -> OpsResult<Value> {
        let payload = json!({
            "timeSpent": time_spent,
            "comment": comment,
        });
        self.rest
            .post_json(&issue_path(issue_key, "/worklog"), Some(&payload))
            .await
    }
}

fn api_path(path: &str) -> String {
    format!("rest/api/2/{}", path)
}

fn issue_path(issue_key: &str, tail: &str) -> String {
    api_path(&format!("issue/{}{}", encode_segment(issue_key), tail))
}

fn comment_path(issue_key: &str, comment_id: &str) -> String {
    issue_path(issue_key, &format!("/comment/{}", encode_segment(comment_id)))
}

fn issue_types_of(meta: &Value, project_key: &str) -> Vec<Value> {
    meta.get("projects")
        .and_then(Value::as_array)
        .and_then(|projects| {
            projects
                .iter()
                .find(|p| p.get("key").and_then(Value::as_str) == Some(project_key))
        })
        .and_then(|p| p.get("issuetypes"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}
