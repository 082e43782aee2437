//! Gerrit code review client
//!
//! All calls go through the authenticated `/a/` prefix. Gerrit prepends
//! `)]}'` to every JSON body; [`strip_xssi_prefix`] removes it before
//! decoding.

use opskit_core::{EnvLookup, GerritInstance, OpsError, OpsResult};
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::common::{encode_segment, RestClient};

const SERVICE: &str = "gerrit";

/// Magic prefix Gerrit uses against cross-site script inclusion
pub const XSSI_PREFIX: &str = ")]}'";

/// Remove the XSSI guard (and the newline after it) if present
pub fn strip_xssi_prefix(body: &str) -> &str {
    match body.strip_prefix(XSSI_PREFIX) {
        Some(rest) => rest.trim_start_matches(['\r', '\n']),
        None => body,
    }
}

/// Handle to one Gerrit server
#[derive(Debug, Clone)]
pub struct GerritClient {
    rest: RestClient,
}

impl GerritClient {
    /// Connect and verify the credentials against `/a/accounts/self`
    pub async fn connect(
        url: &str,
        auth: (String, String),
        timeout_secs: Option<u64>,
    ) -> OpsResult<Self> {
        let rest = RestClient::new(SERVICE, url, Some(auth), timeout_secs)?;
        let client = Self { rest };
        let me = client.get("accounts/self").await?;
        let user = me.get("username").and_then(Value::as_str).unwrap_or("?");
        info!(url = %url, user = %user, "Connected to Gerrit");
        Ok(client)
    }

    pub async fn from_instance(
        instance: &GerritInstance,
        env: EnvLookup<'_>,
        timeout_secs: Option<u64>,
    ) -> OpsResult<Self> {
        let auth = instance.credentials.resolve(env)?;
        Self::connect(&instance.url, auth, timeout_secs).await
    }

    pub fn base_url(&self) -> &str {
        self.rest.base_url()
    }

    async fn call<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> OpsResult<Value> {
        let mut request = self.rest.request(method, &format!("a/{}", path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = self.rest.send(request).await?;
        let text = response
            .text()
            .await
            .map_err(|e| OpsError::parse(SERVICE, e))?;
        let cleaned = strip_xssi_prefix(&text);
        if cleaned.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(cleaned).map_err(|e| OpsError::parse(SERVICE, e))
    }

    async fn get(&self, path: &str) -> OpsResult<Value> {
        self.call::<Value>(Method::GET, path, None).await
    }

    async fn put(&self, path: &str, body: Option<&Value>) -> OpsResult<Value> {
        self.call(Method::PUT, path, body).await
    }

    async fn post(&self, path: &str, body: Option<&Value>) -> OpsResult<Value> {
        self.call(Method::POST, path, body).await
    }

    async fn delete(&self, path: &str) -> OpsResult<Value> {
        self.call::<Value>(Method::DELETE, path, None).await
    }

    pub fn server(&self) -> Server<'_> {
        Server { gerrit: self }
    }

    pub fn groups(&self) -> Groups<'_> {
        Groups { gerrit: self }
    }

    pub fn accounts(&self) -> Accounts<'_> {
        Accounts { gerrit: self }
    }

    pub fn projects(&self) -> Projects<'_> {
        Projects { gerrit: self }
    }

    pub fn changes(&self) -> Changes<'_> {
        Changes { gerrit: self }
    }

    /// Search the bundled documentation
    pub async fn documentation_search(&self, keyword: &str) -> OpsResult<Value> {
        self.get(&format!("Documentation/?q={}", encode_segment(keyword)))
            .await
    }
}

fn detail_suffix(detailed: bool) -> &'static str {
    if detailed {
        "/detail"
    } else {
        ""
    }
}

// ============================================================================
// Server
// ============================================================================

pub struct Server<'a> {
    gerrit: &'a GerritClient,
}

impl Server<'_> {
    pub async fn version(&self) -> OpsResult<Value> {
        self.gerrit.get("config/server/version").await
    }

    pub async fn info(&self) -> OpsResult<Value> {
        self.gerrit.get("config/server/info").await
    }

    pub async fn summary(&self) -> OpsResult<Value> {
        self.gerrit.get("config/server/summary").await
    }

    pub async fn capabilities(&self) -> OpsResult<Value> {
        self.gerrit.get("config/server/capabilities").await
    }

    pub async fn top_menus(&self) -> OpsResult<Value> {
        self.gerrit.get("config/server/top-menus").await
    }

    /// Default user preferences
    pub async fn preferences(&self) -> OpsResult<Value> {
        self.gerrit.get("config/server/preferences").await
    }

    pub async fn caches(&self) -> OpsResult<Value> {
        self.gerrit.get("config/server/caches/").await
    }

    pub async fn cache(&self, name: &str) -> OpsResult<Value> {
        self.gerrit
            .get(&format!("config/server/caches/{}", encode_segment(name)))
            .await
    }

    pub async fn flush_all_caches(&self) -> OpsResult<Value> {
        self.gerrit
            .post("config/server/caches/", Some(&json!({ "operation": "FLUSH_ALL" })))
            .await
    }

    pub async fn flush_cache(&self, name: &str) -> OpsResult<Value> {
        self.gerrit
            .post(&format!("config/server/caches/{}/flush", encode_segment(name)), None)
            .await
    }

    pub async fn tasks(&self) -> OpsResult<Value> {
        self.gerrit.get("config/server/tasks/").await
    }

    pub async fn task(&self, id: &str) -> OpsResult<Value> {
        self.gerrit
            .get(&format!("config/server/tasks/{}", encode_segment(id)))
            .await
    }

    pub async fn delete_task(&self, id: &str) -> OpsResult<Value> {
        self.gerrit
            .delete(&format!("config/server/tasks/{}", encode_segment(id)))
            .await
    }

    pub async fn plugins(&self) -> OpsResult<Value> {
        self.gerrit.get("plugins/?all").await
    }

    pub async fn plugin_status(&self, plugin: &str) -> OpsResult<Value> {
        self.gerrit
            .get(&format!("plugins/{}/gerrit~status", encode_segment(plugin)))
            .await
    }
}

// ============================================================================
// Groups and accounts
// ============================================================================

pub struct Groups<'a> {
    gerrit: &'a GerritClient,
}

impl Groups<'_> {
    fn path(group: &str, tail: &str) -> String {
        format!("groups/{}{}", encode_segment(group), tail)
    }

    pub async fn list(&self) -> OpsResult<Value> {
        self.gerrit.get("groups/").await
    }

    pub async fn get(&self, group: &str, detailed: bool) -> OpsResult<Value> {
        self.gerrit
            .get(&Self::path(group, detail_suffix(detailed)))
            .await
    }

    pub async fn description(&self, group: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(group, "/description")).await
    }

    pub async fn options(&self, group: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(group, "/options")).await
    }

    pub async fn owner(&self, group: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(group, "/owner")).await
    }

    pub async fn audit_log(&self, group: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(group, "/log.audit")).await
    }

    pub async fn members(&self, group: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(group, "/members/")).await
    }
}

pub struct Accounts<'a> {
    gerrit: &'a GerritClient,
}

impl Accounts<'_> {
    fn path(account: &str, tail: &str) -> String {
        format!("accounts/{}{}", encode_segment(account), tail)
    }

    pub async fn get(&self, account: &str, detailed: bool) -> OpsResult<Value> {
        self.gerrit
            .get(&Self::path(account, detail_suffix(detailed)))
            .await
    }

    pub async fn groups(&self, account: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(account, "/groups")).await
    }

    /// Projects the account has access to
    pub async fn projects(&self, account: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(account, "/projects")).await
    }

    pub async fn self_ssh_keys(&self) -> OpsResult<Value> {
        self.gerrit.get("accounts/self/sshkeys").await
    }

    pub async fn capabilities(&self, account: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(account, "/capabilities")).await
    }

    pub async fn self_capabilities(&self) -> OpsResult<Value> {
        self.gerrit.get("accounts/self/capabilities").await
    }
}

// ============================================================================
// Projects
// ============================================================================

pub struct Projects<'a> {
    gerrit: &'a GerritClient,
}

impl<'a> Projects<'a> {
    fn path(project: &str, tail: &str) -> String {
        format!("projects/{}{}", encode_segment(project), tail)
    }

    pub async fn list(&self) -> OpsResult<Value> {
        self.gerrit.get("projects/").await
    }

    pub async fn get(&self, project: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(project, "")).await
    }

    pub async fn description(&self, project: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(project, "/description")).await
    }

    pub async fn parent(&self, project: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(project, "/parent")).await
    }

    pub async fn head(&self, project: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(project, "/HEAD")).await
    }

    /// Repository statistics (admin only)
    pub async fn statistics(&self, project: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(project, "/statistics.git")).await
    }

    pub async fn config(&self, project: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(project, "/config")).await
    }

    pub async fn access(&self, project: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(project, "/access")).await
    }

    pub fn branches(&self) -> Branches<'a> {
        Branches { gerrit: self.gerrit }
    }

    pub fn tags(&self) -> Tags<'a> {
        Tags { gerrit: self.gerrit }
    }

    pub fn dashboards(&self) -> Dashboards<'a> {
        Dashboards { gerrit: self.gerrit }
    }
}

fn project_item(project: &str, kind: &str, item: &str, tail: &str) -> String {
    format!(
        "projects/{}/{}/{}{}",
        encode_segment(project),
        kind,
        encode_segment(item),
        tail
    )
}

pub struct Branches<'a> {
    gerrit: &'a GerritClient,
}

impl Branches<'_> {
    pub async fn list(&self, project: &str) -> OpsResult<Value> {
        self.gerrit
            .get(&format!("projects/{}/branches/", encode_segment(project)))
            .await
    }

    pub async fn get(&self, project: &str, branch: &str) -> OpsResult<Value> {
        self.gerrit
            .get(&project_item(project, "branches", branch, ""))
            .await
    }

    pub async fn create(&self, project: &str, branch: &str, revision: Option<&str>) -> OpsResult<Value> {
        let body = revision.map(|r| json!({ "revision": r }));
        self.gerrit
            .put(&project_item(project, "branches", branch, ""), body.as_ref())
            .await
    }

    pub async fn delete(&self, project: &str, branch: &str) -> OpsResult<Value> {
        self.gerrit
            .delete(&project_item(project, "branches", branch, ""))
            .await
    }

    pub async fn mergeable(&self, project: &str, branch: &str) -> OpsResult<Value> {
        self.gerrit
            .get(&project_item(project, "branches", branch, "/mergeable"))
            .await
    }

    pub async fn reflog(&self, project: &str, branch: &str) -> OpsResult<Value> {
        self.gerrit
            .get(&project_item(project, "branches", branch, "/reflog"))
            .await
    }
}

pub struct Tags<'a> {
    gerrit: &'a GerritClient,
}

impl Tags<'_> {
    pub async fn list(&self, project: &str) -> OpsResult<Value> {
        self.gerrit
            .get(&format!("projects/{}/tags/", encode_segment(project)))
            .await
    }

    pub async fn get(&self, project: &str, tag: &str) -> OpsResult<Value> {
        self.gerrit.get(&project_item(project, "tags", tag, "")).await
    }

    pub async fn delete(&self, project: &str, tag: &str) -> OpsResult<Value> {
        self.gerrit
            .delete(&project_item(project, "tags", tag, ""))
            .await
    }
}

pub struct Dashboards<'a> {
    gerrit: &'a GerritClient,
}

impl Dashboards<'_> {
    pub async fn list(&self, project: &str) -> OpsResult<Value> {
        self.gerrit
            .get(&format!("projects/{}/dashboards/", encode_segment(project)))
            .await
    }

    pub async fn get(&self, project: &str, dashboard: &str) -> OpsResult<Value> {
        self.gerrit
            .get(&project_item(project, "dashboards", dashboard, ""))
            .await
    }

    pub async fn create(&self, project: &str, dashboard: &str, body: &Value) -> OpsResult<Value> {
        self.gerrit
            .put(&project_item(project, "dashboards", dashboard, ""), Some(body))
            .await
    }

    pub async fn delete(&self, project: &str, dashboard: &str) -> OpsResult<Value> {
        self.gerrit
            .delete(&project_item(project, "dashboards", dashboard, ""))
            .await
    }
}

// ============================================================================
// Changes
// ============================================================================

pub struct Changes<'a> {
    gerrit: &'a GerritClient,
}

impl Changes<'_> {
    fn path(change_id: &str, tail: &str) -> String {
        format!("changes/{}{}", encode_segment(change_id), tail)
    }

    /// Query changes, e.g. `status:open+owner:self`
    pub async fn query(&self, query: &str) -> OpsResult<Value> {
        self.gerrit.get(&format!("changes/?q={}", query)).await
    }

    /// Fetch a change by Change-Id, triplet or number
    pub async fn get(&self, change_id: &str, detailed: bool) -> OpsResult<Value> {
        self.gerrit
            .get(&Self::path(change_id, detail_suffix(detailed)))
            .await
    }

    pub async fn edit(&self, change_id: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(change_id, "/edit")).await
    }

    pub async fn assignee(&self, change_id: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(change_id, "/assignee")).await
    }

    pub async fn set_assignee(&self, change_id: &str, assignee: &str) -> OpsResult<Value> {
        self.gerrit
            .put(
                &Self::path(change_id, "/assignee"),
                Some(&json!({ "assignee": assignee })),
            )
            .await
    }

    pub async fn topic(&self, change_id: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(change_id, "/topic")).await
    }

    /// Set the topic; Gerrit answers with the new topic string
    pub async fn set_topic(&self, change_id: &str, topic: &str) -> OpsResult<Value> {
        self.gerrit
            .put(&Self::path(change_id, "/topic"), Some(&json!({ "topic": topic })))
            .await
    }

    pub async fn delete_topic(&self, change_id: &str) -> OpsResult<Value> {
        self.gerrit.delete(&Self::path(change_id, "/topic")).await
    }

    pub async fn comments(&self, change_id: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(change_id, "/comments")).await
    }

    pub async fn comment(&self, change_id: &str, comment_id: &str) -> OpsResult<Value> {
        let tail = format!("/comments/{}", encode_segment(comment_id));
        self.gerrit.get(&Self::path(change_id, &tail)).await
    }

    pub async fn reviewers(&self, change_id: &str) -> OpsResult<Value> {
        self.gerrit.get(&Self::path(change_id, "/reviewers/")).await
    }

    /// Suggested reviewers, optionally narrowed by a search string
    pub async fn suggest_reviewers(&self, change_id: &str, query: Option<&str>) -> OpsResult<Value> {
        let tail = match query {
            Some(q) => format!("/suggest_reviewers?q={}", encode_segment(q)),
            None => "/suggest_reviewers".to_string(),
        };
        self.gerrit.get(&Self::path(change_id, &tail)).await
    }

    /// Add a reviewer by account id, email, username or group
    pub async fn add_reviewer(&self, change_id: &str, reviewer: &str) -> OpsResult<Value> {
        self.gerrit
            .post(
                &Self::path(change_id, "/reviewers"),
                Some(&json!({ "reviewer": reviewer })),
            )
            .await
    }

    pub async fn delete_reviewer(&self, change_id: &str, reviewer: &str) -> OpsResult<Value> {
        let tail = format!("/reviewers/{}/delete", encode_segment(reviewer));
        self.gerrit.post(&Self::path(change_id, &tail), None).await
    }

    pub async fn revision_files(&self, change_id: &str, revision: &str) -> OpsResult<Value> {
        let tail = format!("/revisions/{}/files/", encode_segment(revision));
        self.gerrit.get(&Self::path(change_id, &tail)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_xssi_prefix() {
        assert_eq!(strip_xssi_prefix(")]}'\n{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_xssi_prefix(")]}'{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_xssi_prefix("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn test_paths() {
        assert_eq!(Projects::path("tools/cli", "/HEAD"), "projects/tools%2Fcli/HEAD");
        assert_eq!(
            project_item("core", "branches", "release/1.0", "/mergeable"),
            "projects/core/branches/release%2F1.0/mergeable"
        );
        assert_eq!(Changes::path("core~main~I8473", "/topic"), "changes/core~main~I8473/topic");
        assert_eq!(Groups::path("admins", detail_suffix(true)), "groups/admins/detail");
    }
}
