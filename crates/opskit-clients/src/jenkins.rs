//! Jenkins CI client
//!
//! Authenticates with a username + API token. Token-authenticated requests
//! are exempt from CSRF crumbs, so POSTs are sent without one.
//!
//! Job names may address folders with `/` (`team/nightly` becomes
//! `job/team/job/nightly`).

use opskit_core::settings::require_url;
use opskit_core::{EnvLookup, OpsError, OpsResult, Settings};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::common::{encode_segment, RestClient};

const SERVICE: &str = "jenkins";

/// Name of the zip Jenkins builds on the fly from all artifacts of a build
pub const FULL_ARCHIVE_NAME: &str = "archive.zip";
pub const DEFAULT_ROBOT_LOG: &str = "log_all.html";
pub const DEFAULT_ROBOT_REPORT: &str = "report_all.html";

/// Condensed identity of the authenticated user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDetails {
    pub fullname: String,
    pub id: String,
    pub email: Option<String>,
}

/// First health report entry of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Score")]
    pub score: i64,
}

impl HealthReport {
    /// Extract the first `healthReport` entry from job info, if any
    pub fn from_job_info(name: &str, info: &Value) -> Option<Self> {
        let first = info.get("healthReport")?.as_array()?.first()?;
        Some(Self {
            name: name.to_string(),
            description: first
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            score: first.get("score").and_then(Value::as_i64).unwrap_or_default(),
        })
    }
}

/// Pass/fail counts the Robot Framework plugin records for a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotSummary {
    #[serde(rename = "overallPassed", default)]
    pub passed: u64,
    #[serde(rename = "overallFailed", default)]
    pub failed: u64,
    #[serde(rename = "overallSkipped", default)]
    pub skipped: u64,
}

impl RobotSummary {
    pub fn total(&self) -> u64 {
        self.passed + self.failed + self.skipped
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Map a (possibly nested) job name onto its URL path
pub fn job_path(name: &str) -> String {
    name.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| format!("job/{}", encode_segment(segment)))
        .collect::<Vec<_>>()
        .join("/")
}

fn build_path(job: &str, number: u64, tail: &str) -> String {
    format!("{}/{}/{}", job_path(job), number, tail)
}

/// Handle to one Jenkins master
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    rest: RestClient,
    output_dir: PathBuf,
}

impl JenkinsClient {
    /// Connect and verify the token against `/me/api/json`
    pub async fn connect(
        url: &str,
        auth: (String, String),
        output_dir: PathBuf,
        timeout_secs: Option<u64>,
    ) -> OpsResult<Self> {
        let rest = RestClient::new(SERVICE, url, Some(auth), timeout_secs)?;
        rest.get_json("me/api/json").await?;
        info!(url = %url, "Connected to Jenkins");
        Ok(Self { rest, output_dir })
    }

    pub async fn from_settings(settings: &Settings, env: EnvLookup<'_>) -> OpsResult<Self> {
        let url = require_url(&settings.jenkins.url, "Jenkins", "JENKINS_URL")?;
        let auth = settings.jenkins.credentials.resolve(env)?;
        Self::connect(url, auth, settings.output_dir(), settings.request_timeout_secs).await
    }

    pub fn base_url(&self) -> &str {
        self.rest.base_url()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Browser URL of a job or a build page below it
    pub fn job_url(&self, job: &str, tail: &str) -> String {
        let base = self.rest.url(&job_path(job));
        if tail.is_empty() {
            base
        } else {
            format!("{}/{}", base, tail.trim_start_matches('/'))
        }
    }

    async fn post_empty(&self, path: &str) -> OpsResult<reqwest::Response> {
        self.rest.send(self.rest.request(Method::POST, path)).await
    }

    async fn post_xml(&self, path: &str, config_xml: &str) -> OpsResult<()> {
        let request = self
            .rest
            .request(Method::POST, path)
            .header("Content-Type", "text/xml; charset=utf-8")
            .body(config_xml.to_string());
        self.rest.send(request).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // User and server
    // ------------------------------------------------------------------

    pub async fn whoami(&self) -> OpsResult<Value> {
        self.rest.get_json("me/api/json").await
    }

    pub async fn user_details(&self) -> OpsResult<UserDetails> {
        let me = self.whoami().await?;
        let email = me
            .get("property")
            .and_then(Value::as_array)
            .and_then(|props| {
                props
                    .iter()
                    .find_map(|p| p.get("address").and_then(Value::as_str))
            })
            .map(str::to_string);
        Ok(UserDetails {
            fullname: me
                .get("fullName")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            id: me
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            email,
        })
    }

    pub async fn info(&self) -> OpsResult<Value> {
        self.rest.get_json("api/json").await
    }

    /// Server version from the `X-Jenkins` header
    pub async fn version(&self) -> OpsResult<String> {
        let response = self.rest.send(self.rest.request(Method::GET, "")).await?;
        response
            .headers()
            .get("X-Jenkins")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| OpsError::parse(SERVICE, "missing X-Jenkins header"))
    }

    pub async fn plugins(&self) -> OpsResult<Vec<Value>> {
        let body = self.rest.get_json("pluginManager/api/json?depth=2").await?;
        Ok(array_field(&body, "plugins"))
    }

    /// Plugin matched by short or long name
    pub async fn plugin_info(&self, name: &str) -> OpsResult<Option<Value>> {
        Ok(self.plugins().await?.into_iter().find(|p| {
            p.get("shortName").and_then(Value::as_str) == Some(name)
                || p.get("longName").and_then(Value::as_str) == Some(name)
        }))
    }

    pub async fn nodes(&self) -> OpsResult<Vec<Value>> {
        let body = self.rest.get_json("computer/api/json").await?;
        Ok(array_field(&body, "computer")
            .into_iter()
            .map(|c| {
                serde_json::json!({
                    "name": c.get("displayName").cloned().unwrap_or(Value::Null),
                    "offline": c.get("offline").cloned().unwrap_or(Value::Bool(false)),
                })
            })
            .collect())
    }

    pub async fn node_info(&self, name: &str) -> OpsResult<Value> {
        self.rest
            .get_json(&format!("computer/{}/api/json", node_segment(name)))
            .await
    }

    pub async fn node_config(&self, name: &str) -> OpsResult<String> {
        self.rest
            .get_text(&format!("computer/{}/config.xml", node_segment(name)))
            .await
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub async fn views(&self) -> OpsResult<Vec<Value>> {
        let body = self.rest.get_json("api/json?tree=views[name,url]").await?;
        Ok(array_field(&body, "views"))
    }

    pub async fn view_exists(&self, name: &str) -> OpsResult<bool> {
        self.rest
            .exists(&format!("view/{}/api/json", encode_segment(name)))
            .await
    }

    pub async fn create_view(&self, name: &str, config_xml: &str) -> OpsResult<()> {
        self.post_xml(&format!("createView?name={}", encode_segment(name)), config_xml)
            .await
    }

    pub async fn delete_view(&self, name: &str) -> OpsResult<()> {
        self.post_empty(&format!("view/{}/doDelete", encode_segment(name)))
            .await?;
        Ok(())
    }

    pub async fn view_config(&self, name: &str) -> OpsResult<String> {
        self.rest
            .get_text(&format!("view/{}/config.xml", encode_segment(name)))
            .await
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    pub async fn jobs(&self) -> OpsResult<Vec<Value>> {
        let body = self.rest.get_json("api/json?tree=jobs[name,url,color]").await?;
        Ok(array_field(&body, "jobs"))
    }

    pub async fn jobs_count(&self) -> OpsResult<usize> {
        Ok(self.jobs().await?.len())
    }

    pub async fn jobs_in_view(&self, view: &str) -> OpsResult<Vec<Value>> {
        let path = format!("view/{}/api/json?tree=jobs[name,url,color]", encode_segment(view));
        let body = self.rest.get_json(&path).await?;
        Ok(array_field(&body, "jobs"))
    }

    pub async fn job_info(&self, name: &str) -> OpsResult<Value> {
        self.rest
            .get_json(&format!("{}/api/json", job_path(name)))
            .await
    }

    pub async fn health_report(&self, name: &str) -> OpsResult<Option<HealthReport>> {
        let info = self.job_info(name).await?;
        Ok(HealthReport::from_job_info(name, &info))
    }

    pub async fn last_build_number(&self, name: &str) -> OpsResult<u64> {
        let info = self.job_info(name).await?;
        info.get("lastBuild")
            .and_then(|b| b.get("number"))
            .and_then(Value::as_u64)
            .ok_or_else(|| OpsError::parse(SERVICE, format!("job '{}' has no builds", name)))
    }

    pub async fn job_config(&self, name: &str) -> OpsResult<String> {
        self.rest
            .get_text(&format!("{}/config.xml", job_path(name)))
            .await
    }

    /// Queue a build; returns the queue item URL from the `Location` header
    pub async fn trigger_build(&self, name: &str) -> OpsResult<Option<String>> {
        let response = self
            .post_empty(&format!("{}/build", job_path(name)))
            .await?;
        let location = response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        debug!(job = %name, queue = ?location, "Build queued");
        Ok(location)
    }

    pub async fn create_job(&self, name: &str, config_xml: &str) -> OpsResult<()> {
        self.post_xml(&format!("createItem?name={}", encode_segment(name)), config_xml)
            .await
    }

    pub async fn copy_job(&self, from: &str, to: &str) -> OpsResult<()> {
        let path = format!(
            "createItem?name={}&mode=copy&from={}",
            encode_segment(to),
            encode_segment(from)
        );
        self.post_empty(&path).await?;
        Ok(())
    }

    pub async fn rename_job(&self, from: &str, to: &str) -> OpsResult<()> {
        let path = format!("{}/doRename?newName={}", job_path(from), encode_segment(to));
        self.post_empty(&path).await?;
        Ok(())
    }

    pub async fn delete_job(&self, name: &str) -> OpsResult<()> {
        self.post_empty(&format!("{}/doDelete", job_path(name)))
            .await?;
        Ok(())
    }

    pub async fn enable_job(&self, name: &str) -> OpsResult<()> {
        self.post_empty(&format!("{}/enable", job_path(name)))
            .await?;
        Ok(())
    }

    pub async fn disable_job(&self, name: &str) -> OpsResult<()> {
        self.post_empty(&format!("{}/disable", job_path(name)))
            .await?;
        Ok(())
    }

    pub async fn job_exists(&self, name: &str) -> OpsResult<bool> {
        self.rest
            .exists(&format!("{}/api/json", job_path(name)))
            .await
    }

    pub async fn reconfigure_job(&self, name: &str, config_xml: &str) -> OpsResult<()> {
        self.post_xml(&format!("{}/config.xml", job_path(name)), config_xml)
            .await
    }

    // ------------------------------------------------------------------
    // Builds
    // ------------------------------------------------------------------

    pub async fn console_output(&self, job: &str, number: u64) -> OpsResult<String> {
        self.rest.get_text(&build_path(job, number, "consoleText")).await
    }

    pub async fn build_info(&self, job: &str, number: u64) -> OpsResult<Value> {
        self.rest.get_json(&build_path(job, number, "api/json")).await
    }

    /// Builds currently occupying an executor
    pub async fn running_builds(&self) -> OpsResult<Vec<Value>> {
        let body = self
            .rest
            .get_json("computer/api/json?tree=computer[displayName,executors[currentExecutable[url,number]]]")
            .await?;
        let mut running = Vec::new();
        for computer in array_field(&body, "computer") {
            let node = computer.get("displayName").cloned().unwrap_or(Value::Null);
            for executor in array_field(&computer, "executors") {
                if let Some(build) = executor.get("currentExecutable").filter(|b| !b.is_null()) {
                    running.push(serde_json::json!({
                        "node": node,
                        "number": build.get("number").cloned().unwrap_or(Value::Null),
                        "url": build.get("url").cloned().unwrap_or(Value::Null),
                    }));
                }
            }
        }
        Ok(running)
    }

    pub async fn build_env_vars(&self, job: &str, number: u64) -> OpsResult<Value> {
        self.rest
            .get_json(&build_path(job, number, "injectedEnvVars/api/json"))
            .await
    }

    pub async fn build_test_report(&self, job: &str, number: u64) -> OpsResult<Value> {
        self.rest
            .get_json(&build_path(job, number, "testReport/api/json"))
            .await
    }

    pub async fn stop_build(&self, job: &str, number: u64) -> OpsResult<()> {
        self.post_empty(&build_path(job, number, "stop")).await?;
        Ok(())
    }

    pub async fn delete_build(&self, job: &str, number: u64) -> OpsResult<()> {
        self.post_empty(&build_path(job, number, "doDelete")).await?;
        Ok(())
    }

    async fn download(&self, path: &str, file_name: &str) -> OpsResult<PathBuf> {
        let bytes = self.rest.get_bytes(path).await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let target = self.output_dir.join(file_name);
        tokio::fs::write(&target, &bytes).await?;
        info!(url = %self.rest.url(path), file = %target.display(), size = bytes.len(), "Downloaded");
        Ok(target)
    }

    /// Download one artifact stored under the build's `output/` folder
    pub async fn download_artifact(&self, job: &str, number: u64, file_name: &str) -> OpsResult<PathBuf> {
        let path = build_path(job, number, &format!("artifact/output/{}", encode_segment(file_name)));
        self.download(&path, file_name).await
    }

    /// Download every artifact of a build as one zip
    pub async fn download_full_archive(&self, job: &str, number: u64) -> OpsResult<PathBuf> {
        let path = build_path(job, number, &format!("artifact/*zip*/{}", FULL_ARCHIVE_NAME));
        self.download(&path, FULL_ARCHIVE_NAME).await
    }

    pub async fn robot_summary(&self, job: &str, number: u64) -> OpsResult<RobotSummary> {
        let body = self.rest.get_json(&build_path(job, number, "robot/api/json")).await?;
        serde_json::from_value(body).map_err(|e| OpsError::parse(SERVICE, e))
    }

    /// Download the Robot Framework log named `save_as` (default `log_all.html`)
    pub async fn download_robot_log(&self, job: &str, number: u64, save_as: Option<&str>) -> OpsResult<PathBuf> {
        let file_name = save_as.unwrap_or(DEFAULT_ROBOT_LOG);
        let path = build_path(job, number, &format!("robot/report/{}", encode_segment(file_name)));
        self.download(&path, file_name).await
    }

    /// Download the Robot Framework report named `save_as` (default `report_all.html`)
    pub async fn download_robot_report(&self, job: &str, number: u64, save_as: Option<&str>) -> OpsResult<PathBuf> {
        let file_name = save_as.unwrap_or(DEFAULT_ROBOT_REPORT);
        let path = build_path(job, number, &format!("robot/report/{}", encode_segment(file_name)));
        self.download(&path, file_name).await
    }
}

fn array_field(body: &Value, field: &str) -> Vec<Value> {
    body.get(field)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

// The built-in node is addressed as `(master)` in URLs
fn node_segment(name: &str) -> String {
    match name {
        "master" | "built-in" | "Built-In Node" => "(master)".to_string(),
        other => encode_segment(other),
    }
}
