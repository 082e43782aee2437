//! Backend settings
//!
//! Settings come from an optional YAML file (`OPSKIT_CONFIG`) with
//! environment overrides for endpoints. Credentials are never stored in the
//! file: each backend names the environment variables holding them.
//!
//! ```yaml
//! elastic:
//!   url: http://elasticsearch:9200
//! jenkins:
//!   url: https://jenkins.example.com
//!   credentials:
//!     user_env: JENKINS_USER
//!     token_env: JENKINS_TOKEN
//! gerrit:
//!   projects:
//!     core:
//!       url: https://gerrit-core.example.com
//!       credentials:
//!         user_env: GERRIT_CORE_USER
//!         token_env: GERRIT_CORE_TOKEN
//! jira:
//!   url: https://jira.example.com
//!   ticket:
//!     project_key: OPS
//!     labels: [RobotTests, JobFailure]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{OpsError, OpsResult};

/// Environment variable naming the settings file
pub const CONFIG_ENV: &str = "OPSKIT_CONFIG";

/// Lookup used to resolve environment variables
pub type EnvLookup<'a> = &'a (dyn Fn(&str) -> Option<String> + Sync);

/// Process environment lookup, ignoring blank values
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Top-level settings for every backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub elastic: ElasticSettings,

    #[serde(default)]
    pub jenkins: JenkinsSettings,

    #[serde(default)]
    pub jira: JiraSettings,

    #[serde(default)]
    pub gerrit: GerritSettings,

    #[serde(default)]
    pub karaf: KarafSettings,

    #[serde(default)]
    pub openshift: OpenShiftSettings,

    /// Directory downloaded artifacts and reports are written to
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Per-request timeout; unset means a slow backend blocks indefinitely
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

/// Pair of environment variable names holding a username and a secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user_env: String,
    pub token_env: String,
}

impl Credentials {
    pub fn new(user_env: &str, token_env: &str) -> Self {
        Self {
            user_env: user_env.to_string(),
            token_env: token_env.to_string(),
        }
    }

    /// Read the username and secret from the environment
    pub fn resolve(&self, env: EnvLookup<'_>) -> OpsResult<(String, String)> {
        let user = env(&self.user_env).ok_or_else(|| {
            OpsError::config(format!("environment variable {} is not set", self.user_env))
        })?;
        let token = env(&self.token_env).ok_or_else(|| {
            OpsError::config(format!("environment variable {} is not set", self.token_env))
        })?;
        Ok((user, token))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElasticSettings {
    #[serde(default)]
    pub url: Option<String>,

    /// Optional basic auth for secured clusters
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JenkinsSettings {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_jenkins_credentials")]
    pub credentials: Credentials,
}

impl Default for JenkinsSettings {
    fn default() -> Self {
        Self {
            url: None,
            credentials: default_jenkins_credentials(),
        }
    }
}

fn default_jenkins_credentials() -> Credentials {
    Credentials::new("JENKINS_USER", "JENKINS_TOKEN")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraSettings {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_jira_credentials")]
    pub credentials: Credentials,

    #[serde(default)]
    pub ticket: TicketTemplate,
}

impl Default for JiraSettings {
    fn default() -> Self {
        Self {
            url: None,
            credentials: default_jira_credentials(),
            ticket: TicketTemplate::default(),
        }
    }
}

fn default_jira_credentials() -> Credentials {
    Credentials::new("JIRA_USER", "JIRA_TOKEN")
}

/// Template for tickets filed from job failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketTemplate {
    #[serde(default)]
    pub project_key: Option<String>,

    #[serde(default = "default_issue_type")]
    pub issue_type: String,

    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default)]
    pub assignee: Option<String>,

    /// Extra fields merged verbatim into the create payload (custom fields)
    #[serde(default)]
    pub extra_fields: serde_json::Map<String, serde_json::Value>,
}

impl Default for TicketTemplate {
    fn default() -> Self {
        Self {
            project_key: None,
            issue_type: default_issue_type(),
            labels: Vec::new(),
            assignee: None,
            extra_fields: serde_json::Map::new(),
        }
    }
}

fn default_issue_type() -> String {
    "Story".to_string()
}

/// One Gerrit server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GerritInstance {
    pub url: String,

    #[serde(default = "default_gerrit_credentials")]
    pub credentials: Credentials,
}

fn default_gerrit_credentials() -> Credentials {
    Credentials::new("GERRIT_USER", "GERRIT_TOKEN")
}

/// Gerrit servers keyed by project name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GerritSettings {
    /// Used when no project entry matches
    #[serde(default)]
    pub default: Option<GerritInstance>,

    #[serde(default)]
    pub projects: BTreeMap<String, GerritInstance>,
}

impl GerritSettings {
    /// Pick the Gerrit server for a project (case-insensitive), falling back
    /// to the default instance
    pub fn instance_for(&self, project: &str) -> OpsResult<&GerritInstance> {
        let wanted = project.to_lowercase();
        self.projects
            .iter()
            .find(|(name, _)| name.to_lowercase() == wanted)
            .map(|(_, instance)| instance)
            .or(self.default.as_ref())
            .ok_or_else(|| {
                OpsError::config(format!("no Gerrit instance configured for project '{}'", project))
            })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KarafSettings {
    /// Path to the Karaf `client` script
    #[serde(default)]
    pub client: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenShiftSettings {
    #[serde(default = "default_oc_client")]
    pub client: PathBuf,

    #[serde(default = "default_oc_credentials")]
    pub credentials: Credentials,

    /// API server passed to `oc login` when the session has expired
    #[serde(default)]
    pub server: Option<String>,
}

impl Default for OpenShiftSettings {
    fn default() -> Self {
        Self {
            client: default_oc_client(),
            credentials: default_oc_credentials(),
            server: None,
        }
    }
}

fn default_oc_client() -> PathBuf {
    PathBuf::from("oc")
}

fn default_oc_credentials() -> Credentials {
    Credentials::new("OC_USER", "OC_PASSWORD")
}

impl Settings {
    /// Load from the file named by `OPSKIT_CONFIG` (if any), then apply the
    /// process environment
    pub fn from_env() -> OpsResult<Self> {
        let path = process_env(CONFIG_ENV).map(PathBuf::from);
        Self::load(path.as_deref(), &process_env)
    }

    /// Load from an optional YAML file and apply environment overrides
    pub fn load(path: Option<&Path>, env: EnvLookup<'_>) -> OpsResult<Self> {
        let mut settings = match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading settings file");
                let content = std::fs::read_to_string(path).map_err(|e| {
                    OpsError::config(format!("failed to read {}: {}", path.display(), e))
                })?;
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };
        settings.apply_env(env);
        Ok(settings)
    }

    pub fn from_yaml(content: &str) -> OpsResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| OpsError::config(format!("invalid settings file: {}", e)))
    }

    /// Override endpoints from well-known environment variables
    pub fn apply_env(&mut self, env: EnvLookup<'_>) {
        if let Some(url) = env("ELASTIC_URL") {
            self.elastic.url = Some(url);
        }
        if let Some(url) = env("JENKINS_URL") {
            self.jenkins.url = Some(url);
        }
        if let Some(url) = env("JIRA_URL") {
            self.jira.url = Some(url);
        }
        if let Some(url) = env("GERRIT_URL") {
            let credentials = self
                .gerrit
                .default
                .take()
                .map(|d| d.credentials)
                .unwrap_or_else(default_gerrit_credentials);
            self.gerrit.default = Some(GerritInstance { url, credentials });
        }
        if let Some(client) = env("KARAF_CLIENT") {
            self.karaf.client = Some(PathBuf::from(client));
        }
        if let Some(client) = env("OC_CLIENT") {
            self.openshift.client = PathBuf::from(client);
        }
        if let Some(dir) = env("OPSKIT_OUTPUT_DIR") {
            self.output_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("output"))
    }
}

/// Fetch a required endpoint or explain which variable sets it
pub fn require_url<'a>(url: &'a Option<String>, service: &str, env_name: &str) -> OpsResult<&'a str> {
    url.as_deref().ok_or_else(|| {
        OpsError::config(format!("{} URL not configured (set {} or the settings file)", service, env_name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::load(None, &env_of(&[])).unwrap();
        assert!(settings.elastic.url.is_none());
        assert_eq!(settings.jenkins.credentials.user_env, "JENKINS_USER");
        assert_eq!(settings.jira.ticket.issue_type, "Story");
        assert_eq!(settings.openshift.client, PathBuf::from("oc"));
        assert_eq!(settings.output_dir(), PathBuf::from("output"));
    }

    #[test]
    fn test_env_overrides() {
        let env = env_of(&[
            ("ELASTIC_URL", "http://es:9200"),
            ("JENKINS_URL", "http://jenkins:8080"),
            ("GERRIT_URL", "http://gerrit"),
            ("KARAF_CLIENT", "/opt/karaf/bin/client"),
        ]);
        let settings = Settings::load(None, &env).unwrap();
        assert_eq!(settings.elastic.url.as_deref(), Some("http://es:9200"));
        assert_eq!(settings.jenkins.url.as_deref(), Some("http://jenkins:8080"));
        assert_eq!(settings.gerrit.instance_for("anything").unwrap().url, "http://gerrit");
        assert_eq!(settings.karaf.client, Some(PathBuf::from("/opt/karaf/bin/client")));
    }

    #[test]
    fn test_yaml_file_with_gerrit_projects() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
gerrit:
  projects:
    Core:
      url: https://gerrit-core.example.com
      credentials:
        user_env: CORE_USER
        token_env: CORE_TOKEN
jira:
  url: https://jira.example.com
  ticket:
    project_key: OPS
    labels: [RobotTests]
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path()), &env_of(&[])).unwrap();
        let core = settings.gerrit.instance_for("core").unwrap();
        assert_eq!(core.url, "https://gerrit-core.example.com");
        assert_eq!(core.credentials.user_env, "CORE_USER");
        assert!(settings.gerrit.instance_for("edge").is_err());
        assert_eq!(settings.jira.ticket.project_key.as_deref(), Some("OPS"));
        assert_eq!(settings.jira.ticket.issue_type, "Story");
    }

    #[test]
    fn test_credentials_resolve() {
        let creds = Credentials::new("U", "T");
        let (user, token) = creds.resolve(&env_of(&[("U", "bob"), ("T", "secret")])).unwrap();
        assert_eq!(user, "bob");
        assert_eq!(token, "secret");

        let err = creds.resolve(&env_of(&[("U", "bob")])).unwrap_err();
        assert!(err.to_string().contains("T is not set"));
    }

    #[test]
    fn test_require_url() {
        let missing: Option<String> = None;
        let err = require_url(&missing, "Jenkins", "JENKINS_URL").unwrap_err();
        assert!(err.to_string().contains("JENKINS_URL"));
    }
}
