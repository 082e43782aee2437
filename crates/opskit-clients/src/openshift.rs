//! OpenShift client driven through the `oc` CLI
//!
//! Construction checks the current session with `oc whoami` and falls back
//! to `oc login` with the configured credentials.

use opskit_core::{EnvLookup, OpsError, OpsResult, Settings};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::common::{execute_command, resolve_program};

const SERVICE: &str = "openshift";

#[derive(Debug, Clone)]
pub struct OpenShiftClient {
    oc: PathBuf,
    user: String,
}

impl OpenShiftClient {
    /// Reuse the active `oc` session, logging in when there is none
    pub async fn connect(
        oc: &Path,
        credentials: Option<(String, String)>,
        server: Option<&str>,
    ) -> OpsResult<Self> {
        let oc = resolve_program(oc).ok_or_else(|| {
            OpsError::connection(SERVICE, format!("{} not found", oc.display()))
        })?;
        let mut client = Self {
            oc,
            user: String::new(),
        };

        match client.whoami().await {
            Ok(user) => client.user = user,
            Err(e) => {
                warn!(error = %e, "No active oc session, trying to log in");
                let (user, password) = credentials.ok_or_else(|| {
                    OpsError::connection(
                        SERVICE,
                        "not logged in and no credentials configured; run 'oc login' first",
                    )
                })?;
                client.login(&user, &password, server).await?;
                client.user = client.whoami().await?;
            }
        }
        info!(user = %client.user, "Connected to OpenShift");
        Ok(client)
    }

    pub async fn from_settings(settings: &Settings, env: EnvLookup<'_>) -> OpsResult<Self> {
        let os = &settings.openshift;
        let credentials = os.credentials.resolve(env).ok();
        Self::connect(&os.client, credentials, os.server.as_deref()).await
    }

    /// User of the active session as reported at connect time
    pub fn user(&self) -> &str {
        &self.user
    }

    async fn oc(&self, args: &[&str]) -> OpsResult<String> {
        let program = self.oc.to_string_lossy();
        debug!(args = ?args, "Running oc");
        let output = execute_command(&program, args, None, None).await?.into_result()?;
        Ok(output.stdout)
    }

    async fn oc_json(&self, args: &[&str]) -> OpsResult<Value> {
        let stdout = self.oc(args).await?;
        serde_json::from_str(&stdout).map_err(|e| OpsError::parse(SERVICE, e))
    }

    pub async fn whoami(&self) -> OpsResult<String> {
        Ok(self.oc(&["whoami"]).await?.trim().to_string())
    }

    pub async fn login(&self, user: &str, password: &str, server: Option<&str>) -> OpsResult<()> {
        let mut args = vec!["login"];
        if let Some(server) = server {
            args.push(server);
        }
        args.extend(["-u", user, "-p", password]);
        self.oc(&args).await.map_err(|e| {
            OpsError::connection(SERVICE, format!("oc login failed ({}); log in manually with 'oc login'", e))
        })?;
        Ok(())
    }

    pub fn projects(&self) -> Projects<'_> {
        Projects { oc: self }
    }

    pub async fn service_accounts(&self) -> OpsResult<Vec<Value>> {
        let list = self.oc_json(&["get", "serviceaccounts", "-o", "json"]).await?;
        Ok(items(&list))
    }

    pub async fn describe_build_configs(&self) -> OpsResult<String> {
        self.oc(&["describe", "buildconfigs"]).await
    }

    /// Qualified names (`kind/name`) of every object of `kind`
    pub async fn select_kind(&self, kind: &str) -> OpsResult<Vec<String>> {
        Ok(lines(&self.oc(&["get", kind, "-o", "name"]).await?))
    }

    /// Qualified names of the listed objects, e.g. `["serviceaccount/builder"]`
    pub async fn select_names(&self, names: &[&str]) -> OpsResult<Vec<String>> {
        let mut args = vec!["get"];
        args.extend_from_slice(names);
        args.extend(["-o", "name"]);
        Ok(lines(&self.oc(&args).await?))
    }

    pub async fn select_labeled(&self, kind: &str, labels: &BTreeMap<String, String>) -> OpsResult<Vec<String>> {
        let selector = label_selector(labels);
        Ok(lines(&self.oc(&["get", kind, "-l", &selector, "-o", "name"]).await?))
    }
}

pub struct Projects<'a> {
    oc: &'a OpenShiftClient,
}

impl Projects<'_> {
    pub async fn list(&self) -> OpsResult<Vec<Value>> {
        let list = self.oc.oc_json(&["get", "projects", "-o", "json"]).await?;
        Ok(items(&list))
    }

    pub async fn names(&self) -> OpsResult<Vec<String>> {
        let list = self.oc.oc_json(&["get", "projects", "-o", "json"]).await?;
        Ok(item_names(&list))
    }

    pub async fn get(&self, name: &str) -> OpsResult<Value> {
        self.oc.oc_json(&["get", "project", name, "-o", "json"]).await
    }

    pub async fn count(&self) -> OpsResult<usize> {
        Ok(self.names().await?.len())
    }

    pub async fn describe(&self) -> OpsResult<String> {
        self.oc.oc(&["describe", "projects"]).await
    }

    pub async fn create(&self, name: &str) -> OpsResult<String> {
        self.oc.oc(&["new-project", name]).await
    }

    pub async fn delete(&self, name: &str) -> OpsResult<String> {
        self.oc
            .oc(&["delete", "project", name, "--ignore-not-found", "--grace-period=1"])
            .await
    }
}

fn items(list: &Value) -> Vec<Value> {
    list.get("items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// `metadata.name` of every item in a `List` document
pub fn item_names(list: &Value) -> Vec<String> {
    items(list)
        .iter()
        .filter_map(|item| item.pointer("/metadata/name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

fn lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}
