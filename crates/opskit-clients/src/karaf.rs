//! Apache Karaf client
//!
//! Drives the Karaf `client` script: every call runs
//! `<client> -- <command> [args]` and returns its stdout.
//!
//! ## Prerequisites
//!
//! - `KARAF_CLIENT` (or `karaf.client`) points at the client script
//! - The script may prompt for a password on each call

use opskit_core::{OpsError, OpsResult, Settings};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::common::{execute_command, resolve_program};

/// Handle to a Karaf container reached through its client script
#[derive(Debug, Clone)]
pub struct KarafClient {
    client: PathBuf,
}

impl KarafClient {
    /// Verify the client script exists (or resolves on `PATH`)
    pub fn connect(client: &Path) -> OpsResult<Self> {
        let resolved = resolve_program(client).ok_or_else(|| {
            OpsError::connection("karaf", format!("client {} not found", client.display()))
        })?;
        info!(client = %resolved.display(), "Using Karaf client");
        Ok(Self { client: resolved })
    }

    pub fn from_settings(settings: &Settings) -> OpsResult<Self> {
        let client = settings.karaf.client.as_deref().ok_or_else(|| {
            OpsError::config("Karaf client not configured (set KARAF_CLIENT or the settings file)")
        })?;
        Self::connect(client)
    }

    pub fn client(&self) -> &Path {
        &self.client
    }

    /// Run one console command; a non-zero exit becomes `OpsError::Command`
    pub async fn run(&self, command: &str, args: &[&str]) -> OpsResult<String> {
        let program = self.client.to_string_lossy();
        let mut argv = vec!["--", command];
        argv.extend(args.iter().copied().filter(|a| !a.is_empty()));
        debug!(command = %command, args = ?args, "Running Karaf command");
        let output = execute_command(&program, &argv, None, None).await?.into_result()?;
        Ok(output.stdout)
    }

    pub fn bundle(&self) -> Bundle<'_> {
        Bundle { karaf: self }
    }
}

/// `bundle:*` commands. Methods taking `bundle_id` accept `""` for "all".
pub struct Bundle<'a> {
    karaf: &'a KarafClient,
}

impl Bundle<'_> {
    async fn cmd(&self, sub: &str, args: &[&str]) -> OpsResult<String> {
        self.karaf.run(&format!("bundle:{}", sub), args).await
    }

    pub async fn install(&self, url: &str) -> OpsResult<String> {
        self.cmd("install", &[url]).await
    }

    pub async fn diag(&self) -> OpsResult<String> {
        self.cmd("diag", &[]).await
    }

    pub async fn refresh(&self) -> OpsResult<String> {
        self.cmd("refresh", &[]).await
    }

    pub async fn resolve(&self, bundle_id: &str) -> OpsResult<String> {
        self.cmd("resolve", &[bundle_id]).await
    }

    pub async fn start(&self, bundle_id: &str) -> OpsResult<String> {
        self.cmd("start", &[bundle_id]).await
    }

    pub async fn stop(&self, bundle_id: &str) -> OpsResult<String> {
        self.cmd("stop", &[bundle_id]).await
    }

    pub async fn uninstall(&self, bundle_id: &str) -> OpsResult<String> {
        self.cmd("uninstall", &[bundle_id]).await
    }

    pub async fn update(&self, bundle_id: &str) -> OpsResult<String> {
        self.cmd("update", &[bundle_id]).await
    }

    pub async fn watch(&self, bundle_id: &str) -> OpsResult<String> {
        self.cmd("watch", &[bundle_id]).await
    }

    pub async fn info(&self, bundle_id: &str) -> OpsResult<String> {
        self.cmd("info", &[bundle_id]).await
    }

    pub async fn list(&self) -> OpsResult<String> {
        self.cmd("list", &[]).await
    }

    pub async fn capabilities(&self, bundle_id: &str) -> OpsResult<String> {
        self.cmd("capabilities", &[bundle_id]).await
    }

    pub async fn classes(&self, bundle_id: &str) -> OpsResult<String> {
        self.cmd("classes", &[bundle_id]).await
    }

    pub async fn find_class(&self, class_name: &str) -> OpsResult<String> {
        self.cmd("find-class", &[class_name]).await
    }

    pub async fn headers(&self, bundle_id: &str) -> OpsResult<String> {
        self.cmd("headers", &[bundle_id]).await
    }

    pub async fn id(&self, symbolic_name: &str) -> OpsResult<String> {
        self.cmd("id", &[symbolic_name]).await
    }

    pub async fn services(&self, bundle_id: &str) -> OpsResult<String> {
        self.cmd("services", &[bundle_id]).await
    }

    pub async fn start_level(&self, bundle_id: &str) -> OpsResult<String> {
        self.cmd("start-level", &[bundle_id]).await
    }

    pub async fn status(&self, bundle_id: &str) -> OpsResult<String> {
        self.cmd("status", &[bundle_id]).await
    }

    pub async fn tree_show(&self, bundle_id: &str, show_versions: bool) -> OpsResult<String> {
        let versions = if show_versions { "-v" } else { "" };
        self.cmd("tree-show", &[versions, bundle_id]).await
    }
}
