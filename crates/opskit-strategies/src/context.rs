//! Strategy context and lazy client acquisition
//!
//! Factories receive a [`StrategyContext`] and ask its [`ClientProvider`]
//! for exactly the clients their strategy calls. Nothing connects until a
//! factory asks.

use opskit_clients::{
    ElasticClient, GerritClient, GitRepo, JenkinsClient, JiraClient, KarafClient, OpenShiftClient,
};
use opskit_core::settings::process_env;
use opskit_core::{CancellationToken, OpsResult, Settings};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Environment lookup shared across strategy tasks
pub type SharedEnv = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Sink for progress lines emitted while a strategy runs
pub type Reporter = Arc<dyn Fn(&str) + Send + Sync>;

/// Builds service clients on demand from settings
#[derive(Clone)]
pub struct ClientProvider {
    settings: Arc<Settings>,
    env: SharedEnv,
    acquired: Arc<Mutex<Vec<&'static str>>>,
}

impl ClientProvider {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            env: Arc::new(process_env),
            acquired: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Backends acquired so far, in order
    pub fn acquired(&self) -> Vec<&'static str> {
        self.acquired
            .lock()
            .map(|names| names.clone())
            .unwrap_or_default()
    }

    fn record(&self, backend: &'static str) {
        info!(backend, "Acquiring client");
        if let Ok(mut names) = self.acquired.lock() {
            names.push(backend);
        }
    }

    pub async fn jenkins(&self) -> OpsResult<JenkinsClient> {
        self.record("jenkins");
        JenkinsClient::from_settings(&self.settings, &*self.env).await
    }

    pub async fn jira(&self) -> OpsResult<JiraClient> {
        self.record("jira");
        JiraClient::from_settings(&self.settings, &*self.env).await
    }

    pub async fn elastic(&self) -> OpsResult<ElasticClient> {
        self.record("elastic");
        ElasticClient::from_settings(&self.settings, &*self.env).await
    }

    /// Gerrit server configured for `project`
    pub async fn gerrit(&self, project: &str) -> OpsResult<GerritClient> {
        self.record("gerrit");
        let instance = self.settings.gerrit.instance_for(project)?;
        GerritClient::from_instance(instance, &*self.env, self.settings.request_timeout_secs).await
    }

    pub async fn karaf(&self) -> OpsResult<KarafClient> {
        self.record("karaf");
        KarafClient::from_settings(&self.settings)
    }

    pub async fn openshift(&self) -> OpsResult<OpenShiftClient> {
        self.record("openshift");
        OpenShiftClient::from_settings(&self.settings, &*self.env).await
    }

    pub async fn git(&self, path: &Path) -> OpsResult<GitRepo> {
        self.record("git");
        GitRepo::open(path)
    }
}

/// Everything a strategy factory may need
#[derive(Clone)]
pub struct StrategyContext {
    clients: ClientProvider,
    cancel: CancellationToken,
    reporter: Reporter,
}

impl StrategyContext {
    /// Context reading credentials from the process environment and
    /// reporting progress on stdout
    pub fn new(settings: Settings, cancel: CancellationToken) -> Self {
        Self {
            clients: ClientProvider::new(settings),
            cancel,
            reporter: Arc::new(|line: &str| println!("{}", line)),
        }
    }

    /// Replace the environment lookup used to resolve credentials
    pub fn with_env<F>(mut self, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.clients.env = Arc::new(env);
        self
    }

    pub fn with_reporter<F>(mut self, reporter: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.reporter = Arc::new(reporter);
        self
    }

    pub fn clients(&self) -> &ClientProvider {
        &self.clients
    }

    pub fn settings(&self) -> &Settings {
        self.clients.settings()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn reporter(&self) -> Reporter {
        self.reporter.clone()
    }
}
