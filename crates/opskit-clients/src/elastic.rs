//! Elasticsearch client
//!
//! Operations are grouped by API family through borrowed views:
//! `es.cat()`, `es.cluster()`, `es.nodes()`, `es.tasks()`, `es.documents()`,
//! `es.indices()`, `es.snapshots()` and `es.watcher()`.
//!
//! The `_cat` endpoints return operator-facing text (or JSON when asked),
//! everything else returns the decoded JSON body unmodified.

use opskit_core::settings::require_url;
use opskit_core::{EnvLookup, OpsError, OpsResult, Settings};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::info;

use crate::common::{encode_segment, RestClient};

const SERVICE: &str = "elastic";

/// Metrics accepted by `_cluster/state/{metric}`
pub const CLUSTER_STATE_METRICS: &[&str] = &[
    "_all",
    "blocks",
    "master_node",
    "metadata",
    "nodes",
    "routing_nodes",
    "routing_table",
    "version",
];

/// Metrics accepted by `_watcher/stats/{metric}`
pub const WATCHER_STATS_METRICS: &[&str] = &["_all", "current_watches", "queued_watches"];

/// Handle to one Elasticsearch cluster
#[derive(Debug, Clone)]
pub struct ElasticClient {
    rest: RestClient,
}

impl ElasticClient {
    /// Connect and verify the cluster answers on its root endpoint
    pub async fn connect(
        url: &str,
        auth: Option<(String, String)>,
        timeout_secs: Option<u64>,
    ) -> OpsResult<Self> {
        let rest = RestClient::new(SERVICE, url, auth, timeout_secs)?;
        rest.get_json("/").await.map_err(|e| match e {
            OpsError::Http { status, .. } => {
                OpsError::connection(SERVICE, format!("ping returned HTTP {}", status))
            }
            other => other,
        })?;
        info!(url = %url, "Connected to Elasticsearch");
        Ok(Self { rest })
    }

    pub async fn from_settings(settings: &Settings, env: EnvLookup<'_>) -> OpsResult<Self> {
        let url = require_url(&settings.elastic.url, "Elasticsearch", "ELASTIC_URL")?;
        let auth = match &settings.elastic.credentials {
            Some(creds) => Some(creds.resolve(env)?),
            None => None,
        };
        Self::connect(url, auth, settings.request_timeout_secs).await
    }

    pub fn base_url(&self) -> &str {
        self.rest.base_url()
    }

    pub fn cat(&self) -> Cat<'_> {
        Cat { rest: &self.rest }
    }

    pub fn cluster(&self) -> Cluster<'_> {
        Cluster { rest: &self.rest }
    }

    pub fn nodes(&self) -> Nodes<'_> {
        Nodes { rest: &self.rest }
    }

    pub fn tasks(&self) -> Tasks<'_> {
        Tasks { rest: &self.rest }
    }

    pub fn documents(&self) -> Documents<'_> {
        Documents { rest: &self.rest }
    }

    pub fn indices(&self) -> Indices<'_> {
        Indices { rest: &self.rest }
    }

    pub fn snapshots(&self) -> Snapshots<'_> {
        Snapshots { rest: &self.rest }
    }

    pub fn watcher(&self) -> Watcher<'_> {
        Watcher { rest: &self.rest }
    }
}

// ============================================================================
// _cat
// ============================================================================

/// Output format for `_cat` endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatFormat {
    #[default]
    Text,
    Json,
}

impl CatFormat {
    fn as_str(&self) -> &'static str {
        match self {
            CatFormat::Text => "text",
            CatFormat::Json => "json",
        }
    }
}

/// Query options shared by every `_cat` call
#[derive(Debug, Clone, Copy, Default)]
pub struct CatOptions {
    /// Include column headers
    pub verbose: bool,
    pub format: CatFormat,
}

impl CatOptions {
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            format: CatFormat::Text,
        }
    }

    fn query(&self) -> String {
        let v = if self.verbose { "v&" } else { "" };
        format!("?{}format={}", v, self.format.as_str())
    }
}

/// `_cat` endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatEndpoint {
    Aliases,
    Allocation,
    AnomalyDetectors,
    Count,
    DataFrameAnalytics,
    Datafeeds,
    FieldData,
    Health,
    Indices,
    Master,
    NodeAttrs,
    Nodes,
    PendingTasks,
    Plugins,
    Recovery,
    Repositories,
    Shards,
    Tasks,
    Templates,
    ThreadPool,
    Transforms,
}

impl CatEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            CatEndpoint::Aliases => "_cat/aliases",
            CatEndpoint::Allocation => "_cat/allocation",
            CatEndpoint::AnomalyDetectors => "_cat/ml/anomaly_detectors",
            CatEndpoint::Count => "_cat/count",
            CatEndpoint::DataFrameAnalytics => "_cat/ml/data_frame/analytics",
            CatEndpoint::Datafeeds => "_cat/ml/datafeeds",
            CatEndpoint::FieldData => "_cat/fielddata",
            CatEndpoint::Health => "_cat/health",
            CatEndpoint::Indices => "_cat/indices",
            CatEndpoint::Master => "_cat/master",
            CatEndpoint::NodeAttrs => "_cat/nodeattrs",
            CatEndpoint::Nodes => "_cat/nodes",
            CatEndpoint::PendingTasks => "_cat/pending_tasks",
            CatEndpoint::Plugins => "_cat/plugins",
            CatEndpoint::Recovery => "_cat/recovery",
            CatEndpoint::Repositories => "_cat/repositories",
            CatEndpoint::Shards => "_cat/shards",
            CatEndpoint::Tasks => "_cat/tasks",
            CatEndpoint::Templates => "_cat/templates",
            CatEndpoint::ThreadPool => "_cat/thread_pool",
            CatEndpoint::Transforms => "_cat/transforms",
        }
    }
}

pub struct Cat<'a> {
    rest: &'a RestClient,
}

impl Cat<'_> {
    /// Call any `_cat` endpoint, optionally narrowed to one target
    /// (an index, field or repository depending on the endpoint)
    pub async fn get(
        &self,
        endpoint: CatEndpoint,
        target: Option<&str>,
        options: CatOptions,
    ) -> OpsResult<String> {
        let path = match target {
            Some(t) => format!("{}/{}", endpoint.path(), encode_segment(t)),
            None => endpoint.path().to_string(),
        };
        self.rest.get_text(&format!("{}{}", path, options.query())).await
    }

    pub async fn health(&self, options: CatOptions) -> OpsResult<String> {
        self.get(CatEndpoint::Health, None, options).await
    }

    pub async fn tasks(&self, options: CatOptions) -> OpsResult<String> {
        self.get(CatEndpoint::Tasks, None, options).await
    }

    pub async fn indices(&self, index: Option<&str>, options: CatOptions) -> OpsResult<String> {
        self.get(CatEndpoint::Indices, index, options).await
    }

    pub async fn count(&self, index: Option<&str>, options: CatOptions) -> OpsResult<String> {
        self.get(CatEndpoint::Count, index, options).await
    }

    pub async fn fielddata(&self, field: Option<&str>, options: CatOptions) -> OpsResult<String> {
        self.get(CatEndpoint::FieldData, field, options).await
    }

    pub async fn snapshots(&self, repository: &str, options: CatOptions) -> OpsResult<String> {
        let path = format!("_cat/snapshots/{}{}", encode_segment(repository), options.query());
        self.rest.get_text(&path).await
    }
}

// ============================================================================
// Cluster
// ============================================================================

pub struct Cluster<'a> {
    rest: &'a RestClient,
}

impl Cluster<'_> {
    pub async fn allocation_explain(&self) -> OpsResult<Value> {
        self.rest.get_json("_cluster/allocation/explain").await
    }

    pub async fn health(&self) -> OpsResult<Value> {
        self.rest.get_json("_cluster/health").await
    }

    pub async fn pending_tasks(&self) -> OpsResult<Value> {
        self.rest.get_json("_cluster/pending_tasks").await
    }

    pub async fn remote_info(&self) -> OpsResult<Value> {
        self.rest.get_json("_remote/info").await
    }

    pub async fn settings(&self) -> OpsResult<Value> {
        self.rest.get_json("_cluster/settings").await
    }

    /// Cluster state filtered to one metric.
    ///
    /// Metrics outside [`CLUSTER_STATE_METRICS`] request the full state.
    pub async fn state(&self, metric: &str) -> OpsResult<Value> {
        self.rest.get_json(&cluster_state_path(metric)).await
    }

    pub async fn stats(&self) -> OpsResult<Value> {
        self.rest.get_json("_cluster/stats").await
    }

    pub async fn xpack_info(&self) -> OpsResult<Value> {
        self.rest.get_json("_xpack").await
    }

    pub async fn xpack_usage(&self) -> OpsResult<Value> {
        self.rest.get_json("_xpack/usage").await
    }
}

fn cluster_state_path(metric: &str) -> String {
    if CLUSTER_STATE_METRICS.contains(&metric) {
        format!("_cluster/state/{}", metric)
    } else {
        "_cluster/state".to_string()
    }
}

// ============================================================================
// Nodes and tasks
// ============================================================================

pub struct Nodes<'a> {
    rest: &'a RestClient,
}

impl Nodes<'_> {
    pub async fn usage(&self) -> OpsResult<Value> {
        self.rest.get_json("_nodes/usage").await
    }

    /// Plain-text hot threads dump
    pub async fn hot_threads(&self) -> OpsResult<String> {
        self.rest.get_text("_nodes/hot_threads").await
    }

    pub async fn info(&self) -> OpsResult<Value> {
        self.rest.get_json("_nodes").await
    }

    pub async fn stats(&self) -> OpsResult<Value> {
        self.rest.get_json("_nodes/stats").await
    }

    pub async fn desired(&self) -> OpsResult<Value> {
        self.rest.get_json("_internal/desired_nodes/_latest").await
    }

    /// Register a node for shutdown; `body` carries `type` and `reason`
    pub async fn shutdown_start(&self, node_id: &str, body: &Value) -> OpsResult<Value> {
        let path = format!("_nodes/{}/shutdown", encode_segment(node_id));
        self.rest.put_json(&path, Some(body)).await
    }

    pub async fn shutdown_cancel(&self, node_id: &str) -> OpsResult<Value> {
        self.rest
            .delete(&format!("_nodes/{}/shutdown", encode_segment(node_id)))
            .await
    }

    pub async fn shutdown_status(&self, node_id: Option<&str>) -> OpsResult<Value> {
        match node_id {
            Some(id) => {
                self.rest
                    .get_json(&format!("_nodes/{}/shutdown", encode_segment(id)))
                    .await
            }
            None => self.rest.get_json("_nodes/shutdown").await,
        }
    }
}

pub struct Tasks<'a> {
    rest: &'a RestClient,
}

impl Tasks<'_> {
    pub async fn list(&self) -> OpsResult<Value> {
        self.rest.get_json("_tasks").await
    }
}

// ============================================================================
// Documents
// ============================================================================

pub struct Documents<'a> {
    rest: &'a RestClient,
}

impl Documents<'_> {
    pub async fn create(&self, index: &str, document: &Value) -> OpsResult<Value> {
        let path = format!("{}/_doc", encode_segment(index));
        self.rest.post_json(&path, Some(document)).await
    }

    pub async fn get(&self, index: &str, id: &str) -> OpsResult<Value> {
        let path = format!("{}/_doc/{}", encode_segment(index), encode_segment(id));
        self.rest.get_json(&path).await
    }

    pub async fn multi_get(&self, index: &str, ids: &[String]) -> OpsResult<Value> {
        let path = format!("{}/_mget", encode_segment(index));
        self.rest.post_json(&path, Some(&json!({ "ids": ids }))).await
    }

    /// Partial update; `body` follows the `_update` API (`doc`, `script`, ...)
    pub async fn update(&self, index: &str, id: &str, body: &Value) -> OpsResult<Value> {
        let path = format!("{}/_update/{}", encode_segment(index), encode_segment(id));
        self.rest.post_json(&path, Some(body)).await
    }

    /// Bulk request; `ndjson` must already be newline-delimited action/source pairs
    pub async fn bulk(&self, ndjson: &str) -> OpsResult<Value> {
        let mut body = ndjson.to_string();
        if !body.ends_with('\n') {
            body.push('\n');
        }
        let request = self
            .rest
            .request(Method::POST, "_bulk")
            .header("Content-Type", "application/x-ndjson")
            .body(body);
        let response = self.rest.send(request).await?;
        self.rest.json_body(response).await
    }

    pub async fn reindex(&self, source_index: &str, dest_index: &str) -> OpsResult<Value> {
        let body = json!({
            "source": { "index": source_index },
            "dest": { "index": dest_index }
        });
        self.rest.post_json("_reindex", Some(&body)).await
    }
}

// ============================================================================
// Indices
// ============================================================================

pub struct Indices<'a> {
    rest: &'a RestClient,
}

impl Indices<'_> {
    pub async fn get(&self, index: &str) -> OpsResult<Value> {
        self.rest.get_json(&encode_segment(index)).await
    }

    pub async fn create(&self, index: &str, body: Option<&Value>) -> OpsResult<Value> {
        self.rest.put_json(&encode_segment(index), body).await
    }

    pub async fn delete(&self, index: &str) -> OpsResult<Value> {
        self.rest.delete(&encode_segment(index)).await
    }

    pub async fn exists(&self, index: &str) -> OpsResult<bool> {
        self.rest.exists(&encode_segment(index)).await
    }

    pub async fn stats(&self, index: &str) -> OpsResult<Value> {
        self.rest
            .get_json(&format!("{}/_stats", encode_segment(index)))
            .await
    }

    pub async fn segments(&self, index: &str) -> OpsResult<Value> {
        self.rest
            .get_json(&format!("{}/_segments", encode_segment(index)))
            .await
    }

    pub async fn recovery(&self, index: &str) -> OpsResult<Value> {
        self.rest
            .get_json(&format!("{}/_recovery", encode_segment(index)))
            .await
    }

    pub async fn clone_to(&self, index: &str, target: &str) -> OpsResult<Value> {
        let path = format!("{}/_clone/{}", encode_segment(index), encode_segment(target));
        self.rest.put_json::<Value>(&path, None).await
    }

    pub async fn close(&self, index: &str) -> OpsResult<Value> {
        self.rest
            .post_json::<Value>(&format!("{}/_close", encode_segment(index)), None)
            .await
    }

    pub async fn alias_exists(&self, alias: &str) -> OpsResult<bool> {
        self.rest
            .exists(&format!("_alias/{}", encode_segment(alias)))
            .await
    }

    pub async fn alias_get(&self, alias: &str) -> OpsResult<Value> {
        self.rest
            .get_json(&format!("_alias/{}", encode_segment(alias)))
            .await
    }

    pub async fn alias_create(&self, index: &str, alias: &str) -> OpsResult<Value> {
        let path = format!("{}/_alias/{}", encode_segment(index), encode_segment(alias));
        self.rest.put_json::<Value>(&path, None).await
    }

    pub async fn alias_delete(&self, index: &str, alias: &str) -> OpsResult<Value> {
        let path = format!("{}/_alias/{}", encode_segment(index), encode_segment(alias));
        self.rest.delete(&path).await
    }

    pub async fn cache_clear(&self, index: &str) -> OpsResult<Value> {
        self.rest
            .post_json::<Value>(&format!("{}/_cache/clear", encode_segment(index)), None)
            .await
    }

    pub async fn dangling_list(&self) -> OpsResult<Value> {
        self.rest.get_json("_dangling").await
    }

    pub async fn dangling_delete(&self, index_uuid: &str) -> OpsResult<Value> {
        let path = format!("_dangling/{}?accept_data_loss=true", encode_segment(index_uuid));
        self.rest.delete(&path).await
    }
}

// ============================================================================
// Snapshots
// ============================================================================

pub struct Snapshots<'a> {
    rest: &'a RestClient,
}

impl Snapshots<'_> {
    fn snapshot_path(repository: &str, snapshot: &str) -> String {
        format!(
            "_snapshot/{}/{}",
            encode_segment(repository),
            encode_segment(snapshot)
        )
    }

    pub async fn create(&self, repository: &str, snapshot: &str) -> OpsResult<Value> {
        self.rest
            .put_json::<Value>(&Self::snapshot_path(repository, snapshot), None)
            .await
    }

    pub async fn restore(&self, repository: &str, snapshot: &str) -> OpsResult<Value> {
        let path = format!("{}/_restore", Self::snapshot_path(repository, snapshot));
        self.rest.post_json::<Value>(&path, None).await
    }

    pub async fn delete(&self, repository: &str, snapshot: &str) -> OpsResult<Value> {
        self.rest
            .delete(&Self::snapshot_path(repository, snapshot))
            .await
    }

    pub async fn status(&self) -> OpsResult<Value> {
        self.rest.get_json("_snapshot/_status").await
    }

    pub async fn repository_create(&self, repository: &str, settings: &Value) -> OpsResult<Value> {
        let path = format!("_snapshot/{}", encode_segment(repository));
        self.rest.put_json(&path, Some(settings)).await
    }

    pub async fn repository_get(&self, repository: &str) -> OpsResult<Value> {
        self.rest
            .get_json(&format!("_snapshot/{}", encode_segment(repository)))
            .await
    }

    pub async fn repository_delete(&self, repository: &str) -> OpsResult<Value> {
        self.rest
            .delete(&format!("_snapshot/{}", encode_segment(repository)))
            .await
    }

    pub async fn repository_verify(&self, repository: &str) -> OpsResult<Value> {
        let path = format!("_snapshot/{}/_verify", encode_segment(repository));
        self.rest.post_json::<Value>(&path, None).await
    }

    pub async fn repository_cleanup(&self, repository: &str) -> OpsResult<Value> {
        let path = format!("_snapshot/{}/_cleanup", encode_segment(repository));
        self.rest.post_json::<Value>(&path, None).await
    }

    pub async fn repository_analyze(&self, repository: &str) -> OpsResult<Value> {
        let path = format!("_snapshot/{}/_analyze", encode_segment(repository));
        self.rest.post_json::<Value>(&path, None).await
    }
}

pub struct Watcher<'a> {
    rest: &'a RestClient,
}

impl Watcher<'_> {
    pub async fn stats(&self, metric: &str) -> OpsResult<Value> {
        if WATCHER_STATS_METRICS.contains(&metric) {
            self.rest
                .get_json(&format!("_watcher/stats/{}", metric))
                .await
        } else {
            self.rest.get_json("_watcher/stats").await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_state_path() {
        assert_eq!(cluster_state_path("nodes"), "_cluster/state/nodes");
        assert_eq!(cluster_state_path("_all"), "_cluster/state/_all");
        assert_eq!(cluster_state_path("bogus"), "_cluster/state");
    }

    #[test]
    fn test_cat_query() {
        assert_eq!(CatOptions::default().query(), "?format=text");
        assert_eq!(CatOptions::verbose().query(), "?v&format=text");
        let json = CatOptions {
            verbose: false,
            format: CatFormat::Json,
        };
        assert_eq!(json.query(), "?format=json");
    }

    #[test]
    fn test_cat_paths() {
        assert_eq!(CatEndpoint::Health.path(), "_cat/health");
        assert_eq!(CatEndpoint::DataFrameAnalytics.path(), "_cat/ml/data_frame/analytics");
    }
}
