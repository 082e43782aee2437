//! Shared transports for service clients
//!
//! `RestClient` wraps a `reqwest::Client` bound to one base URL with
//! optional basic auth. Every non-2xx answer becomes `OpsError::Http`.
//! `execute_command` runs a CLI backend and captures its output.

use opskit_core::{OpsError, OpsResult};
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Authenticated REST transport for one backend
#[derive(Debug, Clone)]
pub struct RestClient {
    service: &'static str,
    base_url: String,
    client: reqwest::Client,
    auth: Option<(String, String)>,
}

impl RestClient {
    /// Build a transport; `timeout_secs = None` leaves requests unbounded
    pub fn new(
        service: &'static str,
        base_url: &str,
        auth: Option<(String, String)>,
        timeout_secs: Option<u64>,
    ) -> OpsResult<Self> {
        validate_endpoint(service, base_url)?;

        let mut builder = reqwest::Client::builder()
            .user_agent(format!("opskit/{}", opskit_core::VERSION));
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| OpsError::connection(service, format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            auth,
        })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join a path onto the base URL
    pub fn url(&self, path: &str) -> String {
        if path.is_empty() {
            return self.base_url.clone();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Start a request with auth applied
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(service = self.service, method = %method, url = %url, "HTTP request");
        let builder = self.client.request(method, url);
        match &self.auth {
            Some((user, secret)) => builder.basic_auth(user, Some(secret)),
            None => builder,
        }
    }

    /// Send a request, mapping transport failures and non-2xx statuses
    pub async fn send(&self, request: RequestBuilder) -> OpsResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| OpsError::connection(self.service, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OpsError::Http {
                service: self.service.to_string(),
                status: status.as_u16(),
                body: truncate(&body, 500),
            });
        }
        Ok(response)
    }

    /// Decode a response body as JSON; an empty body decodes to `null`
    pub async fn json_body(&self, response: Response) -> OpsResult<serde_json::Value> {
        let text = response
            .text()
            .await
            .map_err(|e| OpsError::parse(self.service, e))?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| OpsError::parse(self.service, e))
    }

    pub async fn get_json(&self, path: &str) -> OpsResult<serde_json::Value> {
        let response = self.send(self.request(Method::GET, path)).await?;
        self.json_body(response).await
    }

    pub async fn get_text(&self, path: &str) -> OpsResult<String> {
        let response = self.send(self.request(Method::GET, path)).await?;
        response.text().await.map_err(|e| OpsError::parse(self.service, e))
    }

    pub async fn get_bytes(&self, path: &str) -> OpsResult<Vec<u8>> {
        let response = self.send(self.request(Method::GET, path)).await?;
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| OpsError::parse(self.service, e))
    }

    /// Send `method` with an optional JSON body and decode the JSON reply
    pub async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> OpsResult<serde_json::Value> {
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = self.send(request).await?;
        self.json_body(response).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> OpsResult<serde_json::Value> {
        self.send_json(Method::POST, path, body).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> OpsResult<serde_json::Value> {
        self.send_json(Method::PUT, path, body).await
    }

    pub async fn delete(&self, path: &str) -> OpsResult<serde_json::Value> {
        self.send_json::<serde_json::Value>(Method::DELETE, path, None).await
    }

    /// `HEAD` a path; 200 means present, 404 means absent
    pub async fn exists(&self, path: &str) -> OpsResult<bool> {
        let response = self
            .request(Method::HEAD, path)
            .send()
            .await
            .map_err(|e| OpsError::connection(self.service, e))?;
        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(OpsError::Http {
                service: self.service.to_string(),
                status,
                body: String::new(),
            }),
        }
    }
}

/// Reject endpoints that are not http(s) URLs
pub fn validate_endpoint(service: &str, endpoint: &str) -> OpsResult<()> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Ok(())
    } else {
        Err(OpsError::config(format!(
            "{} endpoint must start with http:// or https://, got '{}'",
            service, endpoint
        )))
    }
}

/// Percent-encode one URL path segment
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Resolve a program path: explicit paths must exist, bare names go through `PATH`
pub fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        program.exists().then(|| program.to_path_buf())
    } else {
        which::which(program).ok()
    }
}

/// Execute a command and return structured output
pub async fn execute_command(
    program: &str,
    args: &[&str],
    working_dir: Option<&str>,
    timeout_secs: Option<u64>,
) -> OpsResult<CommandOutput> {
    use tokio::process::Command;

    let mut cmd = Command::new(program);
    cmd.args(args);

    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());

    debug!(program = %program, args = ?args, "Spawning command");
    let child = cmd.spawn().map_err(|e| OpsError::Command {
        program: program.to_string(),
        code: -1,
        stderr: format!("failed to spawn: {}", e),
    })?;

    let output = match timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), child.wait_with_output())
            .await
            .map_err(|_| OpsError::Command {
                program: program.to_string(),
                code: -1,
                stderr: format!("timed out after {}s", secs),
            })??,
        None => child.wait_with_output().await?,
    };

    Ok(CommandOutput {
        program: program.to_string(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        success: output.status.success(),
    })
}

/// Command execution output
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    pub program: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandOutput {
    /// Turn a failed exit status into `OpsError::Command`
    pub fn into_result(self) -> OpsResult<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(OpsError::Command {
                program: self.program,
                code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("elastic", "http://es:9200").is_ok());
        assert!(validate_endpoint("elastic", "https://es.example.com").is_ok());
        assert!(validate_endpoint("elastic", "es:9200").is_err());
    }

    #[test]
    fn test_url_join() {
        let client = RestClient::new("test", "http://host:8080/", None, None).unwrap();
        assert_eq!(client.url("/api/json"), "http://host:8080/api/json");
        assert_eq!(client.url("api/json"), "http://host:8080/api/json");
        assert_eq!(client.url(""), "http://host:8080");
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("plain"), "plain");
        assert_eq!(encode_segment("with space"), "with%20space");
        assert_eq!(encode_segment("group/project"), "group%2Fproject");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééé", 3), "é...");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("nope")
            .create_async()
            .await;

        let client = RestClient::new("test", &server.url(), None, None).unwrap();
        let err = client.get_json("/missing").await.unwrap_err();
        assert!(matches!(err, OpsError::Http { status: 404, ref body, .. } if body == "nope"));
    }

    #[tokio::test]
    async fn test_empty_body_is_null() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/empty")
            .with_status(204)
            .create_async()
            .await;

        let client = RestClient::new("test", &server.url(), None, None).unwrap();
        let value = client.post_json::<serde_json::Value>("/empty", None).await.unwrap();
        assert!(value.is_null());
    }

    #[tokio::test]
    async fn test_basic_auth_header_sent() {
        let mut server = mockito::Server::new_async().await;
        // base64("bob:secret")
        let m = server
            .mock("GET", "/me")
            .match_header("authorization", "Basic Ym9iOnNlY3JldA==")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let client = RestClient::new(
            "test",
            &server.url(),
            Some(("bob".to_string(), "secret".to_string())),
            None,
        )
        .unwrap();
        let value = client.get_json("/me").await.unwrap();
        assert_eq!(value["ok"], true);
        m.assert_async().await;
    }

    #[test]
    fn test_resolve_program() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("client");
        std::fs::write(&script, "").unwrap();
        assert_eq!(resolve_program(&script), Some(script.clone()));
        assert!(resolve_program(&dir.path().join("missing")).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_command_failure() {
        let output = execute_command("sh", &["-c", "echo oops >&2; exit 3"], None, None)
            .await
            .unwrap();
        assert_eq!(output.exit_code, 3);
        let err = output.into_result().unwrap_err();
        assert!(matches!(err, OpsError::Command { code: 3, ref stderr, .. } if stderr == "oops"));
    }
}
