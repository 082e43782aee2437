//! Polling strategies and the remaining backends

mod common;

use common::{args, context, context_cancelling_after};
use mockito::{Matcher, Server, ServerGuard};
use opskit_core::{GerritInstance, Credentials, OpsError, Settings, StrategyOutput};
use opskit_strategies::builtin_registry;
use serde_json::json;
use std::time::Duration;

async fn elastic_settings(server: &mut ServerGuard) -> Settings {
    server
        .mock("GET", "/")
        .with_body(r#"{"cluster_name":"ops"}"#)
        .create_async()
        .await;
    let mut settings = Settings::default();
    settings.elastic.url = Some(server.url());
    settings
}

#[tokio::test]
async fn test_cluster_state_metric_selection() {
    let mut server = Server::new_async().await;
    let settings = elastic_settings(&mut server).await;

    let filtered = server
        .mock("GET", "/_cluster/state/nodes")
        .with_body(r#"{"nodes":{}}"#)
        .create_async()
        .await;
    let unfiltered = server
        .mock("GET", "/_cluster/state")
        .with_body(r#"{"cluster_name":"ops"}"#)
        .create_async()
        .await;
    let default = server
        .mock("GET", "/_cluster/state/_all")
        .with_body(r#"{"cluster_name":"ops","metadata":{}}"#)
        .create_async()
        .await;

    let registry = builtin_registry();
    for metric in [vec!["nodes"], vec!["bogus"], vec![]] {
        let t = context(settings.clone(), &[]);
        let strategy = registry
            .build("ElasticClusterState", args(&metric), t.ctx.clone())
            .await
            .unwrap();
        strategy.execute().await.unwrap();
    }

    filtered.assert_async().await;
    unfiltered.assert_async().await;
    default.assert_async().await;
}

#[tokio::test]
async fn test_monitor_cluster_health_until_cancelled() {
    let mut server = Server::new_async().await;
    let settings = elastic_settings(&mut server).await;
    let health = server
        .mock("GET", Matcher::Regex(r"^/_cat/health".to_string()))
        .with_body("1700000000 10:00:00 ops green 3 3 10 5 0 0 0 0 - 100.0%\n")
        .expect(2)
        .create_async()
        .await;

    let t = context_cancelling_after(settings, &[], Some(("green", 2)));
    let strategy = builtin_registry()
        .build("MonitorElasticClusterHealth", args(&["1"]), t.ctx.clone())
        .await
        .unwrap();

    let output = tokio::time::timeout(Duration::from_secs(10), strategy.execute())
        .await
        .expect("monitor did not stop after cancellation")
        .unwrap();

    assert!(output.is_none());
    assert!(t.cancel.is_cancelled());
    health.assert_async().await;
    let lines = t.lines.lock().unwrap();
    assert!(lines[0].contains("Press CTRL-C to exit"));
    assert_eq!(lines.len(), 3);
}

#[tokio::test]
async fn test_monitor_stops_on_failed_poll() {
    let mut server = Server::new_async().await;
    let settings = elastic_settings(&mut server).await;
    server
        .mock("GET", Matcher::Regex(r"^/_cat/health".to_string()))
        .with_status(500)
        .with_body("master not discovered")
        .expect(1)
        .create_async()
        .await;

    let t = context(settings, &[]);
    let strategy = builtin_registry()
        .build("MonitorElasticClusterHealth", args(&["1", "true"]), t.ctx.clone())
        .await
        .unwrap();

    let err = strategy.execute().await.unwrap_err();
    assert!(matches!(err, OpsError::Http { status: 500, .. }));
    assert!(!t.cancel.is_cancelled());
}

#[tokio::test]
async fn test_current_tasks_verbose_text() {
    let mut server = Server::new_async().await;
    let settings = elastic_settings(&mut server).await;
    server
        .mock("GET", Matcher::Regex(r"^/_cat/tasks".to_string()))
        .match_query(Matcher::Regex("^v&".to_string()))
        .with_body("action task_id\nindices:data/read/search oTUltX4IQMOUUVeiohTt8A:124\n")
        .create_async()
        .await;

    let t = context(settings, &[]);
    let strategy = builtin_registry()
        .build("AllCurrentElasticTasks", vec![], t.ctx.clone())
        .await
        .unwrap();

    let StrategyOutput::Text(tasks) = strategy.execute().await.unwrap() else {
        panic!("expected text output");
    };
    assert!(tasks.starts_with("action task_id"));
}

fn gerrit_settings(server: &ServerGuard) -> Settings {
    let mut settings = Settings::default();
    settings.gerrit.projects.insert(
        "Core".to_string(),
        GerritInstance {
            url: server.url(),
            credentials: Credentials::new("CORE_GERRIT_USER", "CORE_GERRIT_TOKEN"),
        },
    );
    settings
}

const GERRIT_ENV: &[(&str, &str)] = &[("CORE_GERRIT_USER", "jdoe"), ("CORE_GERRIT_TOKEN", "pw")];

async fn mock_gerrit_login(server: &mut ServerGuard) {
    server
        .mock("GET", "/a/accounts/self")
        .with_body(")]}'\n{\"username\":\"jdoe\"}")
        .create_async()
        .await;
}

#[tokio::test]
async fn test_suggest_and_add_reviewers() {
    let mut server = Server::new_async().await;
    mock_gerrit_login(&mut server).await;
    server
        .mock("GET", "/a/changes/I8473b95934b5732ac55d26311a706c9c2bde9940/suggest_reviewers")
        .with_body(
            ")]}'\n[\
             {\"account\":{\"_account_id\":1000097,\"name\":\"Jane Roe\",\"email\":\"jane.roe@example.com\",\"username\":\"jroe\"},\"count\":1},\
             {\"group\":{\"id\":\"4fd581c0657268f2bdcc26699fbf9ddb76e3a279\",\"name\":\"Joiner\"},\"count\":5}\
             ]",
        )
        .create_async()
        .await;
    let added = server
        .mock("POST", "/a/changes/I8473b95934b5732ac55d26311a706c9c2bde9940/reviewers")
        .match_body(Matcher::Json(json!({"reviewer": "jroe"})))
        .with_body(")]}'\n{\"input\":\"jroe\"}")
        .expect(1)
        .create_async()
        .await;

    let t = context(gerrit_settings(&server), GERRIT_ENV);
    let strategy = builtin_registry()
        .build(
            "SuggestAddGerritReviewers",
            args(&["core", "I8473b95934b5732ac55d26311a706c9c2bde9940", "true"]),
            t.ctx.clone(),
        )
        .await
        .unwrap();

    let StrategyOutput::Json(suggested) = strategy.execute().await.unwrap() else {
        panic!("expected JSON output");
    };
    added.assert_async().await;
    assert_eq!(suggested.as_array().unwrap().len(), 2);
    assert_eq!(
        *t.lines.lock().unwrap(),
        vec!["Added reviewer jroe/Jane Roe/jane.roe@example.com".to_string()]
    );
}

#[tokio::test]
async fn test_add_topic() {
    let mut server = Server::new_async().await;
    mock_gerrit_login(&mut server).await;
    let topic = server
        .mock("PUT", "/a/changes/4711/topic")
        .match_body(Matcher::Json(json!({"topic": "release-2.3"})))
        .with_body(")]}'\n\"release-2.3\"")
        .create_async()
        .await;

    let t = context(gerrit_settings(&server), GERRIT_ENV);
    let strategy = builtin_registry()
        .build("AddTopicToGerritChange", args(&["CORE", "4711", "release-2.3"]), t.ctx.clone())
        .await
        .unwrap();

    assert_eq!(strategy.execute().await.unwrap(), StrategyOutput::Json(json!("release-2.3")));
    topic.assert_async().await;
}

#[tokio::test]
async fn test_monitor_karaf_bundles() {
    let mut settings = Settings::default();
    settings.karaf.client = Some("echo".into());

    let t = context_cancelling_after(settings, &[], Some(("bundle:list", 1)));
    let strategy = builtin_registry()
        .build("MonitorKarafBundleList", args(&["1"]), t.ctx.clone())
        .await
        .unwrap();

    let output = tokio::time::timeout(Duration::from_secs(10), strategy.execute())
        .await
        .unwrap()
        .unwrap();

    assert!(output.is_none());
    let lines = t.lines.lock().unwrap();
    assert_eq!(lines.last().unwrap(), "-- bundle:list");
}
