//! Strategy registry resolution and construction failures

mod common;

use common::{args, context};
use opskit_core::{OpsError, Settings};
use opskit_strategies::builtin_registry;

const ALL_STRATEGIES: &[&str] = &[
    "WhoAmI",
    "ViewHealthReport",
    "AllJobsInView",
    "CloneJob",
    "BuildJob",
    "JobInfo",
    "JobHealthReport",
    "LastBuildConsoleOutput",
    "PullBuildArtifactsAndRobotReports",
    "PullBuildArtifacts",
    "CreateJiraFromLastJobsExecution",
    "GetJiraIssue",
    "LogWorkInJira",
    "MonitorElasticClusterHealth",
    "ElasticClusterState",
    "ElasticClusterHealth",
    "ElasticClusterStats",
    "AllCurrentElasticTasks",
    "ElasticIndexInfo",
    "SuggestAddGerritReviewers",
    "AddTopicToGerritChange",
    "MonitorKarafBundleList",
    "OpenShiftProjects",
    "GitRecentCommits",
];

#[test]
fn test_every_strategy_registered() {
    let registry = builtin_registry();
    assert_eq!(registry.len(), ALL_STRATEGIES.len());
    for name in ALL_STRATEGIES {
        assert!(registry.get(name).is_some(), "{} is not registered", name);
    }
}

#[test]
fn test_usage_lists_parameters() {
    let usage = builtin_registry().usage();
    assert!(usage.starts_with("Possible Strategies are:"));
    assert!(usage.contains("Strategy: LogWorkInJira"));
    assert!(usage.contains("Params: [issue_key, time_spent, comment]"));
    assert!(usage.contains("Params: [interval_seconds, [verbose]]"));
    assert!(usage.contains("Params: []"));
}

#[tokio::test]
async fn test_unknown_name_acquires_nothing() {
    let t = context(Settings::default(), &[]);
    let err = builtin_registry()
        .build("jobinfo", args(&["nightly"]), t.ctx.clone())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, OpsError::StrategyNotFound(ref name) if name == "jobinfo"));
    assert!(t.ctx.clients().acquired().is_empty());
}

#[tokio::test]
async fn test_argument_errors_before_clients() {
    let registry = builtin_registry();
    let cases: &[(&str, &[&str])] = &[
        ("JobInfo", &[]),
        ("JobInfo", &["nightly", "extra"]),
        ("CloneJob", &["only-source"]),
        ("PullBuildArtifacts", &["nightly", "latest"]),
        ("MonitorElasticClusterHealth", &["0"]),
        ("MonitorElasticClusterHealth", &["5", "sometimes"]),
        ("ElasticClusterHealth", &["surplus"]),
        ("SuggestAddGerritReviewers", &["core"]),
    ];

    for (name, values) in cases {
        let t = context(Settings::default(), &[]);
        let err = registry
            .build(name, args(values), t.ctx.clone())
            .await
            .err()
            .unwrap_or_else(|| panic!("{} {:?} should fail", name, values));
        assert!(
            matches!(err, OpsError::InvalidArguments { ref strategy, .. } if strategy == *name),
            "{} {:?}: unexpected {}",
            name,
            values,
            err
        );
        assert!(t.ctx.clients().acquired().is_empty());
    }
}

#[tokio::test]
async fn test_missing_endpoint_is_config_error() {
    let t = context(Settings::default(), &[]);
    let err = builtin_registry()
        .build("ElasticClusterHealth", vec![], t.ctx.clone())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, OpsError::Config(ref m) if m.contains("ELASTIC_URL")));
    assert!(err.is_construction_error());
    assert_eq!(t.ctx.clients().acquired(), vec!["elastic"]);
}

#[tokio::test]
async fn test_git_strategy_needs_repository() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_string_lossy().to_string();
    let t = context(Settings::default(), &[]);
    let err = builtin_registry()
        .build("GitRecentCommits", args(&[path.as_str()]), t.ctx.clone())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, OpsError::Connection { ref service, .. } if service == "git"));
}
