#![allow(dead_code)]

use opskit_core::{CancellationToken, Settings};
use opskit_strategies::StrategyContext;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Context with a fixed environment and a reporter collecting lines
pub struct TestContext {
    pub ctx: StrategyContext,
    pub cancel: CancellationToken,
    pub lines: Arc<Mutex<Vec<String>>>,
}

pub fn context(settings: Settings, env: &[(&str, &str)]) -> TestContext {
    context_cancelling_after(settings, env, None)
}

/// Like [`context`], but cancels once `limit` reported lines contain `marker`
pub fn context_cancelling_after(
    settings: Settings,
    env: &[(&str, &str)],
    cancel_on: Option<(&'static str, usize)>,
) -> TestContext {
    let env: HashMap<String, String> = env
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let cancel = CancellationToken::new();
    let lines = Arc::new(Mutex::new(Vec::new()));

    let sink = lines.clone();
    let token = cancel.clone();
    let ctx = StrategyContext::new(settings, cancel.clone())
        .with_env(move |name| env.get(name).cloned())
        .with_reporter(move |line| {
            let mut lines = sink.lock().unwrap();
            lines.push(line.to_string());
            if let Some((marker, limit)) = cancel_on {
                if lines.iter().filter(|l| l.contains(marker)).count() >= limit {
                    token.cancel();
                }
            }
        });

    TestContext { ctx, cancel, lines }
}

pub fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub const JENKINS_ENV: &[(&str, &str)] = &[("JENKINS_USER", "jenkins-bot"), ("JENKINS_TOKEN", "11aa22bb")];
