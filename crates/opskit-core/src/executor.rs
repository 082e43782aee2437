//! Executor - holds one strategy and runs it on demand

use tracing::debug;

use crate::error::OpsResult;
use crate::strategy::{Strategy, StrategyOutput};

/// Holder and invoker of exactly one strategy
pub struct Executor {
    strategy: Box<dyn Strategy>,
}

impl Executor {
    pub fn new(strategy: Box<dyn Strategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &dyn Strategy {
        self.strategy.as_ref()
    }

    /// Swap the held strategy; the previous one is dropped
    pub fn set_strategy(&mut self, strategy: Box<dyn Strategy>) {
        self.strategy = strategy;
    }

    /// Run the held strategy and hand back its result untouched
    pub async fn execute_strategy(&self) -> OpsResult<StrategyOutput> {
        debug!("Executing held strategy");
        self.strategy.execute().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingStrategy {
        calls: Arc<AtomicUsize>,
        label: &'static str,
    }

    #[async_trait]
    impl Strategy for CountingStrategy {
        async fn execute(&self) -> OpsResult<StrategyOutput> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(StrategyOutput::Json(serde_json::json!({
                "label": self.label,
                "call": n
            })))
        }
    }

    #[tokio::test]
    async fn test_execute_twice_invokes_twice() {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = Executor::new(Box::new(CountingStrategy {
            calls: calls.clone(),
            label: "first",
        }));

        let first = executor.execute_strategy().await.unwrap();
        let second = executor.execute_strategy().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(first, StrategyOutput::Json(serde_json::json!({"label": "first", "call": 1})));
        assert_eq!(second, StrategyOutput::Json(serde_json::json!({"label": "first", "call": 2})));
    }

    #[tokio::test]
    async fn test_set_strategy_replaces_held() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut executor = Executor::new(Box::new(CountingStrategy {
            calls: calls.clone(),
            label: "first",
        }));
        executor.set_strategy(Box::new(CountingStrategy {
            calls: calls.clone(),
            label: "second",
        }));

        let out = executor.execute_strategy().await.unwrap();
        assert_eq!(out, StrategyOutput::Json(serde_json::json!({"label": "second", "call": 1})));
    }
}
