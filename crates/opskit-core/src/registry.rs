//! Strategy Registry - name to factory table
//!
//! The registry is filled once at startup. Resolution is an exact,
//! case-sensitive lookup so an unknown name is a checked error and nothing
//! is constructed for it.

use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::{debug, info};

use crate::error::{OpsError, OpsResult};
use crate::strategy::{Strategy, StrategyArgs};

/// Factory building a strategy from its arguments and a shared context
pub type BuildFn<C> = fn(StrategyArgs, C) -> BoxFuture<'static, OpsResult<Box<dyn Strategy>>>;

/// Static description of a registered strategy
pub struct StrategyDescriptor<C> {
    /// Exact name used on the command line
    pub name: &'static str,
    /// One-line documentation shown in help output
    pub summary: &'static str,
    /// Declared parameter names, optional ones wrapped in brackets
    pub params: &'static [&'static str],
    pub build: BuildFn<C>,
}

impl<C> StrategyDescriptor<C> {
    /// Render the help entry for this strategy
    pub fn usage(&self) -> String {
        format!(
            "Strategy: {}\n\tInfo: {}\n\tParams: [{}]\n",
            self.name,
            self.summary,
            self.params.join(", ")
        )
    }
}

/// Registry of every selectable strategy
pub struct StrategyRegistry<C> {
    entries: BTreeMap<&'static str, StrategyDescriptor<C>>,
}

impl<C> Default for StrategyRegistry<C> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<C> StrategyRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strategy; a later registration under the same name wins
    pub fn register(&mut self, descriptor: StrategyDescriptor<C>) -> &mut Self {
        debug!(strategy = descriptor.name, "Registering strategy");
        self.entries.insert(descriptor.name, descriptor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&StrategyDescriptor<C>> {
        self.entries.get(name)
    }

    /// Resolve a name or fail with `StrategyNotFound`
    pub fn resolve(&self, name: &str) -> OpsResult<&StrategyDescriptor<C>> {
        self.get(name)
            .ok_or_else(|| OpsError::StrategyNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &StrategyDescriptor<C>> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Help text listing every strategy with its summary and parameters
    pub fn usage(&self) -> String {
        let mut out = String::from("Possible Strategies are:\n\n");
        for descriptor in self.descriptors() {
            let _ = writeln!(out, "{}", descriptor.usage());
        }
        out
    }

    /// Resolve `name` and build it from `values`
    pub async fn build(
        &self,
        name: &str,
        values: Vec<String>,
        context: C,
    ) -> OpsResult<Box<dyn Strategy>> {
        let descriptor = self.resolve(name)?;
        info!(strategy = name, args = values.len(), "Constructing strategy");
        (descriptor.build)(StrategyArgs::new(name, values), context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyOutput;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Echo(String);

    #[async_trait]
    impl Strategy for Echo {
        async fn execute(&self) -> OpsResult<StrategyOutput> {
            Ok(StrategyOutput::text(self.0.clone()))
        }
    }

    type Ctx = Arc<AtomicUsize>;

    fn build_echo(mut args: StrategyArgs, ctx: Ctx) -> BoxFuture<'static, OpsResult<Box<dyn Strategy>>> {
        Box::pin(async move {
            ctx.fetch_add(1, Ordering::SeqCst);
            let word: String = args.required("word")?;
            args.finish()?;
            Ok(Box::new(Echo(word)) as Box<dyn Strategy>)
        })
    }

    fn registry() -> StrategyRegistry<Ctx> {
        let mut registry = StrategyRegistry::new();
        registry.register(StrategyDescriptor {
            name: "Echo",
            summary: "Echo word back",
            params: &["word"],
            build: build_echo,
        });
        registry
    }

    #[tokio::test]
    async fn test_build_registered() {
        let ctx = Arc::new(AtomicUsize::new(0));
        let strategy = registry()
            .build("Echo", vec!["hi".into()], ctx.clone())
            .await
            .unwrap();
        assert_eq!(strategy.execute().await.unwrap(), StrategyOutput::text("hi"));
        assert_eq!(ctx.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_name_builds_nothing() {
        let ctx = Arc::new(AtomicUsize::new(0));
        let err = registry()
            .build("echo", vec![], ctx.clone())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, OpsError::StrategyNotFound(ref n) if n == "echo"));
        assert_eq!(ctx.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_usage_lists_params() {
        let usage = registry().usage();
        assert!(usage.contains("Strategy: Echo"));
        assert!(usage.contains("Info: Echo word back"));
        assert!(usage.contains("Params: [word]"));
    }
}
