//! Built-in strategies
//!
//! Each backend module exposes its descriptors; [`builtin_registry`] gathers
//! them into the table the CLI resolves names against.
//!
//! Factories follow one shape: consume positional arguments, reject
//! leftovers, then acquire the clients the strategy holds.

pub mod elastic;
pub mod gerrit;
pub mod git;
pub mod jenkins;
pub mod jira;
pub mod karaf;
pub mod openshift;

use futures::future::BoxFuture;
use opskit_core::{OpsResult, Strategy, StrategyDescriptor, StrategyRegistry};

use crate::context::StrategyContext;

pub type Descriptor = StrategyDescriptor<StrategyContext>;

pub(crate) type Built = BoxFuture<'static, OpsResult<Box<dyn Strategy>>>;

pub(crate) fn boxed<S: Strategy + 'static>(strategy: S) -> OpsResult<Box<dyn Strategy>> {
    Ok(Box::new(strategy))
}

/// Registry holding every built-in strategy
pub fn builtin_registry() -> StrategyRegistry<StrategyContext> {
    let mut registry = StrategyRegistry::new();
    let groups = [
        jenkins::descriptors(),
        jira::descriptors(),
        elastic::descriptors(),
        gerrit::descriptors(),
        karaf::descriptors(),
        openshift::descriptors(),
        git::descriptors(),
    ];
    for descriptor in groups.into_iter().flatten() {
        registry.register(descriptor);
    }
    registry
}
