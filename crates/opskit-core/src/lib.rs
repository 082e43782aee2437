// opskit Core - Foundation types and traits for the strategy runner
//
// This crate holds everything the strategy dispatch needs that does not
// depend on a particular backend: the error taxonomy, the `Strategy` trait,
// positional argument coercion, the executor, the name -> factory registry,
// cancellable polling and backend settings.

pub mod error;
pub mod executor;
pub mod poll;
pub mod registry;
pub mod settings;
pub mod strategy;

// Re-export core types
pub use error::{OpsError, OpsResult};
pub use executor::Executor;
pub use poll::{PollLoop, PollOutcome};
pub use registry::{BuildFn, StrategyDescriptor, StrategyRegistry};
pub use settings::{
    Credentials, EnvLookup, GerritInstance, GerritSettings, Settings, TicketTemplate,
};
pub use strategy::{parse_bool, Strategy, StrategyArgs, StrategyOutput};

pub use tokio_util::sync::CancellationToken;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
