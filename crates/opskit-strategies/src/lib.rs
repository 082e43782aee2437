// opskit Strategies - Operational tasks composed from service clients
//
// Every strategy is registered by name in `builtin_registry()`. A strategy
// factory parses its positional arguments and acquires only the clients it
// uses through the `StrategyContext`.

pub mod console_parser;
pub mod context;
pub mod strategies;

pub use context::{ClientProvider, Reporter, SharedEnv, StrategyContext};
pub use strategies::builtin_registry;
