//! Strategy abstraction
//!
//! A strategy is one selectable unit of work. It is built from positional
//! string arguments, holds the service clients it needs, and exposes a
//! single `execute()` entry point.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::error::{OpsError, OpsResult};

/// Core trait every strategy implements
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Run the strategy and return its result unchanged to the caller
    async fn execute(&self) -> OpsResult<StrategyOutput>;
}

/// Value returned by a strategy
///
/// No common schema is imposed: JSON for structured results, plain text for
/// console-style output, nothing for purely side-effecting work.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutput {
    Json(serde_json::Value),
    Text(String),
    None,
}

impl StrategyOutput {
    /// Serialize any value into a JSON output
    pub fn json<T: Serialize>(value: &T) -> OpsResult<Self> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| OpsError::parse("output", e))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Render the output the way the CLI prints it
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Json(value) => {
                Some(serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()))
            }
            Self::Text(text) => Some(text.clone()),
            Self::None => None,
        }
    }
}

impl From<serde_json::Value> for StrategyOutput {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl fmt::Display for StrategyOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.render() {
            Some(text) => write!(f, "{}", text),
            None => Ok(()),
        }
    }
}

/// Positional constructor arguments for a strategy
///
/// Arguments arrive as strings from the CLI and are consumed in declaration
/// order. Each accessor coerces the next value to the requested type.
#[derive(Debug, Clone)]
pub struct StrategyArgs {
    strategy: String,
    values: VecDeque<String>,
}

impl StrategyArgs {
    pub fn new(strategy: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            strategy: strategy.into(),
            values: values.into(),
        }
    }

    /// Name of the strategy these arguments belong to
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    /// Take the next argument, failing if it is absent or does not parse
    pub fn required<T>(&mut self, name: &str) -> OpsResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.values.pop_front().ok_or_else(|| {
            OpsError::invalid_args(&self.strategy, format!("missing argument '{}'", name))
        })?;
        self.coerce(name, &raw)
    }

    /// Take the next argument if present
    pub fn optional<T>(&mut self, name: &str) -> OpsResult<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.values.pop_front() {
            Some(raw) => self.coerce(name, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Take the next argument as a boolean, defaulting when absent
    pub fn flag(&mut self, name: &str, default: bool) -> OpsResult<bool> {
        match self.values.pop_front() {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                OpsError::invalid_args(
                    &self.strategy,
                    format!("argument '{}' expects a boolean, got '{}'", name, raw),
                )
            }),
            None => Ok(default),
        }
    }

    /// Take the next argument as a polling interval in whole seconds (>= 1)
    pub fn interval_secs(&mut self, name: &str) -> OpsResult<u64> {
        let secs: u64 = self.required(name)?;
        if secs == 0 {
            return Err(OpsError::invalid_args(
                &self.strategy,
                format!("argument '{}' must be at least 1 second", name),
            ));
        }
        Ok(secs)
    }

    /// Reject any arguments left over after the strategy consumed its own
    pub fn finish(self) -> OpsResult<()> {
        if self.values.is_empty() {
            return Ok(());
        }
        Err(OpsError::invalid_args(
            &self.strategy,
            format!(
                "{} unexpected argument(s): {}",
                self.values.len(),
                self.values.iter().cloned().collect::<Vec<_>>().join(" ")
            ),
        ))
    }

    fn coerce<T>(&self, name: &str, raw: &str) -> OpsResult<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        raw.parse::<T>().map_err(|e| {
            OpsError::invalid_args(
                &self.strategy,
                format!("argument '{}' = '{}': {}", name, raw, e),
            )
        })
    }
}

/// Parse a CLI boolean the way operators type them
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> StrategyArgs {
        StrategyArgs::new("Sample", values.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_required_and_optional() {
        let mut a = args(&["nightly", "42"]);
        let job: String = a.required("job_name").unwrap();
        let build: u32 = a.required("build_number").unwrap();
        let metric: Option<String> = a.optional("metric").unwrap();

        assert_eq!(job, "nightly");
        assert_eq!(build, 42);
        assert!(metric.is_none());
        assert!(a.finish().is_ok());
    }

    #[test]
    fn test_missing_required() {
        let mut a = args(&[]);
        let err = a.required::<String>("job_name").unwrap_err();
        assert!(matches!(err, OpsError::InvalidArguments { .. }));
        assert!(err.to_string().contains("job_name"));
    }

    #[test]
    fn test_bad_coercion() {
        let mut a = args(&["forty-two"]);
        let err = a.required::<u32>("build_number").unwrap_err();
        assert!(err.to_string().contains("forty-two"));
    }

    #[test]
    fn test_surplus_arguments_rejected() {
        let mut a = args(&["one", "two"]);
        let _: String = a.required("only").unwrap();
        let err = a.finish().unwrap_err();
        assert!(err.to_string().contains("two"));
    }

    #[test]
    fn test_flag_parsing() {
        let mut a = args(&["True", "no"]);
        assert!(a.flag("verbose", false).unwrap());
        assert!(!a.flag("auto_add", true).unwrap());
        assert!(a.flag("absent", true).unwrap());

        let mut bad = args(&["maybe"]);
        assert!(bad.flag("verbose", false).is_err());
    }

    #[test]
    fn test_interval_must_be_positive() {
        assert_eq!(args(&["5"]).interval_secs("interval_seconds").unwrap(), 5);
        assert!(args(&["0"]).interval_secs("interval_seconds").is_err());
    }

    #[test]
    fn test_output_render() {
        let out = StrategyOutput::Json(serde_json::json!({"a": 1}));
        assert_eq!(out.render().unwrap(), "{\n  \"a\": 1\n}");
        assert_eq!(StrategyOutput::text("plain").render().unwrap(), "plain");
        assert!(StrategyOutput::None.render().is_none());
    }
}
