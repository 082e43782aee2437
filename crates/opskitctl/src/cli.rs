use clap::{CommandFactory, FromArgMatches, Parser};
use opskit_core::StrategyRegistry;
use opskit_strategies::StrategyContext;

use crate::run;

/// opskit - run one operational strategy against Jenkins, Jira,
/// Elasticsearch, Gerrit, Karaf, OpenShift or Git
#[derive(Parser, Debug)]
#[command(name = "opskit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Strategy name followed by its positional parameters
    #[arg(
        value_name = "STRATEGY",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub strategy: Vec<String>,
}

impl Cli {
    /// Parse the command line with the strategy list rendered into `--help`
    pub fn parse_with_help(registry: &StrategyRegistry<StrategyContext>) -> Self {
        let matches = Self::command().after_help(registry.usage()).get_matches();
        Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }

    pub async fn execute(self, registry: &StrategyRegistry<StrategyContext>) -> anyhow::Result<()> {
        let mut words = self.strategy.into_iter();
        let Some(name) = words.next() else {
            anyhow::bail!("no strategy given, see --help");
        };
        run::execute(registry, &name, words.collect()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_strategy_arguments_keep_hyphens() {
        let cli = Cli::try_parse_from(["opskit", "LogWorkInJira", "OPS-1", "1h", "-fixed flaky test"]).unwrap();
        assert_eq!(cli.strategy, vec!["LogWorkInJira", "OPS-1", "1h", "-fixed flaky test"]);
    }

    #[test]
    fn test_strategy_required() {
        assert!(Cli::try_parse_from(["opskit"]).is_err());
    }
}
