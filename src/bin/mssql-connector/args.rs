use clap::{Parser, ValueEnum};
use mssql_connector::{ResolutionStrategy, RetryPolicy};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum StrategyArg {
    /// Environment variables only
    Env,
    /// Environment variables, then the config file
    EnvThenConfig,
}

impl From<StrategyArg> for ResolutionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Env => ResolutionStrategy::EnvironmentOnly,
            StrategyArg::EnvThenConfig => ResolutionStrategy::EnvironmentThenConfig,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Open and verify a SQL Server / Azure SQL connection")]
pub(crate) struct Args {
    /// JSON config with user, password, host, database and optional port
    #[arg(long)]
    pub(crate) config: PathBuf,
    /// Build the Azure SQL engine descriptor instead of opening the primary connection
    #[arg(long)]
    pub(crate) azure: bool,
    #[arg(long, value_enum, default_value = "env")]
    pub(crate) strategy: StrategyArg,
    /// With --azure, also connect through the descriptor
    #[arg(long)]
    pub(crate) connect: bool,
    /// Total connection attempts
    #[arg(long, default_value_t = 5)]
    pub(crate) attempts: u32,
    /// Backoff multiplier between attempts (finite, at least 1.0)
    #[arg(long, default_value_t = 2.0, value_parser = parse_factor)]
    pub(crate) factor: f64,
    /// Statements to run on the new session, in order
    #[arg(long = "session-statement")]
    pub(crate) session_statements: Vec<String>,
    /// Also write log lines to this file
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
}

fn parse_factor(raw: &str) -> Result<f64, String> {
    let factor: f64 = raw.parse().map_err(|e| format!("{raw:?} is not a number: {e}"))?;
    if RetryPolicy::is_valid_factor(factor) {
        Ok(factor)
    } else {
        Err(format!("backoff factor must be finite and at least 1.0, got {raw}"))
    }
}
