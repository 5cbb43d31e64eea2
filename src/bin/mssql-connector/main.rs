mod args;

use std::fs::File;
use std::sync::Arc;

use clap::Parser;
use mssql_connector::prelude::*;
use tracing::{Level, error, info};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

use crate::args::Args;

async fn run(args: Args) -> Result<(), ConnectorError> {
    let config = ConnectionConfig::from_json_file(&args.config)?;
    let policy = RetryPolicy::new()
        .max_attempts(args.attempts)
        .factor(args.factor);

    if args.azure {
        let engine = build_engine_descriptor(&config, &ProcessEnv, args.strategy.into())?;
        info!("azure engine: {}", engine.redacted_url());
        if args.connect {
            let conn = engine.connect_with_policy(policy).await?;
            info!("connected to {}:{}", engine.host(), engine.port());
            conn.close().await?;
        }
        return Ok(());
    }

    let mut factory = ConnectionFactory::new(TiberiusDriver::new()).with_policy(policy);
    for statement in args.session_statements {
        factory = factory.with_session_statement(statement);
    }
    let conn = factory.open(&config).await?;
    info!("connected to {} / {}", config.host, config.database);
    conn.close().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let log_file = match &args.log {
        Some(path) => match File::create(path) {
            Ok(file) => Some(Arc::new(file)),
            Err(err) => {
                eprintln!("failed to open log file {}: {err}", path.display());
                std::process::exit(1);
            }
        },
        None => None,
    };
    // stderr always, plus the --log file when given
    let log_writer = match log_file {
        Some(file) => BoxMakeWriter::new(file),
        None => BoxMakeWriter::new(std::io::sink),
    };
    let writer = std::io::stderr.and(log_writer);

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(false)
        .with_max_level(Level::INFO)
        .init();

    if let Err(err) = run(args).await {
        error!("{err}");
        std::process::exit(1);
    }
}
