//! Quotes ETL - quote events extraction into an analytics database

use anyhow::{Context, Result};
use clap::Parser;
use quotes_common::config::ConfigFile;
use quotes_common::logging::{init_logging, LogConfig};
use quotes_etl::event_store::HttpEventStore;
use quotes_etl::pipeline::{Pipeline, PipelineConfig};
use std::path::PathBuf;
use tracing::dispatcher::with_default;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "quotes-etl")]
#[command(author, version, about = "Executing quotes extraction ETL")]
struct Cli {
    /// YAML config file to be used in the report
    config_file: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // LOG_* environment variables pick the sinks
    let logging = init_logging(&LogConfig::from_env()?)?;
    let dispatch = logging.dispatch().clone();

    let config = ConfigFile::load(&cli.config_file)
        .and_then(|file| PipelineConfig::from_file(&file))
        .context("Failed to load configuration")?;

    let source = HttpEventStore::new(&config.event_store).context("Failed to create event store client")?;
    let pipeline = Pipeline::new(config.etl, &config.companies_house)?.with_dispatch(dispatch.clone());

    let summary = pipeline
        .run(&source)
        .await
        .inspect_err(|e| with_default(&dispatch, || error!("Quote events ETL failed: {:#}", e)))?;

    with_default(&dispatch, || {
        info!(
            run_dir = %summary.run_dir.display(),
            database = %summary.database.display(),
            "Quote events ETL finished"
        )
    });

    Ok(())
}
