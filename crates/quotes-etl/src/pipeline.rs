// ETL Orchestration
//
// One run, strictly in order:
// 1. create the timestamped run directory
// 2. extract the stream into a JSON lines file
// 3. project the events into the quotes and quote items CSV files
// 4. create the SQLite database and load both files
// 5. fetch the monthly Companies House snapshot and load it as-is
//
// Any error aborts the run, except an unpublished Companies House file which
// only skips step 5.

use crate::companies_house::{CompaniesHouseConfig, CompaniesHouseFetcher};
use crate::event_store::{extract_events_from_stream, EventSource, EventStoreConfig, ExtractStats};
use crate::projection::{
    MissingAgencyProduct, ProjectionStats, Projector, DEFAULT_IGNORED_EVENTS, PRODUCT_HEADERS,
    QUOTE_HEADERS,
};
use crate::sink::{Header, LoadStats, SqliteSink, TabularSink};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use quotes_common::config::ConfigFile;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::instrument::WithSubscriber;
use tracing::{info, Dispatch};

pub const EVENTS_FILE: &str = "quote_events.json";
pub const QUOTES_FILE: &str = "quotes.csv";
pub const QUOTE_ITEMS_FILE: &str = "quote_items.csv";
pub const DATABASE_NAME: &str = "AnalyticsQuotes";

pub const QUOTES_TABLE: &str = "quotes";
pub const QUOTE_ITEMS_TABLE: &str = "quote_items";
pub const COMPANY_DATA_TABLE: &str = "company_data";

/// Optional `etl` section of the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EtlSettings {
    /// Parent directory of the per-run folders
    pub results_dir: PathBuf,
    /// Stream to extract
    pub stream: String,
    /// Event types that produce no rows
    pub ignored_events: Vec<String>,
    pub missing_agency_product: MissingAgencyProduct,
}

impl Default for EtlSettings {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("./results"),
            stream: "quotes-data-engineering".to_string(),
            ignored_events: DEFAULT_IGNORED_EVENTS.iter().map(|e| e.to_string()).collect(),
            missing_agency_product: MissingAgencyProduct::default(),
        }
    }
}

/// Every section the pipeline reads from the configuration file
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub event_store: EventStoreConfig,
    pub companies_house: CompaniesHouseConfig,
    pub etl: EtlSettings,
}

impl PipelineConfig {
    pub fn from_file(config: &ConfigFile) -> quotes_common::Result<Self> {
        Ok(Self {
            event_store: config.section("event_store")?,
            companies_house: config.section("companies_house")?,
            etl: config.section_or_default("etl")?,
        })
    }
}

/// What a completed run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_dir: PathBuf,
    pub database: PathBuf,
    pub extract: ExtractStats,
    pub projection: ProjectionStats,
    pub quotes: LoadStats,
    pub quote_items: LoadStats,
    /// `None` when the reference file was not available
    pub company_data: Option<LoadStats>,
}

/// Runs the whole ETL against an event source
pub struct Pipeline {
    settings: EtlSettings,
    projector: Projector,
    companies_house: CompaniesHouseFetcher,
    dispatch: Dispatch,
}

impl Pipeline {
    pub fn new(settings: EtlSettings, companies_house: &CompaniesHouseConfig) -> Result<Self> {
        let projector = Projector::new(settings.ignored_events.iter().cloned())
            .with_missing_agency_product(settings.missing_agency_product);
        let companies_house = CompaniesHouseFetcher::new(companies_house)
            .context("Failed to build Companies House client")?;

        Ok(Self {
            settings,
            projector,
            companies_house,
            dispatch: Dispatch::none(),
        })
    }

    /// Run all stages under the given dispatcher
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn settings(&self) -> &EtlSettings {
        &self.settings
    }

    pub async fn run(&self, source: &dyn EventSource) -> Result<RunSummary> {
        self.run_at(source, Local::now().naive_local()).await
    }

    /// Run as if started at `started`, which names the run directory
    pub async fn run_at(&self, source: &dyn EventSource, started: NaiveDateTime) -> Result<RunSummary> {
        self.run_stages(source, started)
            .with_subscriber(self.dispatch.clone())
            .await
    }

    async fn run_stages(&self, source: &dyn EventSource, started: NaiveDateTime) -> Result<RunSummary> {
        info!("Executing Quote Events extraction ETL");

        let run_dir = run_dir(&self.settings.results_dir, started);
        info!("Results will be saved in {}", run_dir.display());
        std::fs::create_dir_all(&run_dir)
            .with_context(|| format!("Failed to create run directory {}", run_dir.display()))?;

        let events_file = run_dir.join(EVENTS_FILE);
        let extract = extract_events_from_stream(source, &self.settings.stream, &events_file)
            .await
            .with_context(|| format!("Failed to extract stream {}", self.settings.stream))?;

        let quotes_file = run_dir.join(QUOTES_FILE);
        let quote_items_file = run_dir.join(QUOTE_ITEMS_FILE);
        let projection = self
            .blocking({
                let projector = self.projector.clone();
                let (events_file, quotes_file, quote_items_file) =
                    (events_file.clone(), quotes_file.clone(), quote_items_file.clone());
                move || {
                    projector
                        .project_file(&events_file, &quotes_file, &quote_items_file)
                        .with_context(|| format!("Failed to project events from {}", events_file.display()))
                }
            })
            .await?;

        let (mut sink, quotes, quote_items) = self
            .blocking({
                let run_dir = run_dir.clone();
                move || {
                    let mut sink =
                        SqliteSink::create(DATABASE_NAME, &run_dir).context("Failed to create database")?;

                    // quotes and quote_items commit separately
                    let quotes = sink
                        .load_csv(&quotes_file, Header::Supplied(&QUOTE_HEADERS), QUOTES_TABLE)
                        .with_context(|| format!("Failed to load table {QUOTES_TABLE}"))?;
                    let quote_items = sink
                        .load_csv(&quote_items_file, Header::Supplied(&PRODUCT_HEADERS), QUOTE_ITEMS_TABLE)
                        .with_context(|| format!("Failed to load table {QUOTE_ITEMS_TABLE}"))?;
                    Ok((sink, quotes, quote_items))
                }
            })
            .await?;
        let database = sink.path().to_path_buf();

        let company_data = match self
            .companies_house
            .fetch(started.date(), &run_dir)
            .await
            .context("Failed to fetch Companies House data")?
        {
            Some(csv_file) => Some(
                self.blocking(move || {
                    sink.load_csv(&csv_file, Header::FromFile, COMPANY_DATA_TABLE)
                        .with_context(|| format!("Failed to load table {COMPANY_DATA_TABLE}"))
                })
                .await?,
            ),
            None => None,
        };

        info!(
            quotes = quotes.rows,
            quote_items = quote_items.rows,
            company_data = company_data.as_ref().map_or(0, |s| s.rows),
            "ETL run complete"
        );

        Ok(RunSummary {
            database,
            run_dir,
            extract,
            projection,
            quotes,
            quote_items,
            company_data,
        })
    }

    /// Run file and SQLite work on the blocking pool under the run's dispatcher
    async fn blocking<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let dispatch = self.dispatch.clone();
        tokio::task::spawn_blocking(move || tracing::dispatcher::with_default(&dispatch, work))
            .await
            .context("Blocking stage panicked")?
    }
}

/// `{results_dir}/quotes_{YYYY_MM_DD_HH_MM}`
pub fn run_dir(results_dir: &Path, started: NaiveDateTime) -> PathBuf {
    results_dir.join(format!("quotes_{}", started.format("%Y_%m_%d_%H_%M")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const CONFIG: &str = r#"
event_store:
  tcp_host: localhost
  tcp_port: 2113
  username: admin
  password: changeit
companies_house:
  url: http://download.companieshouse.gov.uk/
"#;

    #[test]
    fn test_run_dir_name() {
        let started = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 59)
            .unwrap();
        assert_eq!(
            run_dir(Path::new("results"), started),
            PathBuf::from("results/quotes_2024_03_07_09_05")
        );
    }

    #[test]
    fn test_config_with_default_etl_section() {
        let file = ConfigFile::parse(CONFIG, "config.yaml").unwrap();
        let config = PipelineConfig::from_file(&file).unwrap();

        assert_eq!(config.event_store.host, "localhost");
        assert_eq!(config.event_store.port, 2113);
        assert_eq!(config.etl, EtlSettings::default());
        assert_eq!(config.etl.stream, "quotes-data-engineering");
        assert_eq!(config.etl.ignored_events.len(), 4);
    }

    #[test]
    fn test_config_with_etl_overrides() {
        let text = format!(
            "{CONFIG}etl:\n  results_dir: /tmp/etl\n  ignored_events: [fee_applied]\n  missing_agency_product: skip\n"
        );
        let file = ConfigFile::parse(&text, "config.yaml").unwrap();
        let config = PipelineConfig::from_file(&file).unwrap();

        assert_eq!(config.etl.results_dir, PathBuf::from("/tmp/etl"));
        assert_eq!(config.etl.ignored_events, vec!["fee_applied".to_string()]);
        assert_eq!(config.etl.missing_agency_product, MissingAgencyProduct::Skip);
        assert_eq!(config.etl.stream, "quotes-data-engineering");
    }

    #[test]
    fn test_missing_companies_house_section() {
        let file = ConfigFile::parse(
            "event_store:\n  host: localhost\n  port: 2113\n  username: a\n  password: b\n",
            "config.yaml",
        )
        .unwrap();
        let err = PipelineConfig::from_file(&file).unwrap_err();
        assert!(err.to_string().contains("\"companies_house\""));
    }
}
