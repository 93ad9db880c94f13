//! Quotes ETL Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Batch pipeline that turns the quote events stream into an analytics
//! database.
//!
//! # Stages
//!
//! - **Extraction** ([`event_store`]): stream to JSON lines with injected metadata
//! - **Projection** ([`projection`]): JSON lines to quote and quote item rows
//! - **Loading** ([`sink`]): CSV files to SQLite tables, full replace
//! - **Reference data** ([`companies_house`]): monthly company snapshot
//! - **Orchestration** ([`pipeline`]): one timestamped run directory per run
//!
//! # Example
//!
//! ```no_run
//! use quotes_common::config::ConfigFile;
//! use quotes_etl::event_store::HttpEventStore;
//! use quotes_etl::pipeline::{Pipeline, PipelineConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::from_file(&ConfigFile::load("config.yaml")?)?;
//!     let source = HttpEventStore::new(&config.event_store)?;
//!     let pipeline = Pipeline::new(config.etl, &config.companies_house)?;
//!
//!     let summary = pipeline.run(&source).await?;
//!     println!("{} quotes loaded", summary.quotes.rows);
//!     Ok(())
//! }
//! ```

pub mod companies_house;
pub mod event_store;
pub mod pipeline;
pub mod projection;
pub mod sink;
