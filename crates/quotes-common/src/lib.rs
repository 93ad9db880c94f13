//! Quotes Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared configuration, logging, and error handling for the quote events ETL.
//!
//! # Overview
//!
//! - **Error Handling**: [`QuotesError`] and the crate [`Result`] alias
//! - **Configuration**: YAML configuration file with typed top-level sections
//! - **Logging**: subscriber construction that hands back an injectable
//!   [`tracing::Dispatch`] instead of installing a process-wide default
//!
//! # Example
//!
//! ```no_run
//! use quotes_common::config::ConfigFile;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct CompaniesHouse {
//!     url: String,
//! }
//!
//! fn load() -> quotes_common::Result<String> {
//!     let config = ConfigFile::load("config.yaml")?;
//!     let section: CompaniesHouse = config.section("companies_house")?;
//!     Ok(section.url)
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{QuotesError, Result};
