// Companies House Reference Data
//
// Downloads the monthly "Basic Company Data" snapshot published on the first
// day of each month, unpacks it next to the other run artifacts and hands the
// CSV path back for a raw load.

pub mod archive;

use chrono::{Datelike, NaiveDate};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument, warn, Dispatch, Span};
use url::Url;

/// Result type for Companies House operations
pub type Result<T> = std::result::Result<T, FetchError>;

/// Error types for the reference data fetcher
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Progress bar template error: {0}")]
    Template(#[from] indicatif::style::TemplateError),

    #[error("Extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// `companies_house` section of the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CompaniesHouseConfig {
    /// Base URL the monthly file name is joined onto
    pub url: Url,
}

/// Monthly snapshot file name for the month containing `date`
pub fn file_name_for(date: NaiveDate) -> String {
    format!(
        "BasicCompanyDataAsOneFile-{:04}-{:02}-01.zip",
        date.year(),
        date.month()
    )
}

/// Downloads and unpacks the monthly snapshot
pub struct CompaniesHouseFetcher {
    client: Client,
    base_url: Url,
}

impl CompaniesHouseFetcher {
    pub fn new(config: &CompaniesHouseConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("quotes-etl/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.clone(),
        })
    }

    /// Relative resolution: a base without a trailing slash loses its last segment
    pub fn url_for(&self, file_name: &str) -> Result<Url> {
        Ok(self.base_url.join(file_name)?)
    }

    /// Fetch the snapshot for the month of `date` into `output_dir`
    ///
    /// Returns the unpacked CSV, or `None` when the file is not published or
    /// the archive does not contain the expected CSV.
    #[instrument(skip(self, output_dir))]
    pub async fn fetch(&self, date: NaiveDate, output_dir: &Path) -> Result<Option<PathBuf>> {
        let file_name = file_name_for(date);
        let url = self.url_for(&file_name)?;
        let zip_path = output_dir.join(&file_name);

        if !self.download(&url, &zip_path).await? {
            error!("Companies House file is not available in {}", url);
            return Ok(None);
        }
        info!("Companies House monthly file extracted from {}", url);

        let extracted = unzip_blocking(zip_path.clone(), output_dir.to_path_buf()).await?;
        info!(
            "Companies House monthly file unzipped in folder {} ({} files)",
            output_dir.display(),
            extracted.len()
        );

        let csv_path = zip_path.with_extension("csv");
        if !csv_path.exists() {
            warn!("Expected {} in the archive, skipping load", csv_path.display());
            return Ok(None);
        }

        Ok(Some(csv_path))
    }

    /// Stream `url` to `output_path`; `false` on a non-success status
    async fn download(&self, url: &Url, output_path: &Path) -> Result<bool> {
        let response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Download refused");
            return Ok(false);
        }

        let total_size = response.content_length().unwrap_or(0);
        let name = output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let pb = ProgressBar::new(total_size);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
                .progress_chars("#>-"),
        );
        pb.set_message(format!("Downloading {name}"));

        let mut file = tokio::fs::File::create(output_path).await?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.flush().await?;

        pb.finish_with_message(format!("Downloaded {name}"));
        Ok(true)
    }
}

/// Unpack on the blocking pool, keeping the caller's dispatcher and span
async fn unzip_blocking(zip_path: PathBuf, output_dir: PathBuf) -> Result<Vec<PathBuf>> {
    let dispatch = tracing::dispatcher::get_default(Dispatch::clone);
    let span = Span::current();

    tokio::task::spawn_blocking(move || {
        tracing::dispatcher::with_default(&dispatch, || {
            span.in_scope(|| archive::extract_zip(&zip_path, &output_dir))
        })
    })
    .await?
}
