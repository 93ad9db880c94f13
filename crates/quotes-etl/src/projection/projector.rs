// Event Projector

use super::envelope::EventEnvelope;
use super::records::{ProductRecord, QuoteRecord};
use super::{ProjectionError, Result, DEFAULT_IGNORED_EVENTS};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// What to do with a product that has no `agencyProduct` object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingAgencyProduct {
    /// Fail the projection with `ProjectionError::MissingField`
    #[default]
    Abort,
    /// Drop the product row and count it
    Skip,
    /// Emit the product row with empty agency product columns
    Empty,
}

/// Result of projecting a single line
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Not a JSON object; contributes no rows
    Malformed,
    /// Event type is in the ignore list
    Ignored,
    Projected {
        quote: QuoteRecord,
        products: Vec<ProductRecord>,
        /// Products dropped under `MissingAgencyProduct::Skip`
        skipped_products: usize,
    },
}

/// Counters for one projection run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionStats {
    /// Input lines read
    pub lines: usize,
    pub quotes: usize,
    pub products: usize,
    /// Lines skipped because of their event type
    pub ignored: usize,
    /// Lines that were not valid JSON objects
    pub decode_errors: usize,
    pub products_skipped: usize,
}

/// In-memory projection output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectedRows {
    pub quotes: Vec<QuoteRecord>,
    pub products: Vec<ProductRecord>,
    pub stats: ProjectionStats,
}

/// Projects event lines into quote and product rows
#[derive(Debug, Clone)]
pub struct Projector {
    ignored: HashSet<String>,
    missing_agency_product: MissingAgencyProduct,
}

impl Default for Projector {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_EVENTS)
    }
}

impl Projector {
    pub fn new<I, S>(ignored_events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignored: ignored_events.into_iter().map(Into::into).collect(),
            missing_agency_product: MissingAgencyProduct::default(),
        }
    }

    pub fn with_missing_agency_product(mut self, policy: MissingAgencyProduct) -> Self {
        self.missing_agency_product = policy;
        self
    }

    pub fn is_ignored(&self, event_type: Option<&str>) -> bool {
        event_type.is_some_and(|t| self.ignored.contains(t))
    }

    /// Project one raw line
    pub fn project_line(&self, line: &[u8]) -> Result<LineOutcome> {
        match EventEnvelope::parse(line) {
            Ok(envelope) => self.project_envelope(&envelope),
            Err(_) => Ok(LineOutcome::Malformed),
        }
    }

    pub fn project_envelope(&self, envelope: &EventEnvelope) -> Result<LineOutcome> {
        if self.is_ignored(envelope.event_type()) {
            return Ok(LineOutcome::Ignored);
        }

        let quote = QuoteRecord::from_envelope(envelope);
        let mut products = Vec::new();
        let mut skipped_products = 0;

        if let Some(quote_id) = envelope.quote_id() {
            for product in envelope.products() {
                match ProductRecord::from_product(&quote_id, product) {
                    Ok(record) => products.push(record),
                    Err(e @ ProjectionError::MissingField { .. }) => match self.missing_agency_product {
                        MissingAgencyProduct::Abort => return Err(e),
                        MissingAgencyProduct::Skip => {
                            debug!(quote_id = %quote_id, "Skipping product without agency product");
                            skipped_products += 1;
                        },
                        MissingAgencyProduct::Empty => {
                            products.push(ProductRecord::without_agency(&quote_id, product));
                        },
                    },
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(LineOutcome::Projected {
            quote,
            products,
            skipped_products,
        })
    }

    /// Drive every line of `input` through the projector, handing rows to `emit`
    fn run<R, F>(&self, input: R, mut emit: F) -> Result<ProjectionStats>
    where
        R: BufRead,
        F: FnMut(QuoteRecord, Vec<ProductRecord>) -> Result<()>,
    {
        let mut stats = ProjectionStats::default();

        for (index, line) in input.split(b'\n').enumerate() {
            let mut line = line?;
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            stats.lines += 1;

            match self.project_line(&line)? {
                LineOutcome::Malformed => {
                    debug!(line = index + 1, "Skipping line that is not a JSON object");
                    stats.decode_errors += 1;
                },
                LineOutcome::Ignored => stats.ignored += 1,
                LineOutcome::Projected {
                    quote,
                    products,
                    skipped_products,
                } => {
                    stats.quotes += 1;
                    stats.products += products.len();
                    stats.products_skipped += skipped_products;
                    emit(quote, products)?;
                },
            }
        }

        Ok(stats)
    }

    /// Project into memory
    pub fn project_rows<R: BufRead>(&self, input: R) -> Result<ProjectedRows> {
        let mut quotes = Vec::new();
        let mut all_products = Vec::new();

        let stats = self.run(input, |quote, products| {
            quotes.push(quote);
            all_products.extend(products);
            Ok(())
        })?;

        Ok(ProjectedRows {
            quotes,
            products: all_products,
            stats,
        })
    }

    /// Project into two headerless, minimally quoted CSV outputs
    pub fn project_to_csv<R, Q, P>(&self, input: R, quotes: Q, products: P) -> Result<ProjectionStats>
    where
        R: BufRead,
        Q: Write,
        P: Write,
    {
        let mut quotes_out = csv_writer(quotes);
        let mut products_out = csv_writer(products);

        let stats = self.run(input, |quote, products| {
            write_row(&mut quotes_out, quote.to_row())?;
            for product in &products {
                write_row(&mut products_out, product.to_row())?;
            }
            Ok(())
        })?;

        quotes_out.flush()?;
        products_out.flush()?;
        Ok(stats)
    }

    /// Project an events file into the quotes and quote items CSV files
    #[instrument(skip_all, fields(events = %events_file.display()))]
    pub fn project_file(
        &self,
        events_file: &Path,
        quotes_file: &Path,
        products_file: &Path,
    ) -> Result<ProjectionStats> {
        let input = BufReader::new(File::open(events_file)?);
        let quotes = BufWriter::new(File::create(quotes_file)?);
        let products = BufWriter::new(File::create(products_file)?);

        let stats = self.project_to_csv(input, quotes, products)?;

        info!(
            "File processed with {} JSON decoding errors out of {} records",
            stats.decode_errors, stats.lines
        );
        if stats.products_skipped > 0 {
            warn!(
                "Skipped {} products without an agency product",
                stats.products_skipped
            );
        }
        debug!(?stats, "Projection finished");

        Ok(stats)
    }
}

fn csv_writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(out)
}

fn write_row<W: Write>(writer: &mut csv::Writer<W>, row: Vec<Option<&str>>) -> Result<()> {
    writer.write_record(row.into_iter().map(|cell| cell.unwrap_or("")))?;
    Ok(())
}
