// Tabular Sink (SQLite)
//
// Loads a CSV file into a named table, replacing whatever the table held.
// Column types are inferred from the values in a first pass over the file;
// the second pass inserts the rows inside a single transaction, so a failed
// load leaves the previous table contents in place.

use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Result type for sink operations
pub type Result<T> = std::result::Result<T, SinkError>;

/// Error types for the tabular sink
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No columns to load from {0}")]
    NoColumns(PathBuf),

    #[error("Row {line} has {actual} fields, expected at most {expected}")]
    RowWidth {
        line: u64,
        expected: usize,
        actual: usize,
    },
}

/// Where a load takes its column names from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header<'a> {
    /// Names given by the caller; every row in the file is data
    Supplied(&'a [&'a str]),
    /// Names taken from the first row of the file
    FromFile,
}

/// Outcome of a single table load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStats {
    pub table: String,
    pub columns: usize,
    pub rows: usize,
}

/// Destination for tabular data
pub trait TabularSink {
    /// Replace the contents of `table` with the rows of `csv_file`
    fn load_csv(&mut self, csv_file: &Path, header: Header<'_>, table: &str) -> Result<LoadStats>;
}

/// Storage class inferred for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    /// No non-empty value seen yet
    Unknown,
    Integer,
    Real,
    Text,
}

impl ColumnKind {
    fn of(value: &str) -> Self {
        if value.parse::<i64>().is_ok() {
            Self::Integer
        } else if value.parse::<f64>().is_ok_and(f64::is_finite) {
            Self::Real
        } else {
            Self::Text
        }
    }

    /// Narrowest kind that holds both
    fn widen(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unknown, kind) | (kind, Self::Unknown) => kind,
            (Self::Text, _) | (_, Self::Text) => Self::Text,
            (Self::Real, _) | (_, Self::Real) => Self::Real,
            (Self::Integer, Self::Integer) => Self::Integer,
        }
    }

    fn sql_type(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Unknown | Self::Text => "TEXT",
        }
    }

    fn to_sql(self, value: &str) -> SqlValue {
        if value.is_empty() {
            return SqlValue::Null;
        }
        match self {
            Self::Integer => value
                .parse()
                .map_or_else(|_| SqlValue::Text(value.to_string()), SqlValue::Integer),
            Self::Real => value
                .parse()
                .map_or_else(|_| SqlValue::Text(value.to_string()), SqlValue::Real),
            Self::Unknown | Self::Text => SqlValue::Text(value.to_string()),
        }
    }
}

/// Tabular sink backed by a SQLite database file
pub struct SqliteSink {
    conn: Connection,
    path: PathBuf,
}

impl SqliteSink {
    /// Create (or open) `{folder}/{db_name}.db`
    pub fn create(db_name: &str, folder: &Path) -> Result<Self> {
        let sink = Self::open(folder.join(format!("{db_name}.db")))?;
        info!("SQLite database {}.db created in {}", db_name, folder.display());
        Ok(sink)
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let conn = Connection::open(&path)?;
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn replace_table(
        &mut self,
        csv_file: &Path,
        skip_first: bool,
        table: &str,
        columns: &[String],
        kinds: &[ColumnKind],
    ) -> Result<usize> {
        let column_list = columns
            .iter()
            .zip(kinds)
            .map(|(name, kind)| format!("{} {}", quote_ident(name), kind.sql_type()))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");

        let tx = self.conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)), [])?;
        tx.execute(
            &format!("CREATE TABLE {} ({})", quote_ident(table), column_list),
            [],
        )?;

        let mut rows = 0;
        {
            let mut insert = tx.prepare(&format!(
                "INSERT INTO {} VALUES ({})",
                quote_ident(table),
                placeholders
            ))?;

            for record in csv_reader(csv_file)?.records().skip(usize::from(skip_first)) {
                let record = record?;
                let values = kinds.iter().enumerate().map(|(i, kind)| {
                    record.get(i).map_or(SqlValue::Null, |value| kind.to_sql(value))
                });
                insert.execute(rusqlite::params_from_iter(values))?;
                rows += 1;
            }
        }
        tx.commit()?;

        Ok(rows)
    }
}

impl TabularSink for SqliteSink {
    #[instrument(skip(self, header), fields(db = %self.path.display()))]
    fn load_csv(&mut self, csv_file: &Path, header: Header<'_>, table: &str) -> Result<LoadStats> {
        let mut records = csv_reader(csv_file)?.into_records();

        let (columns, skip_first) = match header {
            Header::Supplied(names) => (names.iter().map(|n| n.to_string()).collect(), false),
            Header::FromFile => match records.next().transpose()? {
                Some(first) => (column_names(first.iter()), true),
                None => (Vec::new(), true),
            },
        };
        if columns.is_empty() {
            return Err(SinkError::NoColumns(csv_file.to_path_buf()));
        }

        let mut kinds = vec![ColumnKind::Unknown; columns.len()];
        for (index, record) in records.enumerate() {
            let record = record?;
            if record.len() > columns.len() {
                return Err(SinkError::RowWidth {
                    line: record
                        .position()
                        .map_or(index as u64 + 1, |p| p.line()),
                    expected: columns.len(),
                    actual: record.len(),
                });
            }
            for (kind, value) in kinds.iter_mut().zip(record.iter()) {
                if !value.is_empty() {
                    *kind = kind.widen(ColumnKind::of(value));
                }
            }
        }
        debug!(?kinds, "Inferred column types");

        let rows = self.replace_table(csv_file, skip_first, table, &columns, &kinds)?;
        info!("File {} loaded into table {}", csv_file.display(), table);

        Ok(LoadStats {
            table: table.to_string(),
            columns: columns.len(),
            rows,
        })
    }
}

fn csv_reader(path: &Path) -> Result<csv::Reader<BufReader<File>>> {
    let file = BufReader::new(File::open(path)?);
    Ok(csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file))
}

/// Quote an SQL identifier
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column names from a header row; blanks and repeats get unique names
fn column_names<'a>(header: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for (index, name) in header.enumerate() {
        let base = match name.trim() {
            "" => format!("column_{}", index + 1),
            trimmed => trimmed.to_string(),
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while names.iter().any(|n| n.eq_ignore_ascii_case(&candidate)) {
            candidate = format!("{base}.{suffix}");
            suffix += 1;
        }
        names.push(candidate);
    }
    names
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn rows(sink: &SqliteSink, sql: &str) -> Vec<Vec<SqlValue>> {
        let mut stmt = sink.connection().prepare(sql).unwrap();
        let width = stmt.column_count();
        let rows = stmt
            .query_map([], |row| (0..width).map(|i| row.get::<_, SqlValue>(i)).collect())
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        rows
    }

    fn column_types(sink: &SqliteSink, table: &str) -> Vec<(String, String)> {
        let mut stmt = sink
            .connection()
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))
            .unwrap();
        let columns = stmt
            .query_map([], |row| Ok((row.get(1)?, row.get(2)?)))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        columns
    }

    #[test]
    fn test_create_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SqliteSink::create("AnalyticsQuotes", dir.path()).unwrap();
        assert_eq!(sink.path(), dir.path().join("AnalyticsQuotes.db"));
        assert!(sink.path().exists());
    }

    #[test]
    fn test_supplied_header_loads_every_row() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(&dir, "items.csv", "Q1,P1,12.5,3\nQ2,P2,7,\n");
        let mut sink = SqliteSink::create("test", dir.path()).unwrap();

        let stats = sink
            .load_csv(&csv, Header::Supplied(&["quote_id", "id", "total", "count"]), "quote_items")
            .unwrap();
        assert_eq!(
            stats,
            LoadStats {
                table: "quote_items".to_string(),
                columns: 4,
                rows: 2
            }
        );

        assert_eq!(
            column_types(&sink, "quote_items"),
            vec![
                ("quote_id".to_string(), "TEXT".to_string()),
                ("id".to_string(), "TEXT".to_string()),
                ("total".to_string(), "REAL".to_string()),
                ("count".to_string(), "INTEGER".to_string()),
            ]
        );
        assert_eq!(
            rows(&sink, "SELECT * FROM quote_items"),
            vec![
                vec![
                    SqlValue::Text("Q1".into()),
                    SqlValue::Text("P1".into()),
                    SqlValue::Real(12.5),
                    SqlValue::Integer(3),
                ],
                vec![
                    SqlValue::Text("Q2".into()),
                    SqlValue::Text("P2".into()),
                    SqlValue::Real(7.0),
                    SqlValue::Null,
                ],
            ]
        );
    }

    #[test]
    fn test_header_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let csv = write_csv(
            &dir,
            "companies.csv",
            "CompanyName, CompanyNumber,CompanyName\n\"ACME, LTD\",00012345,dup\n",
        );
        let mut sink = SqliteSink::create("test", dir.path()).unwrap();

        let stats = sink.load_csv(&csv, Header::FromFile, "company_data").unwrap();
        assert_eq!(stats.rows, 1);
        assert_eq!(
            column_types(&sink, "company_data")
                .into_iter()
                .map(|(name, _)| name)
                .collect::<Vec<_>>(),
            vec!["CompanyName", "CompanyNumber", "CompanyName.1"]
        );
        assert_eq!(
            rows(&sink, "SELECT \"CompanyName\" FROM company_data"),
            vec![vec![SqlValue::Text("ACME, LTD".into())]]
        );
    }

    #[test]
    fn test_reload_replaces_table_contents() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_csv(&dir, "first.csv", "Q1,a\nQ2,b\nQ3,c\n");
        let second = write_csv(&dir, "second.csv", "Q9,z\n");
        let mut sink = SqliteSink::create("test", dir.path()).unwrap();
        let header = Header::Supplied(&["quoteId", "value"]);

        sink.load_csv(&first, header, "quotes").unwrap();
        sink.load_csv(&second, header, "quotes").unwrap();

        assert_eq!(
            rows(&sink, "SELECT quoteId, value FROM quotes"),
            vec![vec![SqlValue::Text("Q9".into()), SqlValue::Text("z".into())]]
        );
    }

    #[test]
    fn test_short_rows_padded_and_long_rows_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let short = write_csv(&dir, "short.csv", "1,2\n3\n");
        let long = write_csv(&dir, "long.csv", "1,2\n3,4,5\n");
        let mut sink = SqliteSink::create("test", dir.path()).unwrap();
        let header = Header::Supplied(&["a", "b"]);

        sink.load_csv(&short, header, "numbers").unwrap();
        assert_eq!(
            rows(&sink, "SELECT a, b FROM numbers"),
            vec![
                vec![SqlValue::Integer(1), SqlValue::Integer(2)],
                vec![SqlValue::Integer(3), SqlValue::Null],
            ]
        );

        let err = sink.load_csv(&long, header, "numbers").unwrap_err();
        assert!(matches!(
            err,
            SinkError::RowWidth {
                line: 2,
                expected: 2,
                actual: 3
            }
        ));
        // failed load keeps the previous contents
        assert_eq!(rows(&sink, "SELECT a FROM numbers").len(), 2);
    }

    #[test]
    fn test_empty_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let empty = write_csv(&dir, "empty.csv", "");
        let mut sink = SqliteSink::create("test", dir.path()).unwrap();

        let stats = sink
            .load_csv(&empty, Header::Supplied(&["quote_id", "id"]), "quote_items")
            .unwrap();
        assert_eq!(stats.rows, 0);
        assert_eq!(column_types(&sink, "quote_items").len(), 2);

        assert!(matches!(
            sink.load_csv(&empty, Header::FromFile, "company_data"),
            Err(SinkError::NoColumns(_))
        ));
    }

    #[test]
    fn test_column_kind_inference() {
        assert_eq!(ColumnKind::of("42"), ColumnKind::Integer);
        assert_eq!(ColumnKind::of("-4.2e3"), ColumnKind::Real);
        assert_eq!(ColumnKind::of("NaN"), ColumnKind::Text);
        assert_eq!(ColumnKind::of("true"), ColumnKind::Text);
        assert_eq!(ColumnKind::Integer.widen(ColumnKind::Real), ColumnKind::Real);
        assert_eq!(ColumnKind::Real.widen(ColumnKind::Text), ColumnKind::Text);
        assert_eq!(ColumnKind::Unknown.widen(ColumnKind::Integer), ColumnKind::Integer);
        assert_eq!(ColumnKind::Unknown.sql_type(), "TEXT");
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("quotes"), "\"quotes\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
