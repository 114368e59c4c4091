// src/process/mod.rs
use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use tracing::{debug, warn};

pub mod clean;
pub mod utils;

pub use clean::{clean_dataset, Dataset, Record};

/// Header used when the first row of the markup yields no usable names.
pub const DEFAULT_HEADERS: [&str; 4] = ["Rank", "Film", "Year", "Worldwide gross"];

static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr").expect("CSS selector for table rows should be valid"));
static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("th, td").expect("CSS selector for table cells should be valid"));

/// A rectangular, untyped table: every row has exactly `headers.len()` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Column names, from the first markup row (or synthesized).
    pub headers: Vec<String>,
    /// Each data row, as a Vec of Strings (one per column).
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// The fixed three-film table used whenever no usable markup table is available.
    pub fn fallback() -> Self {
        let rows = [
            ["1", "Avatar (2009)", "2009", "$2.9 billion"],
            ["2", "Avengers: Endgame (2019)", "2019", "$2.8 billion"],
            ["3", "Titanic (1997)", "1997", "$2.2 billion"],
        ];
        Self {
            headers: DEFAULT_HEADERS.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Index of the first column named exactly `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at (`row`, `col`), empty when the column does not exist.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Turn a markup `<table>` into a rectangular [`RawTable`].
///
/// - `None` → [`RawTable::fallback`].
/// - Header names come from the first `tr`; empty names are dropped, and if none remain
///   [`DEFAULT_HEADERS`] is used.
/// - Every later `tr` with at least two cells becomes a row of whitespace-normalised texts.
/// - Widths are reconciled by [`reconcile`].
#[tracing::instrument(level = "debug", skip(table))]
pub fn extract_table(table: Option<ElementRef<'_>>) -> RawTable {
    let Some(table) = table else {
        warn!("no table found, using fallback films");
        return RawTable::fallback();
    };

    let mut tr_iter = table.select(&ROW_SELECTOR);

    let mut headers: Vec<String> = tr_iter
        .next()
        .map(|first| {
            first
                .select(&CELL_SELECTOR)
                .map(|cell| cell.text().collect::<String>().trim().to_string())
                .filter(|text| !text.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if headers.is_empty() {
        debug!("header row empty, using default headers");
        headers = DEFAULT_HEADERS.iter().map(|h| h.to_string()).collect();
    }

    let rows: Vec<Vec<String>> = tr_iter
        .map(|tr| {
            tr.select(&CELL_SELECTOR)
                .map(|cell| utils::normalize_whitespace(&cell.text().collect::<String>()))
                .collect::<Vec<_>>()
        })
        .filter(|cells| cells.len() >= 2)
        .collect();

    debug!(
        headers = headers.len(),
        rows = rows.len(),
        "extracted table markup"
    );
    reconcile(headers, rows)
}

/// Make `rows` rectangular against the widest row.
///
/// The header is extended with `Column_N` names (N is the 1-based position) or truncated,
/// and every row is padded with empty strings or truncated, so all lengths match.
/// No rows at all yields [`RawTable::fallback`].
pub fn reconcile(mut headers: Vec<String>, mut rows: Vec<Vec<String>>) -> RawTable {
    let Some(width) = rows.iter().map(Vec::len).max() else {
        warn!("table has no data rows, using fallback films");
        return RawTable::fallback();
    };

    while headers.len() < width {
        headers.push(format!("Column_{}", headers.len() + 1));
    }
    headers.truncate(width);

    for row in &mut rows {
        row.resize(width, String::new());
    }

    RawTable { headers, rows }
}
