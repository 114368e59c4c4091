// src/process/clean.rs
use crate::process::utils::{coerce_numeric, first_four_digits, strip_to_numeric};
use crate::process::RawTable;
use crate::stats;
use serde::Serialize;
use tracing::debug;

/// Gross figures in the source are read as millions, whatever unit word follows them.
pub const GROSS_MULTIPLIER: f64 = 1_000_000.0;

/// Column the label falls back to when there is no `Film` column.
const LABEL_COLUMN: usize = 1;

/// One typed film row. `rank` and `year` are always present after cleaning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub rank: f64,
    pub film: String,
    pub year: f64,
    /// Raw text of the gross-like column, if the table had one.
    pub gross_raw: Option<String>,
    /// Derived gross in absolute currency units; `Some(0.0)` when the table had no gross column.
    pub gross: Option<f64>,
    pub peak: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of films with `gross >= min_gross` released strictly before `before_year`.
    pub fn count_grossing_before(&self, min_gross: f64, before_year: f64) -> usize {
        self.records
            .iter()
            .filter(|r| r.gross.is_some_and(|g| g >= min_gross) && r.year < before_year)
            .count()
    }

    /// The earliest film with `gross >= min_gross`; the first one wins on equal years.
    pub fn earliest_grossing(&self, min_gross: f64) -> Option<&Record> {
        self.records
            .iter()
            .filter(|r| r.gross.is_some_and(|g| g >= min_gross))
            .min_by(|a, b| a.year.total_cmp(&b.year))
    }

    pub fn ranks(&self) -> Vec<Option<f64>> {
        self.records.iter().map(|r| Some(r.rank)).collect()
    }

    pub fn peaks(&self) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.peak).collect()
    }

    /// Pearson correlation of rank against peak, rounded to 6 places; `0.0` when undefined.
    pub fn rank_peak_correlation(&self) -> f64 {
        stats::pearson(&self.ranks(), &self.peaks())
            .map(|r| stats::round_to(r, 6))
            .unwrap_or(0.0)
    }
}

/// Infer the film columns from an untyped table. Never fails: unparseable cells become
/// `None`, missing columns get their documented defaults, and rows without a year or
/// rank are dropped.
#[tracing::instrument(level = "debug", skip(table), fields(rows = table.rows.len()))]
pub fn clean_dataset(table: &RawTable) -> Dataset {
    let n = table.rows.len();

    let rank_col = table.column_index("Rank");
    let year_col = table.column_index("Year");
    let peak_col = table.column_index("Peak");
    let film_col = table.column_index("Film");
    let gross_col = table.headers.iter().position(|h| {
        let lower = h.to_lowercase();
        lower.contains("worldwide") || lower.contains("gross")
    });
    debug!(?rank_col, ?year_col, ?peak_col, ?film_col, ?gross_col, "column lookup");

    let mut records = Vec::with_capacity(n);
    let mut dropped = 0usize;

    for row in 0..n {
        let rank = match rank_col {
            Some(c) => coerce_numeric(table.cell(row, c)),
            None => Some((row + 1) as f64),
        };

        let year = match year_col {
            Some(c) => coerce_numeric(table.cell(row, c)),
            None => first_four_digits(table.cell(row, LABEL_COLUMN)).and_then(coerce_numeric),
        };

        let gross_raw = gross_col.map(|c| table.cell(row, c).to_string());
        let gross = match &gross_raw {
            Some(raw) => coerce_numeric(&strip_to_numeric(raw)).map(|v| v * GROSS_MULTIPLIER),
            None => Some(0.0),
        };

        let peak = match peak_col {
            Some(c) => coerce_numeric(table.cell(row, c)),
            None => rank,
        };

        let film = table
            .cell(row, film_col.unwrap_or(LABEL_COLUMN))
            .to_string();

        match (rank, year) {
            (Some(rank), Some(year)) => records.push(Record {
                rank,
                film,
                year,
                gross_raw,
                gross,
                peak,
            }),
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(dropped, kept = records.len(), "dropped rows without year or rank");
    }

    Dataset { records }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn fallback_cleans_with_million_multiplier() {
        let ds = clean_dataset(&RawTable::fallback());
        assert_eq!(ds.len(), 3);
        let avatar = &ds.records[0];
        assert_eq!(avatar.film, "Avatar (2009)");
        assert_eq!(avatar.year, 2009.0);
        assert_eq!(avatar.peak, Some(1.0));
        // "$2.9 billion" is still read as millions
        let gross = avatar.gross.unwrap();
        assert!((gross - 2_900_000.0).abs() < 1e-6);
    }

    #[test]
    fn missing_columns_get_defaults() {
        let ds = clean_dataset(&table(
            &["Peak", "Title"],
            &[&["3", "Avatar (2009)"], &["1", "Titanic 1997"], &["2", "Untitled"]],
        ));

        // third row has no year anywhere and is dropped
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].rank, 1.0);
        assert_eq!(ds.records[1].rank, 2.0);
        assert_eq!(ds.records[0].year, 2009.0);
        assert_eq!(ds.records[1].year, 1997.0);
        assert_eq!(ds.records[0].film, "Avatar (2009)");
        assert_eq!(ds.records[0].peak, Some(3.0));
        assert_eq!(ds.records[0].gross, Some(0.0));
        assert_eq!(ds.records[0].gross_raw, None);
    }

    #[test]
    fn unparseable_values_become_null_or_drop_row() {
        let ds = clean_dataset(&table(
            &["Rank", "Film", "Year", "Worldwide gross", "Peak"],
            &[
                &["1", "Avatar", "2009", "$2,923,706,026", "1"],
                &["2[a]", "Endgame", "2019", "$2,797,501,328", "1"],
                &["3", "Titanic", "unknown", "$2,264,750,694", "1"],
                &["4", "Force Awakens", "2015", "TBD", "3F"],
            ],
        ));

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].gross, Some(2_923_706_026.0 * GROSS_MULTIPLIER));
        assert_eq!(ds.records[1].film, "Force Awakens");
        assert_eq!(ds.records[1].gross, None);
        assert_eq!(ds.records[1].peak, None);
        assert_eq!(ds.records[1].gross_raw.as_deref(), Some("TBD"));
    }

    #[test]
    fn gross_column_match_is_case_insensitive() {
        let ds = clean_dataset(&table(
            &["Rank", "Film", "Year", "GROSS (USD m)"],
            &[&["1", "Avatar", "2009", "2923.7"]],
        ));
        let gross = ds.records[0].gross.unwrap();
        assert!((gross - 2_923_700_000.0).abs() < 1e-3);
    }

    #[test]
    fn answers_over_thresholds() {
        let ds = Dataset {
            records: vec![
                Record {
                    rank: 1.0,
                    film: "Qualifies".into(),
                    year: 2009.0,
                    gross_raw: None,
                    gross: Some(2_500_000_000.0),
                    peak: Some(1.0),
                },
                Record {
                    rank: 2.0,
                    film: "Too recent".into(),
                    year: 2021.0,
                    gross_raw: None,
                    gross: Some(2_100_000_000.0),
                    peak: Some(2.0),
                },
            ],
        };

        assert_eq!(ds.count_grossing_before(2_000_000_000.0, 2020.0), 1);
        assert_eq!(
            ds.earliest_grossing(1_500_000_000.0).map(|r| r.film.as_str()),
            Some("Qualifies")
        );
        assert!(ds.earliest_grossing(5_000_000_000.0).is_none());
    }

    #[test]
    fn earliest_prefers_first_on_ties() {
        let ds = clean_dataset(&table(
            &["Rank", "Film", "Year", "Worldwide gross"],
            &[
                &["1", "First", "1997", "1600"],
                &["2", "Second", "1997", "1700"],
                &["3", "Later", "2001", "1800"],
            ],
        ));
        assert_eq!(ds.earliest_grossing(1.5e9).unwrap().film, "First");
    }

    #[test]
    fn correlation_of_identical_series_is_one() {
        let ds = clean_dataset(&table(
            &["Rank", "Film", "Year", "Peak"],
            &[
                &["1", "a", "2001", "1"],
                &["2", "b", "2002", "2"],
                &["3", "c", "2003", "3"],
            ],
        ));
        assert_eq!(ds.rank_peak_correlation(), 1.0);
    }

    #[test]
    fn correlation_degrades_to_zero() {
        let single = clean_dataset(&table(&["Rank", "Film", "Year"], &[&["1", "a", "2001"]]));
        assert_eq!(single.rank_peak_correlation(), 0.0);

        let flat = clean_dataset(&table(
            &["Rank", "Film", "Year", "Peak"],
            &[&["1", "a", "2001", "4"], &["2", "b", "2002", "4"]],
        ));
        assert_eq!(flat.rank_peak_correlation(), 0.0);
    }
}
