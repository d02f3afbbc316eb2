//! Attendance ledger: the authoritative per-identity, per-date record.
//!
//! One CSV sheet with fixed columns `Student ID, Year, Registration Date`
//! followed by one column per calendar date, appended in first-seen order.
//! A cell holds the time-of-day of the first successful mark that day.
//!
//! Marking policy is **first write wins**: repeat marks for the same
//! (identity, date) are idempotent no-ops that still succeed, so duplicate
//! recognitions within one session are harmless.

use crate::atomic::write_atomic;
use chrono::{NaiveDate, NaiveTime};
use rollcall_core::Identity;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

const FIXED_HEADERS: [&str; 3] = ["Student ID", "Year", "Registration Date"];
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const YEAR_NOT_SPECIFIED: &str = "Not Specified";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger file malformed: {0}")]
    Malformed(String),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Institutional year derivation: `base` minus the digit found at
/// `digit_index` of the identity key. Identities without a digit there get
/// "Not Specified".
#[derive(Debug, Clone, Copy)]
pub struct YearRule {
    pub base: i32,
    pub digit_index: usize,
}

impl Default for YearRule {
    fn default() -> Self {
        Self {
            base: 5,
            digit_index: 2,
        }
    }
}

impl YearRule {
    pub fn derive(&self, identity: &Identity) -> String {
        identity
            .as_str()
            .chars()
            .nth(self.digit_index)
            .and_then(|c| c.to_digit(10))
            .map(|d| (self.base - d as i32).to_string())
            .unwrap_or_else(|| YEAR_NOT_SPECIFIED.to_string())
    }
}

/// Result of a mark: whether this call recorded the cell or an earlier one
/// already had.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Recorded,
    AlreadyMarked,
}

#[derive(Debug, Clone)]
pub struct LedgerRow {
    pub identity: Identity,
    pub year: String,
    pub registered_on: NaiveDate,
    marks: HashMap<NaiveDate, String>,
}

impl LedgerRow {
    pub fn time_for(&self, date: NaiveDate) -> Option<&str> {
        self.marks.get(&date).map(String::as_str)
    }
}

pub struct Ledger {
    path: PathBuf,
    year_rule: YearRule,
    columns: Vec<NaiveDate>,
    rows: Vec<LedgerRow>,
}

impl Ledger {
    /// Open the ledger, loading the existing sheet if present.
    pub fn open(path: impl Into<PathBuf>, year_rule: YearRule) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (columns, rows) = if path.exists() {
            load_sheet(&path)?
        } else {
            (Vec::new(), Vec::new())
        };

        tracing::debug!(
            path = %path.display(),
            rows = rows.len(),
            dates = columns.len(),
            "ledger opened"
        );

        Ok(Self {
            path,
            year_rule,
            columns,
            rows,
        })
    }

    /// Record an attendance event in memory. Creates the date column and the
    /// identity row as needed; first write per (identity, date) wins.
    ///
    /// Durability is a separate step — call [`flush`](Self::flush) after a
    /// successful mark.
    pub fn mark_present(
        &mut self,
        identity: &Identity,
        date: NaiveDate,
        time: NaiveTime,
    ) -> MarkOutcome {
        if !self.columns.contains(&date) {
            self.columns.push(date);
        }

        let idx = match self.rows.iter().position(|r| &r.identity == identity) {
            Some(idx) => idx,
            None => {
                self.rows.push(LedgerRow {
                    identity: identity.clone(),
                    year: self.year_rule.derive(identity),
                    registered_on: date,
                    marks: HashMap::new(),
                });
                self.rows.len() - 1
            }
        };
        let row = &mut self.rows[idx];

        if row.marks.contains_key(&date) {
            tracing::debug!(identity = %identity, %date, "already marked today; keeping first time");
            return MarkOutcome::AlreadyMarked;
        }

        row.marks.insert(date, time.format(TIME_FORMAT).to_string());
        tracing::info!(identity = %identity, %date, time = %time.format(TIME_FORMAT), "attendance marked");
        MarkOutcome::Recorded
    }

    /// Persist the full sheet. On failure the previously persisted file is
    /// left untouched and the in-memory state is retained, so the next mark
    /// can try again.
    pub fn flush(&self) -> Result<(), LedgerError> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header: Vec<String> = FIXED_HEADERS.iter().map(|s| s.to_string()).collect();
        header.extend(self.columns.iter().map(|d| d.format(DATE_FORMAT).to_string()));
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![
                row.identity.as_str().to_string(),
                row.year.clone(),
                row.registered_on.format(DATE_FORMAT).to_string(),
            ];
            record.extend(
                self.columns
                    .iter()
                    .map(|d| row.time_for(*d).unwrap_or("").to_string()),
            );
            writer.write_record(&record)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| LedgerError::Malformed(e.to_string()))?;
        write_atomic(&self.path, &bytes)?;
        Ok(())
    }

    /// Date columns in first-seen order.
    pub fn columns(&self) -> &[NaiveDate] {
        &self.columns
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn row(&self, identity: &Identity) -> Option<&LedgerRow> {
        self.rows.iter().find(|r| &r.identity == identity)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_sheet(path: &Path) -> Result<(Vec<NaiveDate>, Vec<LedgerRow>), LedgerError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(File::open(path)?);

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record?,
        None => return Ok((Vec::new(), Vec::new())),
    };

    if header.len() < FIXED_HEADERS.len()
        || FIXED_HEADERS
            .iter()
            .zip(header.iter())
            .any(|(expected, got)| *expected != got)
    {
        return Err(LedgerError::Malformed(format!(
            "unexpected header row: {header:?}"
        )));
    }

    let mut columns = Vec::new();
    for field in header.iter().skip(FIXED_HEADERS.len()) {
        let date = NaiveDate::parse_from_str(field, DATE_FORMAT)
            .map_err(|e| LedgerError::Malformed(format!("bad date column {field:?}: {e}")))?;
        if columns.contains(&date) {
            return Err(LedgerError::Malformed(format!("duplicate date column {field:?}")));
        }
        columns.push(date);
    }

    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        let identity = Identity::parse(record.get(0).unwrap_or(""))
            .map_err(|e| LedgerError::Malformed(format!("bad identity in row: {e}")))?;
        let year = record.get(1).unwrap_or("").to_string();
        let registered_on = NaiveDate::parse_from_str(record.get(2).unwrap_or(""), DATE_FORMAT)
            .map_err(|e| LedgerError::Malformed(format!("bad registration date: {e}")))?;

        let mut marks = HashMap::new();
        for (i, date) in columns.iter().enumerate() {
            if let Some(cell) = record.get(FIXED_HEADERS.len() + i) {
                if !cell.is_empty() {
                    marks.insert(*date, cell.to_string());
                }
            }
        }

        rows.push(LedgerRow {
            identity,
            year,
            registered_on,
            marks,
        });
    }

    Ok((columns, rows))
}
