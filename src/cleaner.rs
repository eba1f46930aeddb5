//! Row validation and derivation of cleaned incident records.
//!
//! Bad rows are dropped and counted, never fatal. The counts travel in an
//! explicit [`DropSummary`] that the caller owns.

use std::{collections::BTreeMap, fmt};

use log::debug;
use serde::Serialize;

use crate::{
    loader::RawRow,
    schema::{ColumnLayout, IncidentColumn},
};

pub const UNKNOWN_LABEL: &str = "Unknown";

const PLACEHOLDER_TOKENS: &[&str] = &["na", "n/a", "null", "nan", "none"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedIncident {
    pub year: i32,
    pub target_type: String,
    pub group_name: String,
    pub attack_type: String,
    pub country: String,
    pub killed: Option<u64>,
    pub wounded: Option<u64>,
}

impl CleanedIncident {
    /// Killed plus wounded with missing figures counted as zero. Saturates;
    /// aggregation goes through [`Self::checked_total_casualties`].
    pub fn total_casualties(&self) -> u64 {
        self.killed
            .unwrap_or(0)
            .saturating_add(self.wounded.unwrap_or(0))
    }

    pub fn checked_total_casualties(&self) -> Option<u64> {
        self.killed
            .unwrap_or(0)
            .checked_add(self.wounded.unwrap_or(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// More cells than the header has columns.
    MalformedRow,
    MissingRequiredField,
    InvalidYear,
    YearOutOfRange,
    InvalidCasualtyCount,
    NoCasualtyData,
}

impl DropReason {
    pub const ALL: [DropReason; 6] = [
        DropReason::MalformedRow,
        DropReason::MissingRequiredField,
        DropReason::InvalidYear,
        DropReason::YearOutOfRange,
        DropReason::InvalidCasualtyCount,
        DropReason::NoCasualtyData,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DropReason::MalformedRow => "malformed row",
            DropReason::MissingRequiredField => "missing required field",
            DropReason::InvalidYear => "invalid year",
            DropReason::YearOutOfRange => "year out of range",
            DropReason::InvalidCasualtyCount => "invalid casualty count",
            DropReason::NoCasualtyData => "no casualty data",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Running tally of what happened to every row read from the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DropSummary {
    pub rows_read: u64,
    pub rows_kept: u64,
    pub rows_sampled_out: u64,
    pub dropped: BTreeMap<DropReason, u64>,
}

impl DropSummary {
    pub fn record_drop(&mut self, reason: DropReason) {
        *self.dropped.entry(reason).or_insert(0) += 1;
    }

    pub fn count(&self, reason: DropReason) -> u64 {
        self.dropped.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_dropped(&self) -> u64 {
        self.dropped.values().sum()
    }

    pub fn render_rows(&self) -> Vec<Vec<String>> {
        let mut rows = vec![
            vec!["rows read".to_string(), self.rows_read.to_string()],
            vec!["rows kept".to_string(), self.rows_kept.to_string()],
            vec![
                "rows sampled out".to_string(),
                self.rows_sampled_out.to_string(),
            ],
        ];
        rows.extend(DropReason::ALL.iter().map(|reason| {
            vec![
                format!("dropped: {reason}"),
                self.count(*reason).to_string(),
            ]
        }));
        rows
    }
}

#[derive(Debug, Clone)]
pub struct Cleaner {
    layout: ColumnLayout,
    min_year: Option<i32>,
    max_year: Option<i32>,
}

impl Cleaner {
    pub fn new(layout: ColumnLayout, min_year: Option<i32>, max_year: Option<i32>) -> Self {
        Self {
            layout,
            min_year,
            max_year,
        }
    }

    /// Validates one row. Checks run in order: row width, required labels,
    /// year parse, year window, casualty parse, casualty presence. Short rows
    /// are treated as having empty trailing cells.
    pub fn clean(&self, row: &RawRow) -> Result<CleanedIncident, DropReason> {
        if row.fields.len() > self.layout.width() {
            return Err(DropReason::MalformedRow);
        }
        let target_type = self.label(row, IncidentColumn::TargetType)?;
        let attack_type = self.label(row, IncidentColumn::AttackType)?;
        let country = self.label(row, IncidentColumn::Country)?;
        let group_name = self.label(row, IncidentColumn::GroupName)?;

        let year_raw = self
            .cell(row, IncidentColumn::Year)
            .ok_or(DropReason::MissingRequiredField)?;
        let year = parse_year(year_raw).ok_or(DropReason::InvalidYear)?;
        if self.min_year.is_some_and(|min| year < min)
            || self.max_year.is_some_and(|max| year > max)
        {
            return Err(DropReason::YearOutOfRange);
        }

        let killed = self
            .cell(row, IncidentColumn::Killed)
            .map(parse_count)
            .transpose()?;
        let wounded = self
            .cell(row, IncidentColumn::Wounded)
            .map(parse_count)
            .transpose()?;
        if killed.is_none() && wounded.is_none() {
            return Err(DropReason::NoCasualtyData);
        }

        Ok(CleanedIncident {
            year,
            target_type,
            group_name,
            attack_type,
            country,
            killed,
            wounded,
        })
    }

    /// Trimmed cell content, `None` for absent, empty, or placeholder cells.
    fn cell<'a>(&self, row: &'a RawRow, column: IncidentColumn) -> Option<&'a str> {
        self.layout
            .cell(&row.fields, column)
            .map(str::trim)
            .filter(|value| !is_missing(value))
    }

    fn label(&self, row: &RawRow, column: IncidentColumn) -> Result<String, DropReason> {
        match self.cell(row, column) {
            Some(value) => Ok(value.to_string()),
            None if self.layout.is_required(column) => Err(DropReason::MissingRequiredField),
            None => Ok(UNKNOWN_LABEL.to_string()),
        }
    }
}

fn is_missing(value: &str) -> bool {
    value.is_empty()
        || PLACEHOLDER_TOKENS
            .iter()
            .any(|token| value.eq_ignore_ascii_case(token))
}

fn parse_year(value: &str) -> Option<i32> {
    value
        .parse::<i32>()
        .ok()
        .or_else(|| whole_number(value)?.parse().ok())
}

fn parse_count(value: &str) -> Result<u64, DropReason> {
    value
        .parse::<u64>()
        .ok()
        .or_else(|| whole_number(value)?.parse().ok())
        .ok_or(DropReason::InvalidCasualtyCount)
}

/// Integer digits of a `3.0`-style cell, which is how pandas writes integer
/// columns that contain nulls. Only `digits.zeros` qualifies.
fn whole_number(value: &str) -> Option<&str> {
    let (digits, fraction) = value.split_once('.')?;
    let is_digits = !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
    let is_zeros = !fraction.is_empty() && fraction.bytes().all(|b| b == b'0');
    (is_digits && is_zeros).then_some(digits)
}

/// Adapts a raw row stream into cleaned records, tallying drops as it goes.
pub struct CleanedRows<'s, I> {
    rows: I,
    cleaner: Cleaner,
    summary: &'s mut DropSummary,
}

impl<'s, I> CleanedRows<'s, I> {
    pub fn new(rows: I, cleaner: Cleaner, summary: &'s mut DropSummary) -> Self {
        Self {
            rows,
            cleaner,
            summary,
        }
    }
}

impl<I, E> Iterator for CleanedRows<'_, I>
where
    I: Iterator<Item = Result<RawRow, E>>,
{
    type Item = Result<CleanedIncident, E>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(err) => return Some(Err(err)),
            };
            self.summary.rows_read += 1;
            match self.cleaner.clean(&row) {
                Ok(record) => return Some(Ok(record)),
                Err(reason) => {
                    debug!("Dropping line {}: {reason}", row.line);
                    self.summary.record_drop(reason);
                }
            }
        }
    }
}
