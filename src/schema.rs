//! Static description of the incident export columns.
//!
//! The header row is resolved once into a [`ColumnLayout`]; every later cell
//! access goes through it by [`IncidentColumn`] rather than by column name.

use std::fmt;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IncidentColumn {
    Year,
    TargetType,
    GroupName,
    AttackType,
    Country,
    Killed,
    Wounded,
}

impl IncidentColumn {
    pub const ALL: [IncidentColumn; 7] = [
        IncidentColumn::Year,
        IncidentColumn::TargetType,
        IncidentColumn::GroupName,
        IncidentColumn::AttackType,
        IncidentColumn::Country,
        IncidentColumn::Killed,
        IncidentColumn::Wounded,
    ];

    /// Columns that must appear in the header unless configured otherwise.
    pub const DEFAULT_REQUIRED: [IncidentColumn; 6] = [
        IncidentColumn::Year,
        IncidentColumn::TargetType,
        IncidentColumn::AttackType,
        IncidentColumn::Country,
        IncidentColumn::Killed,
        IncidentColumn::Wounded,
    ];

    pub fn header(self) -> &'static str {
        match self {
            IncidentColumn::Year => "iyear",
            IncidentColumn::TargetType => "targtype1_txt",
            IncidentColumn::GroupName => "gname",
            IncidentColumn::AttackType => "attacktype1_txt",
            IncidentColumn::Country => "country_txt",
            IncidentColumn::Killed => "nkill",
            IncidentColumn::Wounded => "nwound",
        }
    }

    pub fn from_header(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        Self::ALL.into_iter().find(|column| column.header() == trimmed)
    }

}

impl fmt::Display for IncidentColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// Parses configured column names, rejecting anything outside the known set.
pub fn parse_required_columns(names: &[String]) -> Result<Vec<IncidentColumn>, PipelineError> {
    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let column = IncidentColumn::from_header(name).ok_or_else(|| {
            PipelineError::InvalidConfig(format!(
                "Unknown required column '{name}' (expected one of: {})",
                IncidentColumn::ALL.map(IncidentColumn::header).join(", ")
            ))
        })?;
        if !columns.contains(&column) {
            columns.push(column);
        }
    }
    Ok(columns)
}

/// Header positions of the incident columns plus which of them are required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    positions: [Option<usize>; 7],
    required: Vec<IncidentColumn>,
    width: usize,
}

impl ColumnLayout {
    /// Resolves `headers` against the known columns. Returns the names of
    /// required columns missing from the header on failure.
    pub fn resolve(headers: &[String], required: &[IncidentColumn]) -> Result<Self, Vec<String>> {
        let mut positions = [None; 7];
        for (idx, header) in headers.iter().enumerate() {
            if let Some(column) = IncidentColumn::from_header(header) {
                let slot = &mut positions[column as usize];
                // First occurrence wins for duplicated headers.
                if slot.is_none() {
                    *slot = Some(idx);
                }
            }
        }
        let missing = required
            .iter()
            .filter(|column| positions[**column as usize].is_none())
            .map(|column| column.header().to_string())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(missing);
        }
        Ok(Self {
            positions,
            required: required.to_vec(),
            width: headers.len(),
        })
    }

    pub fn position(&self, column: IncidentColumn) -> Option<usize> {
        self.positions[column as usize]
    }

    /// Number of columns in the header row.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_required(&self, column: IncidentColumn) -> bool {
        self.required.contains(&column)
    }

    pub fn cell<'a>(&self, fields: &'a [String], column: IncidentColumn) -> Option<&'a str> {
        self.position(column)
            .and_then(|idx| fields.get(idx))
            .map(|s| s.as_str())
    }
}
