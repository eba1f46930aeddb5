//! The four chart aggregates, updated together in one pass over cleaned
//! records.
//!
//! Every table is an ordered map so rendering is deterministic. Counts and
//! sums use checked arithmetic and surface
//! [`PipelineError::AggregationOverflow`] instead of wrapping. Partial
//! aggregates combine with [`Aggregates::merge`]; merging is associative and
//! gives the same result as a single pass over the concatenated input.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Debug,
};

use itertools::Itertools;
use serde::Serialize;

use crate::{cleaner::CleanedIncident, error::PipelineError};

pub const YEAR_COUNTRY_TABLE: &str = "incidents_by_year_country";
pub const YEAR_ATTACK_TYPE_TABLE: &str = "incidents_by_year_attack_type";
pub const TARGET_CASUALTIES_TABLE: &str = "casualties_by_target_year";
pub const YEAR_GROUP_TABLE: &str = "incidents_by_year_group";
const PROFILE_TABLE: &str = "profile";

fn add_checked(
    value: &mut u64,
    amount: u64,
    table: &'static str,
    key: impl Debug,
) -> Result<(), PipelineError> {
    *value = value
        .checked_add(amount)
        .ok_or_else(|| PipelineError::overflow(table, format!("{key:?}")))?;
    Ok(())
}

fn merge_counts<K>(
    into: &mut BTreeMap<K, u64>,
    from: BTreeMap<K, u64>,
    table: &'static str,
) -> Result<(), PipelineError>
where
    K: Ord + Debug,
{
    for (key, count) in from {
        let slot = into.entry(key).or_insert(0);
        let current = *slot;
        *slot = current
            .checked_add(count)
            .ok_or_else(|| PipelineError::overflow(table, "merge"))?;
    }
    Ok(())
}

/// Table 1: incidents per (year, country).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearCountryCounts {
    counts: BTreeMap<(i32, String), u64>,
}

impl YearCountryCounts {
    pub fn ingest(&mut self, record: &CleanedIncident) -> Result<(), PipelineError> {
        let key = (record.year, record.country.clone());
        let slot = self.counts.entry(key).or_insert(0);
        add_checked(slot, 1, YEAR_COUNTRY_TABLE, (record.year, &record.country))
    }

    pub fn get(&self, year: i32, country: &str) -> u64 {
        self.counts
            .get(&(year, country.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &str, u64)> + '_ {
        self.counts
            .iter()
            .map(|((year, country), count)| (*year, country.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn merge(&mut self, other: YearCountryCounts) -> Result<(), PipelineError> {
        merge_counts(&mut self.counts, other.counts, YEAR_COUNTRY_TABLE)
    }
}

/// Table 2: incidents per (year, attack type).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearAttackTypeCounts {
    counts: BTreeMap<(i32, String), u64>,
}

/// Wide view of table 2: one row per year, one column per attack type,
/// zero-filled where a year has no incidents of that type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackTypePivot {
    pub attack_types: Vec<String>,
    pub rows: Vec<(i32, Vec<u64>)>,
}

impl YearAttackTypeCounts {
    pub fn ingest(&mut self, record: &CleanedIncident) -> Result<(), PipelineError> {
        let key = (record.year, record.attack_type.clone());
        let slot = self.counts.entry(key).or_insert(0);
        add_checked(
            slot,
            1,
            YEAR_ATTACK_TYPE_TABLE,
            (record.year, &record.attack_type),
        )
    }

    pub fn get(&self, year: i32, attack_type: &str) -> u64 {
        self.counts
            .get(&(year, attack_type.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &str, u64)> + '_ {
        self.counts
            .iter()
            .map(|((year, attack_type), count)| (*year, attack_type.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn pivot(&self) -> AttackTypePivot {
        let attack_types = self
            .counts
            .keys()
            .map(|(_, attack_type)| attack_type.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        let rows = self
            .counts
            .iter()
            .chunk_by(|((year, _), _)| *year)
            .into_iter()
            .map(|(year, entries)| {
                let mut cells = vec![0u64; attack_types.len()];
                for ((_, attack_type), count) in entries {
                    if let Ok(idx) = attack_types.binary_search(attack_type) {
                        cells[idx] = *count;
                    }
                }
                (year, cells)
            })
            .collect();
        AttackTypePivot { attack_types, rows }
    }

    pub fn merge(&mut self, other: YearAttackTypeCounts) -> Result<(), PipelineError> {
        merge_counts(&mut self.counts, other.counts, YEAR_ATTACK_TYPE_TABLE)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CasualtyTotals {
    pub casualties: u64,
    pub killed: u64,
    pub wounded: u64,
    pub incidents: u64,
}

impl CasualtyTotals {
    fn absorb(&mut self, other: &CasualtyTotals, key: impl Debug) -> Result<(), PipelineError> {
        add_checked(&mut self.casualties, other.casualties, TARGET_CASUALTIES_TABLE, &key)?;
        add_checked(&mut self.killed, other.killed, TARGET_CASUALTIES_TABLE, &key)?;
        add_checked(&mut self.wounded, other.wounded, TARGET_CASUALTIES_TABLE, &key)?;
        add_checked(&mut self.incidents, other.incidents, TARGET_CASUALTIES_TABLE, &key)
    }
}

/// Table 3: casualty sums and incident counts per (target type, year).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetCasualties {
    totals: BTreeMap<(String, i32), CasualtyTotals>,
}

impl TargetCasualties {
    pub fn ingest(&mut self, record: &CleanedIncident) -> Result<(), PipelineError> {
        let key = (record.target_type.clone(), record.year);
        let casualties = record.checked_total_casualties().ok_or_else(|| {
            PipelineError::overflow(TARGET_CASUALTIES_TABLE, format!("{key:?}"))
        })?;
        let contribution = CasualtyTotals {
            casualties,
            killed: record.killed.unwrap_or(0),
            wounded: record.wounded.unwrap_or(0),
            incidents: 1,
        };
        let slot = self.totals.entry(key).or_default();
        slot.absorb(&contribution, (&record.target_type, record.year))
    }

    pub fn get(&self, target_type: &str, year: i32) -> CasualtyTotals {
        self.totals
            .get(&(target_type.to_string(), year))
            .copied()
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32, &CasualtyTotals)> + '_ {
        self.totals
            .iter()
            .map(|((target_type, year), totals)| (target_type.as_str(), *year, totals))
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn merge(&mut self, other: TargetCasualties) -> Result<(), PipelineError> {
        for (key, totals) in other.totals {
            let slot = self.totals.entry(key).or_default();
            slot.absorb(&totals, "merge")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRank {
    pub year: i32,
    pub rank: usize,
    pub group: String,
    pub incidents: u64,
}

/// Table 4: incidents per (year, perpetrator group).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearGroupCounts {
    counts: BTreeMap<(i32, String), u64>,
}

impl YearGroupCounts {
    pub fn ingest(&mut self, record: &CleanedIncident) -> Result<(), PipelineError> {
        let key = (record.year, record.group_name.clone());
        let slot = self.counts.entry(key).or_insert(0);
        add_checked(slot, 1, YEAR_GROUP_TABLE, (record.year, &record.group_name))
    }

    pub fn get(&self, year: i32, group: &str) -> u64 {
        self.counts
            .get(&(year, group.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &str, u64)> + '_ {
        self.counts
            .iter()
            .map(|((year, group), count)| (*year, group.as_str(), *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Per year, the `limit` busiest groups: count descending, then group
    /// name ascending.
    pub fn top_groups(&self, limit: usize) -> Vec<GroupRank> {
        self.counts
            .iter()
            .chunk_by(|((year, _), _)| *year)
            .into_iter()
            .flat_map(|(year, entries)| {
                entries
                    .map(|((_, group), count)| (group.as_str(), *count))
                    .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
                    .take(limit)
                    .enumerate()
                    .map(move |(idx, (group, incidents))| GroupRank {
                        year,
                        rank: idx + 1,
                        group: group.to_string(),
                        incidents,
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn merge(&mut self, other: YearGroupCounts) -> Result<(), PipelineError> {
        merge_counts(&mut self.counts, other.counts, YEAR_GROUP_TABLE)
    }
}

/// Dataset-level figures reported next to the tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetProfile {
    pub records: u64,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub killed: u64,
    pub wounded: u64,
    target_types: BTreeSet<String>,
}

impl DatasetProfile {
    pub fn ingest(&mut self, record: &CleanedIncident) -> Result<(), PipelineError> {
        add_checked(&mut self.records, 1, PROFILE_TABLE, "records")?;
        add_checked(
            &mut self.killed,
            record.killed.unwrap_or(0),
            PROFILE_TABLE,
            "killed",
        )?;
        add_checked(
            &mut self.wounded,
            record.wounded.unwrap_or(0),
            PROFILE_TABLE,
            "wounded",
        )?;
        self.observe_years(Some(record.year), Some(record.year));
        if !self.target_types.contains(&record.target_type) {
            self.target_types.insert(record.target_type.clone());
        }
        Ok(())
    }

    fn observe_years(&mut self, min: Option<i32>, max: Option<i32>) {
        self.min_year = match (self.min_year, min) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max_year = match (self.max_year, max) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    pub fn distinct_target_types(&self) -> usize {
        self.target_types.len()
    }

    pub fn target_types(&self) -> impl Iterator<Item = &str> + '_ {
        self.target_types.iter().map(|s| s.as_str())
    }

    pub fn merge(&mut self, other: DatasetProfile) -> Result<(), PipelineError> {
        add_checked(&mut self.records, other.records, PROFILE_TABLE, "records")?;
        add_checked(&mut self.killed, other.killed, PROFILE_TABLE, "killed")?;
        add_checked(&mut self.wounded, other.wounded, PROFILE_TABLE, "wounded")?;
        self.observe_years(other.min_year, other.max_year);
        self.target_types.extend(other.target_types);
        Ok(())
    }

    pub fn render_rows(&self) -> Vec<Vec<String>> {
        let year = |value: Option<i32>| value.map(|y| y.to_string()).unwrap_or_default();
        vec![
            vec!["records".to_string(), self.records.to_string()],
            vec!["first year".to_string(), year(self.min_year)],
            vec!["last year".to_string(), year(self.max_year)],
            vec![
                "target types".to_string(),
                self.distinct_target_types().to_string(),
            ],
            vec!["killed".to_string(), self.killed.to_string()],
            vec!["wounded".to_string(), self.wounded.to_string()],
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregates {
    pub year_country: YearCountryCounts,
    pub year_attack_type: YearAttackTypeCounts,
    pub target_casualties: TargetCasualties,
    pub year_group: YearGroupCounts,
    pub profile: DatasetProfile,
}

impl Aggregates {
    pub fn ingest(&mut self, record: &CleanedIncident) -> Result<(), PipelineError> {
        self.year_country.ingest(record)?;
        self.year_attack_type.ingest(record)?;
        self.target_casualties.ingest(record)?;
        self.year_group.ingest(record)?;
        self.profile.ingest(record)
    }

    pub fn from_records<'a, I>(records: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = &'a CleanedIncident>,
    {
        let mut aggregates = Self::default();
        for record in records {
            aggregates.ingest(record)?;
        }
        Ok(aggregates)
    }

    pub fn merge(&mut self, other: Aggregates) -> Result<(), PipelineError> {
        self.year_country.merge(other.year_country)?;
        self.year_attack_type.merge(other.year_attack_type)?;
        self.target_casualties.merge(other.target_casualties)?;
        self.year_group.merge(other.year_group)?;
        self.profile.merge(other.profile)
    }
}
