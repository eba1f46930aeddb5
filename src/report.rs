//! Turns a [`PipelineOutput`] into named tables, then into CSV files, a JSON
//! run summary, or aligned terminal text.

use std::{collections::BTreeMap, fmt::Write as _, fs, path::Path};

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::{
    aggregate::{
        Aggregates, DatasetProfile, TARGET_CASUALTIES_TABLE, YEAR_ATTACK_TYPE_TABLE,
        YEAR_COUNTRY_TABLE, YEAR_GROUP_TABLE,
    },
    cleaner::DropSummary,
    config::PipelineConfig,
    io_utils,
    pipeline::PipelineOutput,
};

pub const ATTACK_TYPE_PIVOT_TABLE: &str = "attack_type_pivot";
pub const TOP_GROUPS_TABLE: &str = "top_groups_by_year";
pub const SUMMARY_FILE: &str = "run_summary.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTable {
    pub name: &'static str,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    fn new(name: &'static str, headers: &[&str]) -> Self {
        Self {
            name,
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.csv", self.name)
    }

    pub fn to_csv_bytes(&self, delimiter: u8) -> Result<Vec<u8>> {
        let mut writer = io_utils::buffer_csv_writer(delimiter);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .into_inner()
            .map_err(|err| anyhow::anyhow!("Flushing table '{}': {}", self.name, err.error()))
    }
}

pub fn build_tables(output: &PipelineOutput) -> Vec<ReportTable> {
    let aggregates = &output.aggregates;
    vec![
        year_country_table(aggregates),
        year_attack_type_table(aggregates),
        attack_type_pivot_table(aggregates),
        target_casualties_table(aggregates),
        year_group_table(aggregates),
        top_groups_table(output),
    ]
}

fn year_country_table(aggregates: &Aggregates) -> ReportTable {
    let mut table = ReportTable::new(YEAR_COUNTRY_TABLE, &["iyear", "country_txt", "incidents"]);
    table.rows = aggregates
        .year_country
        .iter()
        .map(|(year, country, count)| vec![year.to_string(), country.to_string(), count.to_string()])
        .collect();
    table
}

fn year_attack_type_table(aggregates: &Aggregates) -> ReportTable {
    let mut table = ReportTable::new(
        YEAR_ATTACK_TYPE_TABLE,
        &["iyear", "attacktype1_txt", "incidents"],
    );
    table.rows = aggregates
        .year_attack_type
        .iter()
        .map(|(year, attack_type, count)| {
            vec![year.to_string(), attack_type.to_string(), count.to_string()]
        })
        .collect();
    table
}

fn attack_type_pivot_table(aggregates: &Aggregates) -> ReportTable {
    let pivot = aggregates.year_attack_type.pivot();
    let mut headers = Vec::with_capacity(pivot.attack_types.len() + 1);
    headers.push("iyear".to_string());
    headers.extend(pivot.attack_types.iter().cloned());
    let rows = pivot
        .rows
        .iter()
        .map(|(year, cells)| {
            std::iter::once(year.to_string())
                .chain(cells.iter().map(|c| c.to_string()))
                .collect()
        })
        .collect();
    ReportTable {
        name: ATTACK_TYPE_PIVOT_TABLE,
        headers,
        rows,
    }
}

fn target_casualties_table(aggregates: &Aggregates) -> ReportTable {
    let mut table = ReportTable::new(
        TARGET_CASUALTIES_TABLE,
        &[
            "targtype1_txt",
            "iyear",
            "total_casualties",
            "nkill",
            "nwound",
            "incidents",
        ],
    );
    table.rows = aggregates
        .target_casualties
        .iter()
        .map(|(target_type, year, totals)| {
            vec![
                target_type.to_string(),
                year.to_string(),
                totals.casualties.to_string(),
                totals.killed.to_string(),
                totals.wounded.to_string(),
                totals.incidents.to_string(),
            ]
        })
        .collect();
    table
}

fn year_group_table(aggregates: &Aggregates) -> ReportTable {
    let mut table = ReportTable::new(YEAR_GROUP_TABLE, &["iyear", "gname", "incidents"]);
    table.rows = aggregates
        .year_group
        .iter()
        .map(|(year, group, count)| vec![year.to_string(), group.to_string(), count.to_string()])
        .collect();
    table
}

fn top_groups_table(output: &PipelineOutput) -> ReportTable {
    let mut table = ReportTable::new(TOP_GROUPS_TABLE, &["iyear", "rank", "gname", "incidents"]);
    table.rows = output
        .group_ranking()
        .into_iter()
        .map(|rank| {
            vec![
                rank.year.to_string(),
                rank.rank.to_string(),
                rank.group,
                rank.incidents.to_string(),
            ]
        })
        .collect();
    table
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDigest {
    pub file: String,
    pub rows: usize,
    pub sha256: String,
}

#[derive(Debug, Serialize)]
struct ProfileSummary<'a> {
    records: u64,
    first_year: Option<i32>,
    last_year: Option<i32>,
    killed: u64,
    wounded: u64,
    target_types: Vec<&'a str>,
}

impl<'a> From<&'a DatasetProfile> for ProfileSummary<'a> {
    fn from(profile: &'a DatasetProfile) -> Self {
        Self {
            records: profile.records,
            first_year: profile.min_year,
            last_year: profile.max_year,
            killed: profile.killed,
            wounded: profile.wounded,
            target_types: profile.target_types().collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    input: String,
    /// Carries the applied `max_year` even when the caller left it unset.
    config: PipelineConfig,
    drops: &'a DropSummary,
    profile: ProfileSummary<'a>,
    tables: BTreeMap<&'static str, TableDigest>,
}

/// Writes every table as `<name>.csv` under `dir` plus [`SUMMARY_FILE`].
/// Returns the digests recorded in the summary.
pub fn write_tables(
    dir: &Path,
    input: &Path,
    config: &PipelineConfig,
    output: &PipelineOutput,
) -> Result<BTreeMap<&'static str, TableDigest>> {
    io_utils::ensure_directory(dir)?;
    let mut digests = BTreeMap::new();
    for table in build_tables(output) {
        let bytes = table.to_csv_bytes(io_utils::DEFAULT_CSV_DELIMITER)?;
        let path = dir.join(table.file_name());
        fs::write(&path, &bytes).with_context(|| format!("Writing table {path:?}"))?;
        info!("Wrote {} row(s) to {:?}", table.rows.len(), path);
        digests.insert(
            table.name,
            TableDigest {
                file: table.file_name(),
                rows: table.rows.len(),
                sha256: format!("{:x}", Sha256::digest(&bytes)),
            },
        );
    }

    let summary = RunSummary {
        input: input.display().to_string(),
        config: config.resolved(),
        drops: &output.drops,
        profile: ProfileSummary::from(&output.aggregates.profile),
        tables: digests.clone(),
    };
    let summary_path = dir.join(SUMMARY_FILE);
    let rendered = serde_json::to_string_pretty(&summary).context("Serializing run summary")?;
    fs::write(&summary_path, rendered)
        .with_context(|| format!("Writing run summary {summary_path:?}"))?;
    info!("Run summary written to {:?}", summary_path);
    Ok(digests)
}

/// Aligned plain-text rendering; numeric cells are right-aligned.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers
        .iter()
        .map(|h| h.chars().count().max(1))
        .collect::<Vec<_>>();
    let mut numeric = vec![!rows.is_empty(); column_count];
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(cell.chars().count());
            if !cell.is_empty() && cell.parse::<i64>().is_err() {
                numeric[idx] = false;
            }
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_line(headers, &widths, &numeric));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_line(&rule, &widths, &numeric));
    for row in rows {
        let _ = writeln!(output, "{}", format_line(row, &widths, &numeric));
    }
    output
}

pub fn print_table(table: &ReportTable) {
    println!("# {}", table.name);
    print!("{}", render_table(&table.headers, &table.rows));
    println!();
}

fn format_line(values: &[String], widths: &[usize], numeric: &[bool]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .zip(numeric)
        .map(|((value, &width), &right)| {
            let clean = value.replace(['\n', '\r', '\t'], " ");
            if right {
                format!("{clean:>width$}")
            } else {
                format!("{clean:<width$}")
            }
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}
