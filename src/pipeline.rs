//! Wires loader → cleaner → sampler → sink for one run.

use std::{io::Write, path::Path};

use anyhow::{Context, Result};
use log::info;

use crate::{
    aggregate::{Aggregates, GroupRank},
    cleaner::{CleanedIncident, CleanedRows, Cleaner, DropSummary},
    config::PipelineConfig,
    loader::{IncidentSource, SourceOptions},
    sampler::{Reservoir, Sampler},
    schema::IncidentColumn,
};

pub const CLEANED_HEADERS: [&str; 8] = [
    "iyear",
    "targtype1_txt",
    "gname",
    "attacktype1_txt",
    "country_txt",
    "nkill",
    "nwound",
    "total_casualties",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub aggregates: Aggregates,
    pub drops: DropSummary,
    pub top_groups: usize,
}

impl PipelineOutput {
    pub fn group_ranking(&self) -> Vec<GroupRank> {
        self.aggregates.year_group.top_groups(self.top_groups)
    }
}

pub fn run(input: &Path, config: &PipelineConfig, options: SourceOptions) -> Result<PipelineOutput> {
    let mut aggregates = Aggregates::default();
    let drops = for_each_record(input, config, options, |record| {
        aggregates.ingest(record)?;
        Ok(())
    })?;
    Ok(PipelineOutput {
        aggregates,
        drops,
        top_groups: config.top_groups,
    })
}

/// Streams cleaned (and sampled) records into `writer` with the derived
/// `total_casualties` column.
pub fn clean_to_writer<W: Write>(
    input: &Path,
    config: &PipelineConfig,
    options: SourceOptions,
    writer: &mut csv::Writer<W>,
) -> Result<DropSummary> {
    writer
        .write_record(CLEANED_HEADERS)
        .context("Writing cleaned header")?;
    let drops = for_each_record(input, config, options, |record| {
        writer
            .write_record(cleaned_row(record))
            .context("Writing cleaned record")
    })?;
    writer.flush().context("Flushing cleaned output")?;
    Ok(drops)
}

pub fn cleaned_row(record: &CleanedIncident) -> [String; 8] {
    let count = |value: Option<u64>| value.map(|n| n.to_string()).unwrap_or_default();
    [
        record.year.to_string(),
        record.target_type.clone(),
        record.group_name.clone(),
        record.attack_type.clone(),
        record.country.clone(),
        count(record.killed),
        count(record.wounded),
        record.total_casualties().to_string(),
    ]
}

/// Runs the shared front half of the pipeline and hands every retained
/// record to `sink`. Returns the drop summary for the run.
pub fn for_each_record<F>(
    input: &Path,
    config: &PipelineConfig,
    options: SourceOptions,
    mut sink: F,
) -> Result<DropSummary>
where
    F: FnMut(&CleanedIncident) -> Result<()>,
{
    config.validate()?;
    let required: Vec<IncidentColumn> = config.required()?;
    let mut source = IncidentSource::open(input, &required, options)?;
    let cleaner = Cleaner::new(
        source.layout().clone(),
        config.min_year,
        Some(config.effective_max_year()),
    );
    let mut sampler = Sampler::new(config.sample_rate, config.seed)?;
    let mut reservoir = config
        .sample_limit
        .map(|limit| Reservoir::new(limit, config.seed));

    let mut summary = DropSummary::default();
    let mut kept = 0u64;
    let mut sampled_out = 0u64;
    for record in CleanedRows::new(source.rows(), cleaner, &mut summary) {
        let record = record?;
        if !sampler.keep() {
            sampled_out += 1;
            continue;
        }
        match reservoir.as_mut() {
            Some(reservoir) => reservoir.offer(record),
            None => {
                sink(&record)?;
                kept += 1;
            }
        }
    }
    if let Some(reservoir) = reservoir {
        sampled_out += reservoir.discarded();
        info!(
            "Sample limit retained {} of {} cleaned record(s)",
            reservoir.seen() - reservoir.discarded(),
            reservoir.seen()
        );
        for record in reservoir.into_ordered() {
            sink(&record)?;
            kept += 1;
        }
    }
    summary.rows_kept = kept;
    summary.rows_sampled_out = sampled_out;

    info!(
        "Read {} row(s) from '{}': {} kept, {} dropped, {} sampled out",
        summary.rows_read,
        source.path().display(),
        summary.rows_kept,
        summary.total_dropped(),
        summary.rows_sampled_out
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::DropReason;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE: &str = "\
iyear,targtype1_txt,gname,attacktype1_txt,country_txt,nkill,nwound
2016,Civilians,Unknown,Bombing,Iraq,3,
2016,,Unknown,Bombing,Iraq,1,1
2012,Police,GroupA,Armed Assault,Peru,0,2
2012,Police,GroupB,Armed Assault,Peru,,
";

    #[test]
    fn run_aggregates_and_counts_drops() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("incidents.csv");
        fs::write(&path, SAMPLE).expect("write sample");
        let output = run(&path, &PipelineConfig::default(), SourceOptions::default())
            .expect("pipeline");
        assert_eq!(output.drops.rows_read, 4);
        assert_eq!(output.drops.rows_kept, 2);
        assert_eq!(output.drops.count(DropReason::MissingRequiredField), 1);
        assert_eq!(output.drops.count(DropReason::NoCasualtyData), 1);
        assert_eq!(output.aggregates.year_country.total(), 2);
        assert_eq!(
            output.aggregates.target_casualties.get("Civilians", 2016).casualties,
            3
        );
    }

    #[test]
    fn sample_limit_caps_records() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("incidents.csv");
        fs::write(&path, SAMPLE).expect("write sample");
        let config = PipelineConfig {
            sample_limit: Some(1),
            ..PipelineConfig::default()
        };
        let output = run(&path, &config, SourceOptions::default()).expect("pipeline");
        assert_eq!(output.drops.rows_kept, 1);
        assert_eq!(output.drops.rows_sampled_out, 1);
        assert_eq!(output.aggregates.profile.records, 1);
    }

    #[test]
    fn invalid_config_aborts_before_reading() {
        let config = PipelineConfig {
            sample_rate: 0.0,
            ..PipelineConfig::default()
        };
        let err = run(Path::new("missing.csv"), &config, SourceOptions::default())
            .expect_err("invalid config");
        assert!(matches!(
            err.downcast_ref::<crate::error::PipelineError>(),
            Some(crate::error::PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn cleaned_writer_emits_total_column() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("incidents.csv");
        fs::write(&path, SAMPLE).expect("write sample");
        let mut writer = crate::io_utils::buffer_csv_writer(b',');
        let drops = clean_to_writer(
            &path,
            &PipelineConfig::default(),
            SourceOptions::default(),
            &mut writer,
        )
        .expect("clean");
        assert_eq!(drops.rows_kept, 2);
        let bytes = writer.into_inner().expect("buffer");
        let text = String::from_utf8(bytes).expect("utf-8");
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], CLEANED_HEADERS.join(","));
        assert_eq!(lines[1], "2016,Civilians,Unknown,Bombing,Iraq,3,,3");
        assert_eq!(lines[2], "2012,Police,GroupA,Armed Assault,Peru,0,2,2");
    }
}
