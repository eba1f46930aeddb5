//! Pipeline configuration: defaults, YAML loading, and validation.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};

use crate::{
    error::PipelineError,
    schema::{self, IncidentColumn},
};

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_TOP_GROUPS: usize = 10;
/// The chart scripts kept only `iyear > 1900`.
pub const DEFAULT_MIN_YEAR: i32 = 1901;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub sample_rate: f64,
    pub seed: u64,
    pub required_columns: Vec<String>,
    pub sample_limit: Option<usize>,
    pub top_groups: usize,
    pub min_year: Option<i32>,
    /// `None` means the current calendar year.
    pub max_year: Option<i32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1.0,
            seed: DEFAULT_SEED,
            required_columns: IncidentColumn::DEFAULT_REQUIRED
                .iter()
                .map(|column| column.header().to_string())
                .collect(),
            sample_limit: None,
            top_groups: DEFAULT_TOP_GROUPS,
            min_year: Some(DEFAULT_MIN_YEAR),
            max_year: None,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("Opening config {path:?}"))?;
        let config: PipelineConfig =
            serde_yaml::from_str(&raw).with_context(|| format!("Parsing config {path:?}"))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_yaml::to_string(self).context("Serializing config")?;
        fs::write(path, serialized).with_context(|| format!("Writing config {path:?}"))
    }

    pub fn effective_max_year(&self) -> i32 {
        self.max_year.unwrap_or_else(|| Local::now().year())
    }

    /// Copy with `max_year` fixed to the year that a run would apply.
    pub fn resolved(&self) -> Self {
        Self {
            max_year: Some(self.effective_max_year()),
            ..self.clone()
        }
    }

    pub fn required(&self) -> Result<Vec<IncidentColumn>, PipelineError> {
        schema::parse_required_columns(&self.required_columns)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.sample_rate > 0.0 && self.sample_rate <= 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "sample_rate must be in (0, 1], got {}",
                self.sample_rate
            )));
        }
        if self.top_groups == 0 {
            return Err(PipelineError::InvalidConfig(
                "top_groups must be at least 1".to_string(),
            ));
        }
        if self.sample_limit == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "sample_limit must be at least 1 when set".to_string(),
            ));
        }
        if let Some(min) = self.min_year
            && min > self.effective_max_year()
        {
            return Err(PipelineError::InvalidConfig(format!(
                "min_year {min} is after max_year {}",
                self.effective_max_year()
            )));
        }
        if self.required_columns.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "required_columns cannot be empty".to_string(),
            ));
        }
        let required = self.required()?;
        if !required.contains(&IncidentColumn::Year) {
            return Err(PipelineError::InvalidConfig(format!(
                "required_columns must include '{}'",
                IncidentColumn::Year.header()
            )));
        }
        Ok(())
    }

    pub fn samples(&self) -> bool {
        self.sample_rate < 1.0 || self.sample_limit.is_some()
    }
}
