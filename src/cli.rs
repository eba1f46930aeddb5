use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Clean terrorism-incident exports and aggregate them into chart tables",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Clean, sample, and aggregate an incident export into the chart tables
    Aggregate(AggregateArgs),
    /// Write the cleaned (and sampled) incident records with total casualties
    Clean(CleanArgs),
    /// Summarize an incident export: record count, year span, drop reasons
    Profile(ProfileArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Incident export to read (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8; GTD exports are often latin1)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct PipelineArgs {
    /// YAML file with pipeline settings; flags below override it
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Fraction of cleaned records to keep, in (0, 1]
    #[arg(long = "sample-rate")]
    pub sample_rate: Option<f64>,
    /// Seed for reproducible sampling
    #[arg(long)]
    pub seed: Option<u64>,
    /// Keep at most this many cleaned records (uniform reservoir sample)
    #[arg(long = "sample-limit")]
    pub sample_limit: Option<usize>,
    /// Columns that must be present in the header, comma separated
    #[arg(long = "required-columns", value_delimiter = ',')]
    pub required_columns: Vec<String>,
    /// Drop rows whose year is earlier than this
    #[arg(long = "min-year")]
    pub min_year: Option<i32>,
    /// Drop rows whose year is later than this (defaults to the current year)
    #[arg(long = "max-year")]
    pub max_year: Option<i32>,
}

#[derive(Debug, Args)]
pub struct AggregateArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub pipeline: PipelineArgs,
    /// Directory for the table CSV files and run summary (prints tables when omitted)
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Groups to keep per year in the ranking table
    #[arg(long)]
    pub top: Option<usize>,
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub pipeline: PipelineArgs,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter to use for output (defaults to the input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
