pub mod aggregate;
pub mod cleaner;
pub mod cli;
pub mod config;
pub mod error;
pub mod io_utils;
pub mod loader;
pub mod pipeline;
pub mod report;
pub mod sampler;
pub mod schema;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, PipelineArgs, SourceArgs},
    config::PipelineConfig,
    loader::SourceOptions,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("incident_aggregates", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Aggregate(args) => handle_aggregate(&args),
        Commands::Clean(args) => handle_clean(&args),
        Commands::Profile(args) => handle_profile(&args),
    }
}

fn handle_aggregate(args: &cli::AggregateArgs) -> Result<()> {
    let mut config = resolve_config(&args.pipeline)?;
    if let Some(top) = args.top {
        config.top_groups = top;
    }
    let options = resolve_source_options(&args.source)?;
    let output = pipeline::run(&args.source.input, &config, options)
        .with_context(|| format!("Aggregating {:?}", args.source.input))?;

    match &args.output_dir {
        Some(dir) => {
            let digests = report::write_tables(dir, &args.source.input, &config, &output)?;
            info!("Wrote {} table(s) to {:?}", digests.len(), dir);
        }
        None => {
            for table in report::build_tables(&output) {
                report::print_table(&table);
            }
        }
    }
    Ok(())
}

fn handle_clean(args: &cli::CleanArgs) -> Result<()> {
    let config = resolve_config(&args.pipeline)?;
    let options = resolve_source_options(&args.source)?;
    let input_delimiter = io_utils::resolve_input_delimiter(&args.source.input, options.delimiter);
    let output_delimiter = args.output_delimiter.unwrap_or(input_delimiter);
    info!(
        "Cleaning '{}' -> {} (output delimiter '{}')",
        args.source.input.display(),
        args.output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".into()),
        printable_delimiter(output_delimiter)
    );
    let mut writer = io_utils::open_csv_writer(args.output.as_deref(), output_delimiter)?;
    let drops = pipeline::clean_to_writer(&args.source.input, &config, options, &mut writer)
        .with_context(|| format!("Cleaning {:?}", args.source.input))?;
    info!(
        "Wrote {} cleaned record(s); {} row(s) dropped",
        drops.rows_kept,
        drops.total_dropped()
    );
    Ok(())
}

fn handle_profile(args: &cli::ProfileArgs) -> Result<()> {
    let config = resolve_config(&args.pipeline)?;
    let options = resolve_source_options(&args.source)?;
    let output = pipeline::run(&args.source.input, &config, options)
        .with_context(|| format!("Profiling {:?}", args.source.input))?;
    let headers = vec!["metric".to_string(), "value".to_string()];
    let mut rows = output.aggregates.profile.render_rows();
    rows.extend(output.drops.render_rows());
    print!("{}", report::render_table(&headers, &rows));
    Ok(())
}

fn resolve_config(args: &PipelineArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(rate) = args.sample_rate {
        config.sample_rate = rate;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(limit) = args.sample_limit {
        config.sample_limit = Some(limit);
    }
    if !args.required_columns.is_empty() {
        config.required_columns = args
            .required_columns
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect();
    }
    if let Some(year) = args.min_year {
        config.min_year = Some(year);
    }
    if let Some(year) = args.max_year {
        config.max_year = Some(year);
    }
    // Pin the year window once so the run and its summary agree.
    let config = config.resolved();
    debug!("Resolved pipeline config: {config:?}");
    Ok(config)
}

fn resolve_source_options(args: &SourceArgs) -> Result<SourceOptions> {
    Ok(SourceOptions {
        delimiter: args.delimiter,
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
    })
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
