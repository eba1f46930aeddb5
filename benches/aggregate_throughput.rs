use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use criterion::{Criterion, criterion_group, criterion_main};
use incident_aggregates::config::PipelineConfig;
use incident_aggregates::loader::SourceOptions;
use incident_aggregates::pipeline;
use tempfile::TempDir;

const COUNTRIES: [&str; 6] = ["Iraq", "Afghanistan", "Pakistan", "India", "Nigeria", "Peru"];
const ATTACKS: [&str; 4] = ["Bombing/Explosion", "Armed Assault", "Assassination", "Hijacking"];
const TARGETS: [&str; 4] = ["Military", "Police", "Private Citizens & Property", "Business"];

fn generate_incidents(rows: usize) -> (TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("gtd.csv");
    let mut file = BufWriter::new(File::create(&csv_path).expect("create csv"));
    writeln!(
        file,
        "eventid,iyear,country_txt,attacktype1_txt,targtype1_txt,gname,nkill,nwound"
    )
    .expect("header");
    for i in 0..rows {
        let year = 1970 + (i % 48);
        let country = COUNTRIES[i % COUNTRIES.len()];
        let attack = ATTACKS[i % ATTACKS.len()];
        let target = TARGETS[(i / 3) % TARGETS.len()];
        let group = format!("Group {}", i % 40);
        let killed = if i % 7 == 0 { String::new() } else { (i % 11).to_string() };
        writeln!(
            file,
            "{i},{year},{country},{attack},{target},{group},{killed},{}",
            i % 5
        )
        .expect("row");
    }
    file.flush().expect("flush");
    (temp_dir, csv_path)
}

fn bench_aggregate(c: &mut Criterion) {
    let (_dir, input) = generate_incidents(50_000);
    let full = PipelineConfig::default();
    let sampled = PipelineConfig {
        sample_rate: 0.1,
        ..PipelineConfig::default()
    };

    let mut group = c.benchmark_group("aggregate_50k");
    group.sample_size(10);
    group.bench_function("full", |b| {
        b.iter(|| pipeline::run(&input, &full, SourceOptions::default()).expect("run"))
    });
    group.bench_function("sample_rate_0_1", |b| {
        b.iter(|| pipeline::run(&input, &sampled, SourceOptions::default()).expect("run"))
    });
    group.finish();
}

criterion_group!(benches, bench_aggregate);
criterion_main!(benches);
