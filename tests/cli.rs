mod common;

use std::fs;

use assert_cmd::Command;
use common::{Incident, TestWorkspace};
use predicates::{prelude::PredicateBooleanExt, str::contains};

fn bin() -> Command {
    Command::cargo_bin("incident-aggregates").expect("binary exists")
}

fn sample_rows() -> Vec<Incident<'static>> {
    vec![
        Incident::new("2014", "Iraq", "Islamic State of Iraq and the Levant (ISIL)")
            .attack("Bombing/Explosion")
            .target("Military")
            .casualties("12", "30"),
        Incident::new("2014", "Iraq", "Unknown")
            .attack("Armed Assault")
            .target("Police")
            .casualties("2", ""),
        Incident::new("2015", "Nigeria", "Boko Haram")
            .attack("Armed Assault")
            .target("Private Citizens & Property")
            .casualties("", "5"),
        Incident::new("2015", "Nigeria", "Boko Haram").casualties("", ""),
        Incident::new("1899", "Peru", "Shining Path (SL)"),
    ]
}

#[test]
fn aggregate_writes_table_files_and_summary() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_incidents("gtd.csv", &sample_rows());
    let out_dir = workspace.path().join("tables");

    bin()
        .args([
            "aggregate",
            "-i",
            input.to_str().unwrap(),
            "-o",
            out_dir.to_str().unwrap(),
        ])
        .assert()
        .success();

    let by_country =
        fs::read_to_string(out_dir.join("incidents_by_year_country.csv")).expect("table 1");
    assert_eq!(
        by_country,
        "iyear,country_txt,incidents\n2014,Iraq,2\n2015,Nigeria,1\n"
    );

    let pivot = fs::read_to_string(out_dir.join("attack_type_pivot.csv")).expect("pivot");
    assert_eq!(
        pivot,
        "iyear,Armed Assault,Bombing/Explosion\n2014,1,1\n2015,1,0\n"
    );

    let casualties =
        fs::read_to_string(out_dir.join("casualties_by_target_year.csv")).expect("table 3");
    assert!(casualties.contains("Military,2014,42,12,30,1"), "{casualties}");
    assert!(casualties.contains("Private Citizens & Property,2015,5,0,5,1"));

    let top = fs::read_to_string(out_dir.join("top_groups_by_year.csv")).expect("ranking");
    assert_eq!(
        top,
        "iyear,rank,gname,incidents\n\
         2014,1,Islamic State of Iraq and the Levant (ISIL),1\n\
         2014,2,Unknown,1\n\
         2015,1,Boko Haram,1\n"
    );

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join("run_summary.json")).unwrap())
            .expect("summary json");
    assert_eq!(summary["drops"]["rows_read"], 5);
    assert_eq!(summary["drops"]["dropped"]["no_casualty_data"], 1);
    assert_eq!(summary["drops"]["dropped"]["year_out_of_range"], 1);
    assert!(summary["config"]["max_year"].is_i64(), "{summary}");
    assert_eq!(summary["profile"]["killed"], 14);
    assert_eq!(summary["tables"]["incidents_by_year_country"]["rows"], 2);
}

#[test]
fn aggregate_without_output_prints_tables() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_incidents("gtd.csv", &sample_rows());
    bin()
        .args(["aggregate", "-i", input.to_str().unwrap(), "--top", "1"])
        .assert()
        .success()
        .stdout(
            contains("# incidents_by_year_country")
                .and(contains("# top_groups_by_year"))
                .and(contains("Boko Haram"))
                .and(contains("rank")),
        );
}

#[test]
fn clean_streams_records_to_stdout() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_incidents("gtd.csv", &sample_rows());
    bin()
        .args(["clean", "-i", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(
            contains("iyear,targtype1_txt,gname,attacktype1_txt,country_txt,nkill,nwound,total_casualties")
                .and(contains("2014,Police,Unknown,Armed Assault,Iraq,2,,2"))
                .and(contains("Shining Path").not()),
        );
}

#[test]
fn clean_honours_output_delimiter() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_incidents("gtd.csv", &sample_rows());
    let output = workspace.path().join("clean.tsv");
    bin()
        .args([
            "clean",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--output-delimiter",
            "tab",
        ])
        .assert()
        .success();
    let contents = fs::read_to_string(&output).expect("cleaned output");
    assert!(contents.starts_with("iyear\ttargtype1_txt\t"));
    assert_eq!(contents.lines().count(), 4);
}

#[test]
fn profile_reports_year_span_and_drops() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_incidents("gtd.csv", &sample_rows());
    bin()
        .args(["profile", "-i", input.to_str().unwrap()])
        .assert()
        .success()
        .stdout(
            contains("first year")
                .and(contains("2014"))
                .and(contains("dropped: no casualty data"))
                .and(contains("dropped: year out of range")),
        );
}

#[test]
fn config_file_and_flags_combine() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_incidents("gtd.csv", &sample_rows());
    let config = workspace.write("pipeline.yml", "min_year: 1800\ntop_groups: 3\n");
    let out_dir = workspace.path().join("tables");
    bin()
        .args([
            "aggregate",
            "-i",
            input.to_str().unwrap(),
            "-o",
            out_dir.to_str().unwrap(),
            "-c",
            config.to_str().unwrap(),
            "--max-year",
            "2014",
        ])
        .assert()
        .success();
    let by_country =
        fs::read_to_string(out_dir.join("incidents_by_year_country.csv")).expect("table 1");
    assert_eq!(
        by_country,
        "iyear,country_txt,incidents\n1899,Peru,1\n2014,Iraq,2\n"
    );
}

#[test]
fn invalid_sample_rate_fails() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_incidents("gtd.csv", &sample_rows());
    bin()
        .args([
            "aggregate",
            "-i",
            input.to_str().unwrap(),
            "--sample-rate",
            "1.5",
        ])
        .assert()
        .failure()
        .stderr(contains("sample_rate must be in (0, 1]"));
}

#[test]
fn missing_input_fails_with_source_error() {
    let workspace = TestWorkspace::new();
    let missing = workspace.path().join("nope.csv");
    bin()
        .args(["aggregate", "-i", missing.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("Failed to read incident source"));
}
