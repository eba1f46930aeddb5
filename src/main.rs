fn main() {
    if let Err(err) = incident_aggregates::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
