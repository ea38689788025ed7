use clap::{Arg, Command};
use std::process;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let matches = Command::new("load-voters")
        .about("Full-refresh load of the statewide voter registration file")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Sets a custom config file"),
        )
        .arg(
            Arg::new("batch-size")
                .short('b')
                .long("batch-size")
                .value_name("ROWS")
                .value_parser(clap::value_parser!(usize))
                .help("Rows per insert batch (default from config)"),
        )
        .get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or("config/loader.toml");
    let batch_size = matches.get_one::<usize>("batch-size").copied();

    match loader::run_voter_load(config_path, batch_size).await {
        Ok(outcome) if outcome.success => {
            println!(
                "Loaded {} rows ({} skipped) from {}",
                outcome.rows_loaded,
                outcome.rows_skipped,
                outcome.source_file.as_deref().unwrap_or("<unknown>")
            );
        }
        Ok(outcome) => {
            eprintln!(
                "Voter load failed: {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            );
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Voter load error: {e}");
            process::exit(1);
        }
    }
}
