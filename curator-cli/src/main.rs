//! The action-file runner binary.
//!
//! `curator [--config PATH] [--dry-run] ACTION_FILE`
//!
//! Exit codes: 0 success, 1 empty-list error, 2 action failure,
//! 3 configuration error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use curator::{ActionFile, Runner};
use curator_cli_support::{connect, exit_with, init_logging, GlobalFlags};

#[derive(Parser, Debug)]
#[command(name = "curator")]
#[command(about = "Apply a numbered action file to an Elasticsearch cluster")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalFlags,

    /// Validate and report without mutating the cluster
    #[arg(long)]
    dry_run: bool,

    /// YAML action file
    action_file: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.global.resolve() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(3);
        }
    };
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(3);
    }

    let actions = match ActionFile::load(&cli.action_file) {
        Ok(actions) => actions,
        Err(e) => exit_with(&e),
    };

    let client = match connect(&config).await {
        Ok(Some(client)) => client,
        Ok(None) => return ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(3);
        }
    };

    let report = Runner::new(&client, cli.dry_run).run(&actions).await;
    println!("{}", report.summary());
    ExitCode::from(report.exit_code() as u8)
}
