pub mod commands;
pub mod logging;
pub mod workbook;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use planbook_core::config::{AppConfig, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "planbook",
    about = "Planbook scenario planning CLI",
    long_about = "Summarize, reconcile and export scenario planning workbooks, and inspect screen profiles and configuration.",
    after_help = "Examples:\n  planbook profiles\n  planbook summarize --workbook capital.json --all\n  planbook reconcile --workbook capital.json --rows actuals.json --write"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Recompute totals for a workbook and print the resolved view")]
    Summarize {
        #[arg(long, help = "Path to the JSON workbook")]
        workbook: PathBuf,
        #[arg(long, help = "Scenario to summarize instead of the workbook's active one")]
        scenario: Option<String>,
        #[arg(long, help = "Emit totals for every scenario")]
        all: bool,
    },
    #[command(about = "Merge imported rows into existing items of one scenario")]
    Reconcile {
        #[arg(long, help = "Path to the JSON workbook")]
        workbook: PathBuf,
        #[arg(long, help = "Path to a JSON array of imported rows")]
        rows: PathBuf,
        #[arg(long, help = "Scenario receiving the rows")]
        scenario: Option<String>,
        #[arg(long, help = "Write the reconciled workbook back to disk")]
        write: bool,
    },
    #[command(about = "Flatten one scenario into export rows")]
    Export {
        #[arg(long, help = "Path to the JSON workbook")]
        workbook: PathBuf,
        #[arg(long, help = "Scenario to export instead of the workbook's active one")]
        scenario: Option<String>,
        #[arg(long, help = "Emit rows keyed by column name")]
        records: bool,
    },
    #[command(about = "List built-in screen profiles or show one in full")]
    Profiles {
        #[arg(long, help = "Screen profile to show, e.g. capital_allocation")]
        kind: Option<String>,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        logging::init_logging(&config);
    }

    let result = match cli.command {
        Command::Summarize { workbook, scenario, all } => {
            commands::summarize::run(&workbook, scenario.as_deref(), all)
        }
        Command::Reconcile { workbook, rows, scenario, write } => {
            commands::reconcile::run(&workbook, &rows, scenario.as_deref(), write)
        }
        Command::Export { workbook, scenario, records } => {
            commands::export::run(&workbook, scenario.as_deref(), records)
        }
        Command::Profiles { kind } => commands::profiles::run(kind.as_deref()),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
