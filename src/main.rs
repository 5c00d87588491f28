mod commands;

use clap::{ArgAction, Parser};
use commands::passes::passes_command;
use log::LevelFilter;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use westra_passes::catalog::{CatalogConfig, DEFAULT_HOST};
use westra_passes::kml::{DEFAULT_HEIGHT_LABEL, TranslateOptions};

#[derive(Parser)]
#[command(
    name = "westra-passes",
    version,
    about = "Download mountain passes around a GPX track from the Westra pass catalog into a GPX file"
)]
struct Cli {
    #[arg(help = "Path to the input GPX track")]
    input: PathBuf,

    #[arg(help = "Path of the GPX file to write the passes to")]
    output: PathBuf,

    #[arg(
        long,
        default_value_t = 5.0,
        allow_negative_numbers = true,
        help = "Distance around the track bounds to search for passes, in km"
    )]
    offset: f64,

    #[arg(long, default_value = DEFAULT_HOST, help = "Pass catalog site address")]
    host: String,

    #[arg(long, default_value_t = 30, help = "Request timeout in seconds")]
    timeout: u64,

    #[arg(
        long,
        default_value = DEFAULT_HEIGHT_LABEL,
        help = "Header of the elevation row in pass descriptions"
    )]
    height_label: String,

    #[arg(short, long, action = ArgAction::Count, help = "Increase log verbosity (-v info, -vv debug)")]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let catalog = CatalogConfig {
        host: cli.host,
        timeout: Duration::from_secs(cli.timeout),
    };
    let opts = TranslateOptions {
        height_label: cli.height_label,
    };

    passes_command(&cli.input, &cli.output, cli.offset, catalog, &opts)?;
    Ok(())
}
