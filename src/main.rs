mod classifier;
mod config;
mod discovery;
mod error;
mod logging;
mod organizer;
mod prompt;
mod scan_log;
mod session;

use std::io;
use std::process::ExitCode;

use log::{error, info};

use crate::classifier::NsfwClassifier;
use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::organizer::{Scan, ScanSummary};

const BANNER_WIDTH: usize = 60;

fn main() -> ExitCode {
    logging::init();

    let rule = "=".repeat(BANNER_WIDTH);
    println!("{rule}");
    println!("SAFESORT - NSFW IMAGE CLASSIFIER");
    println!("{rule}");

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Run failed: {err}");
            println!("Error during execution: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), ScanError> {
    let path = config::config_path()?;
    let mut config = config::load_config_from(&path)?;
    config.validate()?;
    info!("Loaded settings from {}", path.display());

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();

    if config.input_path.is_none() {
        match prompt::ask_input_directory(&mut input, &mut out)? {
            Some(dir) => config.input_path = Some(dir),
            None => {
                println!("Operation cancelled.");
                return Ok(());
            }
        }
    }

    print_settings(&config)?;
    if !prompt::confirm(&mut input, &mut out, "\nProceed with the scan?")? {
        println!("Operation cancelled.");
        return Ok(());
    }
    println!("{}", "-".repeat(BANNER_WIDTH));

    let mut scan = Scan::begin(&config)?;
    if scan.is_empty() {
        return Ok(());
    }

    scan.note("Initializing NSFW classifier...")?;
    let classifier = NsfwClassifier::new()?;
    let summary = scan.run(&classifier)?;
    print_completion(&summary);
    Ok(())
}

fn print_settings(config: &ScanConfig) -> Result<(), ScanError> {
    println!();
    println!("Directory to analyze: {}", config.input_dir()?.display());
    println!("Batch size: {}", config.batch_size);
    println!("Unsafe threshold: {}", config.threshold);
    Ok(())
}

fn print_completion(summary: &ScanSummary) {
    let rule = "=".repeat(BANNER_WIDTH);
    println!();
    println!("{rule}");
    println!("SCAN COMPLETE!");
    println!("Results saved to: {}", summary.output.root.display());
    if let Some(log_file) = &summary.output.log_file {
        println!("Full log at: {}", log_file.display());
    }
    println!("{rule}");
}
