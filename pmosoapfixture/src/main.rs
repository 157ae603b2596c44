use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use pmosoapconfig::Config;
use pmosoapfixture::logs::{LoggingOptions, init_logging};
use pmosoapfixture::{SoapFixture, load_script, run_script};
use tracing::info;

fn usage() -> String {
    format!("Usage: {} <script> [config-dir]", env!("CARGO_PKG_NAME"))
}

fn run() -> Result<bool> {
    let mut args = std::env::args().skip(1);
    let Some(script) = args.next() else {
        bail!(usage());
    };
    let config_dir = args.next().unwrap_or_default();
    if args.next().is_some() {
        bail!(usage());
    }

    let config = Config::load_config(&config_dir).context("Failed to load configuration")?;
    init_logging(&LoggingOptions::from_config(&config));

    let script = PathBuf::from(script);
    let rows = load_script(&script)?;
    info!(script = %script.display(), rows = rows.len(), "Running script");

    let mut fixture = SoapFixture::from_config(&config);
    let report = run_script(&mut fixture, &rows);

    for result in &report.results {
        println!("{}", result);
    }
    println!("{}", report.summary());

    Ok(report.is_success())
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("{:#}", err);
            ExitCode::from(2)
        }
    }
}
