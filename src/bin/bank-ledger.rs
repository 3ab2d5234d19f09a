use std::fs::File;

use anyhow::{Context, Result};
use bank_ledger::{bin_utils::{Service, ServiceError}, config::EngineConfig, coordinator::ErrorKind};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let filename = args
        .next()
        .context("Expected an operations file name as the first argument")?;
    let config = match args.next() {
        Some(path) => EngineConfig::from_json_file(&path)?,
        None => EngineConfig::default(),
    };
    let file = File::open(&filename).with_context(|| format!("Failed to open `{filename}`"))?;

    let service = Service {
        input: file,
        output: &mut std::io::stdout(),
        config,
        error_printer: Box::new(|line, err| match err {
            ServiceError::TransactionErr(err) if err.kind() == ErrorKind::StorageFailure => {
                eprintln!("Error at line {line}: {err} (needs manual reconciliation)")
            }
            err => eprintln!("Error at line {line}: {err}"),
        }),
    };
    service.run()
}
