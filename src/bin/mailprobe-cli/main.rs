mod args;
mod input;
mod output;

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use args::{Cli, Commands};
use mailprobe_lib::{BatchResult, ClassificationRecord, Verifier};

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run(cli: &Cli) -> Result<BatchResult> {
    let config = cli.verifier_config()?;
    tracing::debug!(target: "mailprobe::config", ?config, "effective configuration");
    let verifier = Verifier::from_config(&config).context("initialise verifier")?;

    if let Some(Commands::Check { email }) = &cli.cmd {
        let status = verifier.classify_one(email);
        return Ok(BatchResult::new(vec![ClassificationRecord::new(
            email.as_str(),
            status,
        )]));
    }

    let addresses = input::read_addresses(cli)?;
    tracing::info!(target: "mailprobe::pipeline", "{} address(es) read", addresses.len());
    Ok(verifier.classify(addresses)?)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.cmd.is_none() && cli.input.is_none() && !cli.stdin {
        if let Err(err) = Cli::clap_command().print_help() {
            eprintln!("error: {err}");
            return ExitCode::from(1);
        }
        println!();
        return ExitCode::SUCCESS;
    }
    init_logging(&cli);

    let batch = match run(&cli) {
        Ok(batch) => batch,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::from(1);
        }
    };
    if let Err(err) = output::write_report(&batch, &cli) {
        eprintln!("error: {err:#}");
        return ExitCode::from(1);
    }

    // codes de sortie : 0 OK, 2 invalids, 1 fatal
    if batch.all_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}
