use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mailprobe_lib::VerifierConfig;

#[derive(Parser)]
#[command(name = "mailprobe-cli", version, about = "Verify a batch of e-mail addresses without sending mail")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Option<Commands>,

    /// input file, CSV (first column) or one address per line
    pub input: Option<PathBuf>,

    /// read addresses from stdin instead of a file
    #[arg(long)]
    pub stdin: bool,

    /// input format: auto|csv|lines (auto picks csv for *.csv files)
    #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
    pub input_format: InputFormat,

    /// the first CSV row is data, not a header
    #[arg(long)]
    pub no_header: bool,

    /// output format: human|json|ndjson|csv
    #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// write the report to a file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, env = "MAILPROBE_CONFIG")]
    pub config: Option<PathBuf>,

    /// envelope sender used in MAIL FROM
    #[arg(long, env = "MAILPROBE_SENDER")]
    pub sender: Option<String>,

    /// name announced in EHLO/HELO
    #[arg(long, env = "MAILPROBE_HELO")]
    pub helo: Option<String>,

    /// SMTP port of the exchangers
    #[arg(long, env = "MAILPROBE_PORT")]
    pub port: Option<u16>,

    /// TCP connect timeout (ms)
    #[arg(long = "connect-timeout", env = "MAILPROBE_CONNECT_TIMEOUT_MS")]
    pub connect_timeout_ms: Option<u64>,

    /// per-read/per-write socket timeout (ms)
    #[arg(long = "idle-timeout", env = "MAILPROBE_IDLE_TIMEOUT_MS")]
    pub idle_timeout_ms: Option<u64>,

    /// cap on one whole SMTP dialogue (ms)
    #[arg(long = "probe-timeout", env = "MAILPROBE_PROBE_TIMEOUT_MS")]
    pub probe_timeout_ms: Option<u64>,

    /// DNS query timeout (ms)
    #[arg(long = "dns-timeout", env = "MAILPROBE_DNS_TIMEOUT_MS")]
    pub dns_timeout_ms: Option<u64>,

    /// number of concurrent probes
    #[arg(short = 'j', long, env = "MAILPROBE_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// never attempt STARTTLS
    #[arg(long)]
    pub no_starttls: bool,

    /// reject invalid TLS certificates during STARTTLS
    #[arg(long)]
    pub strict_tls: bool,

    /// -v info, -vv debug, -vvv SMTP transcripts
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// classify a single address
    Check { email: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    Auto,
    Csv,
    Lines,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Ndjson,
    Csv,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn clap_command() -> clap::Command {
        <Self as clap::CommandFactory>::command()
    }

    /// Defaults, then the config file, then flags and environment.
    pub fn verifier_config(&self) -> Result<VerifierConfig> {
        let mut config = match &self.config {
            Some(path) => VerifierConfig::from_file(path)
                .with_context(|| format!("load config {}", path.display()))?,
            None => VerifierConfig::default(),
        };

        if let Some(sender) = &self.sender {
            config.probe_sender_address = sender.clone();
        }
        if let Some(helo) = &self.helo {
            config.helo_name = helo.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.idle_timeout_ms {
            config.idle_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.probe_timeout_ms {
            config.probe_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.dns_timeout_ms {
            config.dns_timeout = Duration::from_millis(ms);
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency_limit = concurrency;
        }
        if self.no_starttls {
            config.starttls = false;
        }
        if self.strict_tls {
            config.accept_invalid_certificates = false;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "mailprobe=info,warn",
            2 => "mailprobe=debug,info",
            _ => "mailprobe=trace,info",
        }
    }
}
