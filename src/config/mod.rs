//! Runtime configuration of the verifier and its TOML file layer.

mod error;
mod file;

pub use error::ConfigError;
pub use file::ConfigFile;

use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SENDER: &str = "noreply@test.com";
pub const DEFAULT_CONCURRENCY: usize = 8;
pub const MAX_CONCURRENCY: usize = 256;

/// Settings shared by the resolver, the prober and the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Envelope sender used in `MAIL FROM`.
    pub probe_sender_address: String,
    pub helo_name: String,
    pub port: u16,
    pub connect_timeout: Duration,
    /// Per-read/per-write socket timeout.
    pub idle_timeout: Duration,
    /// Hard cap on one whole SMTP dialogue.
    pub probe_timeout: Duration,
    pub dns_timeout: Duration,
    pub concurrency_limit: usize,
    pub starttls: bool,
    pub accept_invalid_certificates: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            probe_sender_address: DEFAULT_SENDER.to_string(),
            helo_name: "localhost".to_string(),
            port: 25,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(30),
            dns_timeout: Duration::from_secs(5),
            concurrency_limit: DEFAULT_CONCURRENCY,
            starttls: true,
            accept_invalid_certificates: true,
        }
    }
}

impl VerifierConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(target: "mailprobe::config", "loaded {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(raw).map_err(|source| ConfigError::Parse { source })?;
        let mut config = Self::default();
        config.apply_file(&file);
        config.validate()?;
        Ok(config)
    }

    /// Overlay every key present in `file` onto `self`.
    pub fn apply_file(&mut self, file: &ConfigFile) {
        let smtp = &file.smtp;
        if let Some(sender) = &smtp.sender {
            self.probe_sender_address = sender.trim().to_string();
        }
        if let Some(helo) = &smtp.helo_name {
            self.helo_name = helo.trim().to_string();
        }
        if let Some(port) = smtp.port {
            self.port = port;
        }
        if let Some(ms) = smtp.connect_timeout_ms {
            self.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = smtp.idle_timeout_ms {
            self.idle_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = smtp.probe_timeout_ms {
            self.probe_timeout = Duration::from_millis(ms);
        }
        if let Some(starttls) = smtp.starttls {
            self.starttls = starttls;
        }
        if let Some(accept) = smtp.accept_invalid_certificates {
            self.accept_invalid_certificates = accept;
        }
        if let Some(ms) = file.dns.timeout_ms {
            self.dns_timeout = Duration::from_millis(ms);
        }
        if let Some(concurrency) = file.pipeline.concurrency {
            self.concurrency_limit = concurrency;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeouts = [
            ("connect_timeout", self.connect_timeout),
            ("idle_timeout", self.idle_timeout),
            ("probe_timeout", self.probe_timeout),
            ("dns_timeout", self.dns_timeout),
        ];
        if let Some((field, _)) = timeouts.iter().find(|(_, value)| value.is_zero()) {
            return Err(ConfigError::Zero { field: *field });
        }
        if self.port == 0 {
            return Err(ConfigError::Zero { field: "port" });
        }
        if self.concurrency_limit == 0 {
            return Err(ConfigError::Zero {
                field: "concurrency_limit",
            });
        }
        if self.concurrency_limit > MAX_CONCURRENCY {
            return Err(ConfigError::ConcurrencyTooHigh {
                value: self.concurrency_limit,
                max: MAX_CONCURRENCY,
            });
        }
        let sender = &self.probe_sender_address;
        if !sender.is_empty() && !sender.contains('@') {
            return Err(ConfigError::InvalidSender(sender.clone()));
        }
        Ok(())
    }
}
