use std::time::Duration;

use crate::config::VerifierConfig;

/// Settings for [`SmtpProber`](super::SmtpProber).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    pub port: u16,
    pub helo_name: String,
    pub sender: String,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub probe_timeout: Duration,
    pub starttls: bool,
    pub accept_invalid_certificates: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self::from(&VerifierConfig::default())
    }
}

impl From<&VerifierConfig> for ProbeOptions {
    fn from(config: &VerifierConfig) -> Self {
        Self {
            port: config.port,
            helo_name: config.helo_name.clone(),
            sender: config.probe_sender_address.clone(),
            connect_timeout: config.connect_timeout,
            idle_timeout: config.idle_timeout,
            probe_timeout: config.probe_timeout,
            starttls: config.starttls,
            accept_invalid_certificates: config.accept_invalid_certificates,
        }
    }
}

impl ProbeOptions {
    pub fn mail_from_command(&self) -> String {
        if self.sender.is_empty() {
            "MAIL FROM:<>".to_string()
        } else {
            format!("MAIL FROM:<{}>", self.sender)
        }
    }

    pub fn helo_name(&self) -> &str {
        let name = self.helo_name.trim();
        if name.is_empty() { "localhost" } else { name }
    }
}
