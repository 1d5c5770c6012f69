//! Structure mirroring the TOML configuration file.
//!
//! ```toml
//! [smtp]
//! sender = "probe@example.org"
//! connect_timeout_ms = 5000
//! idle_timeout_ms = 5000
//!
//! [dns]
//! timeout_ms = 3000
//!
//! [pipeline]
//! concurrency = 16
//! ```

use serde::Deserialize;

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub(crate) smtp: SmtpSection,
    #[serde(default)]
    pub(crate) dns: DnsSection,
    #[serde(default)]
    pub(crate) pipeline: PipelineSection,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct SmtpSection {
    pub(crate) sender: Option<String>,
    pub(crate) helo_name: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) connect_timeout_ms: Option<u64>,
    pub(crate) idle_timeout_ms: Option<u64>,
    pub(crate) probe_timeout_ms: Option<u64>,
    pub(crate) starttls: Option<bool>,
    pub(crate) accept_invalid_certificates: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct DnsSection {
    pub(crate) timeout_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct PipelineSection {
    pub(crate) concurrency: Option<usize>,
}
