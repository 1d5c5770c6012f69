use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {source}")]
    Parse {
        #[source]
        source: toml::de::Error,
    },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("concurrency limit {value} exceeds the maximum of {max}")]
    ConcurrencyTooHigh { value: usize, max: usize },
    #[error("probe sender '{0}' is not an e-mail address")]
    InvalidSender(String),
}
