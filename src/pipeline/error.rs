use thiserror::Error;

use crate::config::ConfigError;
use crate::mx::Error as MxError;
use crate::smtp::ProbeError;

/// Failures of a whole batch. Problems with a single address never surface
/// here; they become that address's status.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch cancelled")]
    Cancelled,
    #[error("failed to spawn worker thread: {source}")]
    WorkerSpawn {
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resolver(#[from] MxError),
    #[error(transparent)]
    Prober(#[from] ProbeError),
}
