use thiserror::Error;

/// Failure inside one probe dialogue. Never leaves the prober: every variant
/// is reported as `invalid_smtp`.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no socket address for {host}")]
    NoSocketAddress { host: String },
    #[error("address lookup for {host} failed: {source}")]
    HostLookup {
        host: String,
        #[source]
        source: crate::mx::Error,
    },
    #[error("connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
    },
    #[error("TLS setup failed: {source}")]
    Tls {
        #[source]
        source: native_tls::Error,
    },
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("probe deadline exceeded")]
    DeadlineExceeded,
    #[error("probe cancelled")]
    Cancelled,
}

impl ProbeError {
    pub(crate) fn io(source: std::io::Error) -> Self {
        Self::Io { source }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}
