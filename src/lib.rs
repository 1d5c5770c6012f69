#![forbid(unsafe_code)]
//! mailprobe_lib: batch e-mail verification (syntax, MX, SMTP RCPT probe).
//!
//! ```no_run
//! use mailprobe_lib::{Verifier, VerifierConfig};
//!
//! let verifier = Verifier::from_config(&VerifierConfig::default())?;
//! let batch = verifier.classify(["user@example.com", "not-an-email"])?;
//! for record in &batch.results {
//!     println!("{} {}", record.email, record.status);
//! }
//! # Ok::<(), mailprobe_lib::BatchError>(())
//! ```

pub mod cancel;
pub mod config;
pub mod mx;
pub mod pipeline;
pub mod smtp;
pub mod syntax;

pub use cancel::CancelToken;
pub use config::{ConfigError, ConfigFile, VerifierConfig};
pub use mx::{
    Error as MxError, LookupHost, LookupMx, MxRecord, SystemResolver, resolve_mail_exchangers,
};
pub use pipeline::{BatchError, BatchResult, ClassificationRecord, Deduplicator, Status, Verifier};
pub use smtp::{
    MailboxProber, ProbeError, ProbeOptions, ProbeOutcome, ProbeReport, SmtpProber, SmtpReply,
};
pub use syntax::{is_syntactically_valid, normalize_address, split_domain};
