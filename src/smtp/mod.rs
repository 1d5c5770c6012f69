//! SMTP handshake probing.
//!
//! [`SmtpProber`] opens one connection to the best exchanger of a domain, runs
//! a minimal dialogue up to `RCPT TO` and classifies the answer into a
//! [`ProbeOutcome`]. No message is ever transmitted.

mod error;
mod options;
mod probe;
mod session;
mod types;

pub use error::ProbeError;
pub use options::ProbeOptions;
pub use probe::{MailboxProber, SmtpProber};
pub use types::{ProbeOutcome, ProbeReport, SmtpReply};
