use std::fmt;

use serde::{Deserialize, Serialize};

/// A raw SMTP reply: the three-digit code and the text of every line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_transient_failure(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }

    pub fn has_capability(&self, cap: &str) -> bool {
        self.lines.iter().any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|token| token.eq_ignore_ascii_case(cap))
        })
    }

    /// RFC 3463 enhanced status code (`5.1.1`) leading the first line, if any.
    pub fn enhanced_status(&self) -> Option<&str> {
        let token = self.lines.first()?.split_whitespace().next()?;
        let mut parts = token.split('.');
        let class = parts.next()?;
        let subject = parts.next()?;
        let detail = parts.next()?;
        let well_formed = parts.next().is_none()
            && matches!(class, "2" | "4" | "5")
            && [subject, detail]
                .iter()
                .all(|p| (1..=3).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_digit()));
        well_formed.then_some(token)
    }

    pub fn message(&self) -> String {
        self.lines.join(" ")
    }
}

impl fmt::Display for SmtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message())
    }
}

/// Result of one probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// RCPT TO was accepted.
    Valid,
    /// The server permanently refused the mailbox itself.
    RejectedEmail,
    /// Anything else: unreachable server, protocol trouble, timeouts, TLS
    /// errors, transient or policy refusals.
    InvalidSmtp,
}

impl ProbeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::RejectedEmail => "rejected_email",
            Self::InvalidSmtp => "invalid_smtp",
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a probe together with the evidence that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub outcome: ProbeOutcome,
    /// Exchanger that was contacted.
    pub exchange: Option<String>,
    /// Reply to RCPT TO, or to the command that ended the dialogue early.
    pub reply: Option<SmtpReply>,
    pub detail: String,
}

impl ProbeReport {
    pub fn new(
        outcome: ProbeOutcome,
        exchange: Option<String>,
        reply: Option<SmtpReply>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            outcome,
            exchange,
            reply,
            detail: detail.into(),
        }
    }

    pub fn invalid_smtp(exchange: Option<String>, detail: impl Into<String>) -> Self {
        Self::new(ProbeOutcome::InvalidSmtp, exchange, None, detail)
    }
}
