use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use native_tls::TlsConnector;

use super::error::ProbeError;
use super::options::ProbeOptions;
use super::session::SmtpSession;
use super::types::{ProbeOutcome, ProbeReport, SmtpReply};
use crate::cancel::CancelToken;
use crate::mx::{LookupHost, MxRecord};

/// Tests whether a mailbox is accepted by its domain's mail exchanger.
pub trait MailboxProber: Send + Sync {
    /// Never fails: every problem is reported as
    /// [`ProbeOutcome::InvalidSmtp`] inside the report.
    fn probe(&self, email: &str, exchangers: &[MxRecord], cancel: &CancelToken) -> ProbeReport;
}

/// Raw-protocol prober: greeting, EHLO/HELO, optional STARTTLS, MAIL FROM,
/// RCPT TO, QUIT. No message body is ever sent.
///
/// Exchanger names are resolved through `hosts`, inside the probe deadline.
#[derive(Clone)]
pub struct SmtpProber {
    options: ProbeOptions,
    connector: Option<TlsConnector>,
    hosts: Arc<dyn LookupHost>,
}

impl SmtpProber {
    pub fn new(options: ProbeOptions, hosts: Arc<dyn LookupHost>) -> Result<Self, ProbeError> {
        let connector = if options.starttls {
            let connector = TlsConnector::builder()
                .danger_accept_invalid_certs(options.accept_invalid_certificates)
                .danger_accept_invalid_hostnames(options.accept_invalid_certificates)
                .build()
                .map_err(|source| ProbeError::Tls { source })?;
            Some(connector)
        } else {
            None
        };
        Ok(Self {
            options,
            connector,
            hosts,
        })
    }

    fn dialogue(
        &self,
        email: &str,
        host: &str,
        cancel: &CancelToken,
    ) -> Result<ProbeReport, ProbeError> {
        if cancel.is_cancelled() {
            return Err(ProbeError::Cancelled);
        }
        let exchange = Some(host.to_string());
        let deadline = Instant::now() + self.options.probe_timeout;
        let addrs = self.socket_addrs(host, deadline)?;
        let mut session = SmtpSession::connect(host, &addrs, &self.options, deadline, cancel)?;

        let banner = session.read_reply()?;
        if !banner.is_positive_completion() {
            session.quit();
            let detail = format!("greeting refused: {banner}");
            return Ok(ProbeReport::new(ProbeOutcome::InvalidSmtp, exchange, Some(banner), detail));
        }

        let hello = match self.greet(&mut session)? {
            Ok(reply) => reply,
            Err(refusal) => {
                session.quit();
                let detail = format!("EHLO/HELO refused: {refusal}");
                return Ok(ProbeReport::new(ProbeOutcome::InvalidSmtp, exchange, Some(refusal), detail));
            }
        };

        if hello.has_capability("STARTTLS") {
            if let Some(connector) = &self.connector {
                let reply = session.starttls(connector)?;
                if reply.is_positive_completion() {
                    if let Err(refusal) = self.greet(&mut session)? {
                        session.quit();
                        let detail = format!("EHLO refused after STARTTLS: {refusal}");
                        return Ok(ProbeReport::new(ProbeOutcome::InvalidSmtp, exchange, Some(refusal), detail));
                    }
                }
            }
        }

        let mail_reply = session.command(&self.options.mail_from_command())?;
        if !mail_reply.is_positive_completion() {
            session.quit();
            let detail = format!("MAIL FROM refused: {mail_reply}");
            return Ok(ProbeReport::new(ProbeOutcome::InvalidSmtp, exchange, Some(mail_reply), detail));
        }

        let rcpt_reply = session.command(&format!("RCPT TO:<{email}>"))?;
        session.quit();

        let outcome = classify_recipient(&rcpt_reply);
        tracing::debug!(target: "mailprobe::smtp",
            "<{email}> via {host}: {outcome} ({} transcript lines)",
            session.transcript().len()
        );
        let detail = format!("RCPT TO answered {rcpt_reply}");
        Ok(ProbeReport::new(outcome, exchange, Some(rcpt_reply), detail))
    }

    fn socket_addrs(&self, host: &str, deadline: Instant) -> Result<Vec<SocketAddr>, ProbeError> {
        let port = self.options.port;
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, port)]);
        }
        let budget = deadline
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
            .ok_or(ProbeError::DeadlineExceeded)?;
        let ips = self
            .hosts
            .lookup_host(host, budget)
            .map_err(|source| ProbeError::HostLookup {
                host: host.to_string(),
                source,
            })?;
        if ips.is_empty() {
            return Err(ProbeError::NoSocketAddress {
                host: host.to_string(),
            });
        }
        Ok(ips.into_iter().map(|ip| SocketAddr::new(ip, port)).collect())
    }

    /// EHLO, falling back to HELO when the server does not speak ESMTP.
    /// The inner `Err` carries the final refusal.
    fn greet(&self, session: &mut SmtpSession) -> Result<Result<SmtpReply, SmtpReply>, ProbeError> {
        let name = self.options.helo_name();
        let ehlo = session.command(&format!("EHLO {name}"))?;
        if ehlo.is_positive_completion() {
            return Ok(Ok(ehlo));
        }
        if !ehlo.is_permanent_failure() {
            return Ok(Err(ehlo));
        }
        let helo = session.command(&format!("HELO {name}"))?;
        if helo.is_positive_completion() {
            Ok(Ok(helo))
        } else {
            Ok(Err(helo))
        }
    }
}

impl fmt::Debug for SmtpProber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpProber")
            .field("options", &self.options)
            .field("starttls", &self.connector.is_some())
            .finish_non_exhaustive()
    }
}

impl MailboxProber for SmtpProber {
    fn probe(&self, email: &str, exchangers: &[MxRecord], cancel: &CancelToken) -> ProbeReport {
        let Some(exchanger) = select_exchanger(exchangers) else {
            return ProbeReport::invalid_smtp(None, "no mail exchanger available");
        };
        let host = exchanger.exchange.as_str();

        match self.dialogue(email, host, cancel) {
            Ok(report) => report,
            Err(err) => {
                tracing::debug!(target: "mailprobe::smtp", "<{email}> via {host}: {err}");
                ProbeReport::invalid_smtp(Some(host.to_string()), err.to_string())
            }
        }
    }
}

/// Lowest preference wins; the first of equal preferences is kept.
pub(crate) fn select_exchanger(exchangers: &[MxRecord]) -> Option<&MxRecord> {
    exchangers.iter().min_by_key(|record| record.preference)
}

/// Map the RCPT TO reply onto the three probe outcomes.
pub(crate) fn classify_recipient(reply: &SmtpReply) -> ProbeOutcome {
    if reply.is_positive_completion() {
        return ProbeOutcome::Valid;
    }
    if reply.is_permanent_failure() && is_mailbox_rejection(reply) {
        return ProbeOutcome::RejectedEmail;
    }
    ProbeOutcome::InvalidSmtp
}

// 5.1.x is the addressing class, 5.2.1 a disabled mailbox; other 5xx
// (policy, relaying, blocklists) say nothing about the recipient.
fn is_mailbox_rejection(reply: &SmtpReply) -> bool {
    match reply.enhanced_status() {
        Some(status) => status.starts_with("5.1.") || status == "5.2.1",
        None => matches!(reply.code, 550 | 551 | 553),
    }
}
