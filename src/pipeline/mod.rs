//! Batch verification.
//!
//! Every address runs through four ordered stages and stops at the first
//! negative one: `dedup -> syntax -> domain -> smtp`. The first two stages
//! run on the calling thread in input order, so which occurrence of a
//! repeated address counts as the original never depends on scheduling. The
//! network stages fan out to a bounded worker pool and the records are put
//! back in input order before returning.

mod dedup;
mod error;
mod pool;
mod types;

pub use dedup::Deduplicator;
pub use error::BatchError;
pub use types::{BatchResult, ClassificationRecord, Status};

use std::sync::Arc;
use std::time::Instant;

use crate::cancel::CancelToken;
use crate::config::VerifierConfig;
use crate::mx::{LookupHost, LookupMx, SystemResolver, resolve_mail_exchangers};
use crate::smtp::{MailboxProber, ProbeOptions, SmtpProber};
use crate::syntax::{is_syntactically_valid, normalize_address, split_domain};

/// The verification pipeline, generic over its two network seams.
pub struct Verifier<R, P> {
    resolver: Arc<R>,
    prober: Arc<P>,
    concurrency: usize,
}

impl Verifier<SystemResolver, SmtpProber> {
    /// Pipeline backed by the platform resolver and the raw SMTP prober. The
    /// resolver also answers the prober's exchanger address lookups.
    pub fn from_config(config: &VerifierConfig) -> Result<Self, BatchError> {
        config.validate()?;
        let resolver = Arc::new(SystemResolver::new(config.dns_timeout)?);
        let hosts: Arc<dyn LookupHost> = resolver.clone();
        let prober = SmtpProber::new(ProbeOptions::from(config), hosts)?;
        Ok(Self::with_shared(
            resolver,
            Arc::new(prober),
            config.concurrency_limit,
        ))
    }
}

impl<R, P> Verifier<R, P>
where
    R: LookupMx + 'static,
    P: MailboxProber + 'static,
{
    pub fn new(resolver: R, prober: P, concurrency: usize) -> Self {
        Self::with_shared(Arc::new(resolver), Arc::new(prober), concurrency)
    }

    pub fn with_shared(resolver: Arc<R>, prober: Arc<P>, concurrency: usize) -> Self {
        Self {
            resolver,
            prober,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Classify `addresses`, one record per input, in input order.
    pub fn classify<I, S>(&self, addresses: I) -> Result<BatchResult, BatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classify_with_cancel(addresses, &CancelToken::new())
    }

    /// Like [`classify`](Self::classify); cancelling `cancel` from another
    /// thread abandons in-flight probes and yields [`BatchError::Cancelled`].
    pub fn classify_with_cancel<I, S>(
        &self,
        addresses: I,
        cancel: &CancelToken,
    ) -> Result<BatchResult, BatchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let started = Instant::now();
        let dedup = Deduplicator::new();
        let mut slots: Vec<Slot> = Vec::new();
        let mut pending = Vec::new();

        for (index, email) in addresses.into_iter().map(Into::into).enumerate() {
            let normalized = normalize_address(&email);
            let screened = if dedup.check_and_mark(&normalized) {
                Some(Status::Duplicate)
            } else if !is_syntactically_valid(&normalized) {
                Some(Status::InvalidEmail)
            } else {
                None
            };
            match screened {
                Some(status) => {
                    tracing::debug!(target: "mailprobe::pipeline", "#{index} {email:?}: {status}");
                    slots.push(Slot::Done(ClassificationRecord::new(email, status)));
                }
                None => {
                    slots.push(Slot::Waiting(email.clone()));
                    pending.push((index, (email, normalized)));
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(BatchError::Cancelled);
        }

        let resolver = Arc::clone(&self.resolver);
        let prober = Arc::clone(&self.prober);
        let worker_cancel = cancel.clone();
        let outputs = pool::run(
            pending,
            self.concurrency,
            cancel,
            move |(email, normalized): (String, String)| {
                let status = verify_screened(&*resolver, &*prober, &normalized, &worker_cancel);
                ClassificationRecord::new(email, status)
            },
        )?;

        for (index, record) in outputs {
            tracing::debug!(target: "mailprobe::pipeline", "#{index} {:?}: {}", record.email, record.status);
            slots[index] = Slot::Done(record);
        }

        let results: Vec<ClassificationRecord> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Slot::Done(record) => record,
                Slot::Waiting(email) => {
                    tracing::error!(target: "mailprobe::pipeline", "#{index} {email:?}: worker lost, reporting invalid_smtp");
                    ClassificationRecord::new(email, Status::InvalidSmtp)
                }
            })
            .collect();

        let batch = BatchResult::new(results);
        tracing::info!(target: "mailprobe::pipeline",
            "classified {} address(es) in {:?}: {:?}",
            batch.total,
            started.elapsed(),
            batch.summary()
        );
        Ok(batch)
    }

    /// Syntax, domain and SMTP stages for a single address.
    pub fn classify_one(&self, address: &str) -> Status {
        let normalized = normalize_address(address);
        if !is_syntactically_valid(&normalized) {
            return Status::InvalidEmail;
        }
        verify_screened(&*self.resolver, &*self.prober, &normalized, &CancelToken::new())
    }
}

enum Slot {
    Done(ClassificationRecord),
    Waiting(String),
}

/// Domain and SMTP stages for an address that already passed dedup and
/// syntax screening.
fn verify_screened<R, P>(resolver: &R, prober: &P, normalized: &str, cancel: &CancelToken) -> Status
where
    R: LookupMx + ?Sized,
    P: MailboxProber + ?Sized,
{
    let Some(domain) = split_domain(normalized) else {
        return Status::InvalidEmail;
    };
    let exchangers = resolve_mail_exchangers(resolver, domain);
    if exchangers.is_empty() {
        return Status::InvalidDomain;
    }
    let report = prober.probe(normalized, &exchangers, cancel);
    tracing::debug!(target: "mailprobe::pipeline",
        "<{normalized}> {} via {}: {}",
        report.outcome,
        report.exchange.as_deref().unwrap_or("-"),
        report.detail
    );
    Status::from(report.outcome)
}

#[cfg(test)]
mod tests;
