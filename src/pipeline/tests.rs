use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;
use crate::mx::MxRecord;
use crate::mx::tests::StubResolver;
use crate::smtp::{ProbeOutcome, ProbeReport};

type ProbeFn = dyn Fn(&str, &[MxRecord]) -> ProbeOutcome + Send + Sync;

struct StubProber {
    on_probe: Box<ProbeFn>,
    calls: AtomicUsize,
}

impl StubProber {
    fn new<F>(f: F) -> Self
    where
        F: Fn(&str, &[MxRecord]) -> ProbeOutcome + Send + Sync + 'static,
    {
        Self {
            on_probe: Box::new(f),
            calls: AtomicUsize::new(0),
        }
    }
}

impl MailboxProber for StubProber {
    fn probe(&self, email: &str, exchangers: &[MxRecord], _cancel: &CancelToken) -> ProbeReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = (self.on_probe)(email, exchangers);
        ProbeReport::new(outcome, exchangers.first().map(|r| r.exchange.clone()), None, "stub")
    }
}

fn mx_for_good_domains() -> StubResolver {
    StubResolver::new(|domain| match domain {
        "good.com" => Ok(vec![MxRecord::new(20, "mx2.good.com"), MxRecord::new(10, "mx1.good.com")]),
        _ => Ok(Vec::new()),
    })
}

fn statuses(batch: &BatchResult) -> Vec<Status> {
    batch.results.iter().map(|r| r.status).collect()
}

#[test]
fn end_to_end_scenario_without_mx() {
    let verifier = Verifier::new(
        StubResolver::new(|_| Ok(Vec::new())),
        StubProber::new(|_, _| panic!("no probe expected")),
        4,
    );
    let batch = verifier
        .classify(["a@x.com", "A@X.COM", "bad-email", "a@x.com"])
        .expect("batch");

    assert_eq!(batch.total, 4);
    let rows: Vec<(&str, Status)> = batch.results.iter().map(|r| (r.email.as_str(), r.status)).collect();
    assert_eq!(
        rows,
        [
            ("a@x.com", Status::InvalidDomain),
            ("A@X.COM", Status::Duplicate),
            ("bad-email", Status::InvalidEmail),
            ("a@x.com", Status::Duplicate),
        ]
    );
}

#[test]
fn stages_short_circuit() {
    let resolver = Arc::new(mx_for_good_domains());
    let prober = Arc::new(StubProber::new(|_, _| ProbeOutcome::Valid));
    let verifier = Verifier::with_shared(Arc::clone(&resolver), Arc::clone(&prober), 2);

    let batch = verifier
        .classify(["not-an-email", "user@", "x@nomx.com", "ok@good.com", "OK@good.com"])
        .expect("batch");

    assert_eq!(
        statuses(&batch),
        [
            Status::InvalidEmail,
            Status::InvalidEmail,
            Status::InvalidDomain,
            Status::Valid,
            Status::Duplicate,
        ]
    );
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    assert_eq!(prober.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn duplicate_follows_any_first_status() {
    let verifier = Verifier::new(
        mx_for_good_domains(),
        StubProber::new(|email, _| {
            if email.starts_with("gone") {
                ProbeOutcome::RejectedEmail
            } else {
                ProbeOutcome::InvalidSmtp
            }
        }),
        3,
    );
    let batch = verifier
        .classify([
            "gone@good.com",
            "gone@good.com",
            "flaky@good.com",
            "FLAKY@good.com",
            "junk",
            "junk",
        ])
        .expect("batch");
    assert_eq!(
        statuses(&batch),
        [
            Status::RejectedEmail,
            Status::Duplicate,
            Status::InvalidSmtp,
            Status::Duplicate,
            Status::InvalidEmail,
            Status::Duplicate,
        ]
    );
}

#[test]
fn prober_sees_normalized_address_and_ordered_exchangers() {
    let verifier = Verifier::new(
        mx_for_good_domains(),
        StubProber::new(|email, exchangers| {
            assert_eq!(email, "mixed.case@good.com");
            assert_eq!(exchangers[0].exchange, "mx1.good.com");
            assert_eq!(exchangers[1].exchange, "mx2.good.com");
            ProbeOutcome::Valid
        }),
        1,
    );
    let batch = verifier.classify(["\u{FEFF} Mixed.Case@GOOD.com "]).expect("batch");
    assert_eq!(batch.results[0].status, Status::Valid);
    assert_eq!(batch.results[0].email, "\u{FEFF} Mixed.Case@GOOD.com ");
}

#[test]
fn empty_batch() {
    let verifier = Verifier::new(mx_for_good_domains(), StubProber::new(|_, _| ProbeOutcome::Valid), 4);
    let batch = verifier.classify(Vec::<String>::new()).expect("batch");
    assert_eq!(batch.total, 0);
    assert!(batch.results.is_empty());
}

#[test]
fn cancelled_batch_is_discarded() {
    let verifier = Verifier::new(mx_for_good_domains(), StubProber::new(|_, _| ProbeOutcome::Valid), 4);
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = verifier
        .classify_with_cancel(["a@good.com"], &cancel)
        .expect_err("cancelled");
    assert!(matches!(err, BatchError::Cancelled));
}

#[test]
fn cancel_mid_batch_returns_promptly() {
    let verifier = Verifier::new(
        mx_for_good_domains(),
        StubProber::new(|_, _| {
            std::thread::sleep(Duration::from_secs(2));
            ProbeOutcome::Valid
        }),
        2,
    );
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        trigger.cancel();
    });
    let started = std::time::Instant::now();
    let result = verifier.classify_with_cancel(["a@good.com", "b@good.com", "c@good.com"], &cancel);
    assert!(matches!(result, Err(BatchError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn panicking_prober_still_yields_a_record() {
    let verifier = Verifier::new(
        mx_for_good_domains(),
        StubProber::new(|email, _| {
            if email.starts_with("boom") {
                panic!("prober bug");
            }
            ProbeOutcome::Valid
        }),
        2,
    );
    let batch = verifier
        .classify(["a@good.com", "boom@good.com", "c@good.com"])
        .expect("batch");
    assert_eq!(statuses(&batch), [Status::Valid, Status::InvalidSmtp, Status::Valid]);
    assert_eq!(batch.results[1].email, "boom@good.com");
}

#[test]
fn classify_one_runs_without_dedup() {
    let verifier = Verifier::new(mx_for_good_domains(), StubProber::new(|_, _| ProbeOutcome::Valid), 1);
    assert_eq!(verifier.classify_one("who@good.com"), Status::Valid);
    assert_eq!(verifier.classify_one("who@good.com"), Status::Valid);
    assert_eq!(verifier.classify_one("who@nomx.com"), Status::InvalidDomain);
    assert_eq!(verifier.classify_one("who"), Status::InvalidEmail);
}

#[test]
fn concurrency_is_clamped_to_one() {
    let verifier = Verifier::new(mx_for_good_domains(), StubProber::new(|_, _| ProbeOutcome::Valid), 0);
    assert_eq!(verifier.concurrency(), 1);
}
