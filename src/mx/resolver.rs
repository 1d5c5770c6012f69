use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::system_conf::read_system_conf;

use super::{Error, MxRecord};

/// Source of MX records. Implementations must be shareable across the
/// pipeline's worker threads.
pub trait LookupMx: Send + Sync {
    /// Raw MX answer for `domain`, in resolver order. An authoritative "no
    /// records" answer is `Ok(vec![])`, not an error.
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, Error>;
}

/// Address records of an exchanger host, for the SMTP connect.
pub trait LookupHost: Send + Sync {
    /// A and AAAA answer for `host`, waiting at most `budget`.
    fn lookup_host(&self, host: &str, budget: Duration) -> Result<Vec<IpAddr>, Error>;
}

/// Platform resolver (`/etc/resolv.conf` or the OS equivalent) with a bounded
/// per-query timeout and no retries.
///
/// The async resolver is driven by a private runtime so that blocking worker
/// threads can issue lookups concurrently through `block_on`.
pub struct SystemResolver {
    runtime: Runtime,
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl SystemResolver {
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let (config, mut opts) =
            read_system_conf().map_err(Error::resolver_init)?;
        opts.timeout = timeout;
        opts.attempts = 1;

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("mailprobe-dns")
            .enable_all()
            .build()
            .map_err(Error::runtime)?;
        let resolver = {
            let _guard = runtime.enter();
            TokioAsyncResolver::tokio(config, opts)
        };

        Ok(Self {
            runtime,
            resolver,
            timeout,
        })
    }
}

impl std::fmt::Debug for SystemResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemResolver")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl LookupMx for SystemResolver {
    fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, Error> {
        let timeout = self.timeout;
        let answer = self.runtime.block_on(async {
            tokio::time::timeout(timeout, self.resolver.mx_lookup(domain)).await
        });

        match answer {
            Err(_elapsed) => Err(Error::Timeout {
                domain: domain.to_string(),
                timeout,
            }),
            Ok(Ok(lookup)) => Ok(lookup
                .iter()
                .map(|mx| MxRecord::new(mx.preference(), normalize_exchange(&mx.exchange().to_utf8())))
                .collect()),
            Ok(Err(err)) => match err.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(Vec::new()),
                _ => Err(Error::lookup(err)),
            },
        }
    }
}

impl LookupHost for SystemResolver {
    fn lookup_host(&self, host: &str, budget: Duration) -> Result<Vec<IpAddr>, Error> {
        let timeout = budget.min(self.timeout);
        // exchanger names are absolute, keep search domains out of it
        let name = if host.ends_with('.') {
            host.to_string()
        } else {
            format!("{host}.")
        };
        let answer = self.runtime.block_on(async {
            tokio::time::timeout(timeout, self.resolver.lookup_ip(name.as_str())).await
        });

        match answer {
            Err(_elapsed) => Err(Error::Timeout {
                domain: host.to_string(),
                timeout,
            }),
            Ok(Ok(lookup)) => Ok(lookup.iter().collect()),
            Ok(Err(err)) => match err.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(Vec::new()),
                _ => Err(Error::lookup(err)),
            },
        }
    }
}

/// Resolve the ordered exchange set of `domain`.
///
/// Records are sorted by ascending preference; equal preferences keep the
/// resolver's order. Any failure is logged and reported as an empty set.
pub fn resolve_mail_exchangers<R>(resolver: &R, domain: &str) -> Vec<MxRecord>
where
    R: LookupMx + ?Sized,
{
    let domain = match normalize_domain(domain) {
        Ok(domain) => domain,
        Err(err) => {
            tracing::debug!(target: "mailprobe::mx", "skipping MX lookup: {err}");
            return Vec::new();
        }
    };

    match resolver.lookup_mx(&domain) {
        Ok(records) => {
            let ordered = order_exchangers(records);
            tracing::debug!(target: "mailprobe::mx",
                "{domain}: {} exchanger(s) {:?}",
                ordered.len(),
                ordered.iter().map(|r| r.exchange.as_str()).collect::<Vec<_>>()
            );
            ordered
        }
        Err(err) => {
            tracing::warn!(target: "mailprobe::mx", "{domain}: {err}");
            Vec::new()
        }
    }
}

pub(crate) fn order_exchangers(records: Vec<MxRecord>) -> Vec<MxRecord> {
    let mut seen = HashSet::new();
    let mut ordered: Vec<MxRecord> = records
        .into_iter()
        .filter(|record| !record.exchange.is_empty())
        .filter(|record| seen.insert(record.clone()))
        .collect();
    ordered.sort_by_key(|record| record.preference);
    ordered
}

pub(crate) fn normalize_domain(domain: &str) -> Result<String, Error> {
    let trimmed = domain.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(Error::EmptyDomain);
    }
    Ok(trimmed.to_ascii_lowercase())
}

pub(crate) fn normalize_exchange(exchange: &str) -> String {
    exchange.trim_end_matches('.').to_ascii_lowercase()
}
