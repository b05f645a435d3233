//! Domain name resolution with a memoizing, concurrency-bounded cache.
//!
//! Each distinct domain is looked up at most once. Lookups fan out over a
//! bounded number of workers, each bounded by its own timeout. A failed or
//! timed-out lookup becomes the `"N/A"` sentinel and never fails the run.

use futures::stream::{self, StreamExt};
use hickory_resolver::config::{LookupIpStrategy, NameServerConfig, Protocol, ResolverConfig as HickoryConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::error::ResolutionError;
use crate::row::Row;

/// Placeholder for a failed or skipped lookup
pub const RESOLUTION_SENTINEL: &str = "N/A";

/// Anything that can turn a host name into an address
pub trait NameResolver {
    fn resolve(&self, domain: &str) -> impl Future<Output = Result<IpAddr, ResolutionError>> + Send;
}

/// hickory-resolver backed lookups (IPv4 preferred, single attempt)
pub struct HickoryResolver {
    inner: TokioAsyncResolver,
}

impl HickoryResolver {
    /// Build from configuration; an empty nameserver list means the system configuration
    pub fn from_config(config: &ResolverConfig) -> Self {
        let (resolver_config, mut opts) = if config.nameservers.is_empty() {
            match hickory_resolver::system_conf::read_system_conf() {
                Ok(system) => system,
                Err(e) => {
                    warn!("Failed to read system DNS configuration ({}), using Cloudflare", e);
                    (HickoryConfig::cloudflare(), ResolverOpts::default())
                }
            }
        } else {
            let mut resolver_config = HickoryConfig::new();
            for server in &config.nameservers {
                match server.address.parse::<SocketAddr>() {
                    Ok(socket_addr) => {
                        resolver_config.add_name_server(NameServerConfig::new(socket_addr, Protocol::Udp));
                        resolver_config.add_name_server(NameServerConfig::new(socket_addr, Protocol::Tcp));
                    }
                    Err(e) => warn!("Skipping nameserver '{}' ({}): {}", server.name, server.address, e),
                }
            }
            (resolver_config, ResolverOpts::default())
        };

        opts.timeout = config.timeout();
        opts.attempts = 1;
        opts.ip_strategy = LookupIpStrategy::Ipv4thenIpv6;
        opts.validate = false;

        Self {
            inner: TokioAsyncResolver::tokio(resolver_config, opts),
        }
    }
}

impl NameResolver for HickoryResolver {
    async fn resolve(&self, domain: &str) -> Result<IpAddr, ResolutionError> {
        let lookup = self
            .inner
            .lookup_ip(domain)
            .await
            .map_err(|e| ResolutionError::failure(domain, e.to_string()))?;

        lookup
            .iter()
            .next()
            .ok_or_else(|| ResolutionError::failure(domain, "no addresses returned"))
    }
}

/// Counts from one `resolve_rows` pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionStats {
    pub rows: usize,
    pub distinct_domains: usize,
    pub lookups_issued: usize,
    pub resolved: usize,
    pub failed: usize,
}

/// Memoizing resolver front-end shared by every row of a run
pub struct ResolutionCache<R> {
    resolver: R,
    workers: usize,
    timeout: Duration,
    memo: Mutex<HashMap<String, String>>,
    lookups: AtomicUsize,
}

impl<R: NameResolver> ResolutionCache<R> {
    pub fn new(resolver: R, workers: usize, timeout: Duration) -> Self {
        Self {
            resolver,
            workers: workers.max(1),
            timeout,
            memo: Mutex::new(HashMap::new()),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn from_config(resolver: R, config: &ResolverConfig) -> Self {
        Self::new(resolver, config.workers, config.timeout())
    }

    /// Underlying lookups issued since construction
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Snapshot of domain -> address (or sentinel)
    pub fn resolved_map(&self) -> HashMap<String, String> {
        self.memo.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub async fn resolve_rows(&self, rows: &mut [Row]) -> ResolutionStats {
        self.resolve_rows_with_progress(rows, None::<fn(usize, usize, &str)>).await
    }

    /// Resolve every distinct domain, then stamp `ip_address` on all rows.
    ///
    /// Rows are only touched after every lookup has finished.
    pub async fn resolve_rows_with_progress<F>(&self, rows: &mut [Row], progress_callback: Option<F>) -> ResolutionStats
    where
        F: Fn(usize, usize, &str),
    {
        let distinct = distinct_domains(rows);
        let pending: Vec<String> = {
            let memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
            distinct.iter().filter(|d| !memo.contains_key(*d)).cloned().collect()
        };

        let total = pending.len();
        debug!(
            "Resolving {} new domains of {} distinct (workers: {}, timeout: {:?})",
            total,
            distinct.len(),
            self.workers,
            self.timeout
        );

        let semaphore = Semaphore::new(self.workers);
        let completed = AtomicUsize::new(0);

        let results: Vec<(String, Result<IpAddr, ResolutionError>)> = stream::iter(pending)
            .map(|domain| {
                let semaphore = &semaphore;
                let completed = &completed;
                let callback = &progress_callback;
                async move {
                    let _permit = semaphore.acquire().await.ok();
                    self.lookups.fetch_add(1, Ordering::SeqCst);

                    let timed_out = || ResolutionError::Timeout {
                        domain: domain.clone(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    };
                    // A zero budget fails without asking the resolver at all
                    let outcome = if self.timeout.is_zero() {
                        Err(timed_out())
                    } else {
                        match tokio::time::timeout(self.timeout, self.resolver.resolve(&domain)).await {
                            Ok(result) => result,
                            Err(_) => Err(timed_out()),
                        }
                    };

                    let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(cb) = callback {
                        cb(current, total, &domain);
                    }

                    (domain, outcome)
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut stats = ResolutionStats {
            rows: rows.len(),
            distinct_domains: distinct.len(),
            lookups_issued: results.len(),
            ..Default::default()
        };

        {
            let mut memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
            for (domain, outcome) in results {
                let value = match outcome {
                    Ok(ip) => {
                        debug!("Resolved {} -> {}", domain, ip);
                        stats.resolved += 1;
                        ip.to_string()
                    }
                    Err(e) => {
                        debug!("{}", e);
                        stats.failed += 1;
                        RESOLUTION_SENTINEL.to_string()
                    }
                };
                memo.entry(domain).or_insert(value);
            }

            for row in rows.iter_mut() {
                let key = row.domain.to_lowercase();
                let ip = if key.is_empty() {
                    RESOLUTION_SENTINEL.to_string()
                } else {
                    memo.get(&key).cloned().unwrap_or_else(|| RESOLUTION_SENTINEL.to_string())
                };
                row.set_ip_address(ip);
            }
        }

        info!(
            "Resolution complete: {} domains, {} lookups, {} resolved, {} failed",
            stats.distinct_domains, stats.lookups_issued, stats.resolved, stats.failed
        );
        stats
    }
}

/// Distinct non-empty lowercased domains in first-seen order
fn distinct_domains(rows: &[Row]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .map(|r| r.domain.to_lowercase())
        .filter(|d| !d.is_empty() && seen.insert(d.clone()))
        .collect()
}
