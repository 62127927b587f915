//! Ordered provider failover with per-provider exponential backoff

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use super::{Capability, Provider};
use crate::error::{Error, FailureRecord, Result};

/// Backoff ceiling per provider
const MAX_BACKOFF: Duration = Duration::from_secs(16);

/// A provider's backoff entry is forgotten after this long without failures
const FORGET_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct BackoffState {
    failures: u32,
    last_failure: Instant,
}

/// Routes calls through an ordered provider list with automatic failover.
///
/// Providers are tried highest priority first. Any failure (rate limit,
/// timeout, or otherwise) is recorded and the next provider is tried; a
/// provider sitting inside its backoff window is skipped without counting
/// a new failure, and no provider is tried twice within one call. When
/// every provider has failed or been skipped, one extra attempt is made
/// against the skipped provider with the smallest remaining delay, after
/// sleeping that delay out. If that also fails the call ends with
/// [`Error::AllProvidersFailed`] carrying every collected failure.
///
/// Backoff doubles per consecutive failure (1s, 2s, 4s, 8s, 16s cap) and
/// is forgotten after 60 seconds without failures. The state lives behind
/// a short-lived mutex that is never held across an await.
pub struct Router<P: ?Sized> {
    capability: Capability,
    providers: Vec<Arc<P>>,
    backoff: Mutex<HashMap<String, BackoffState>>,
}

impl<P: Provider + ?Sized> Router<P> {
    /// Create a router over an ordered provider list, highest priority
    /// first.
    ///
    /// # Errors
    ///
    /// Returns an error if `providers` is empty.
    pub fn new(capability: Capability, providers: Vec<Arc<P>>) -> Result<Self> {
        if providers.is_empty() {
            return Err(Error::Config(format!(
                "at least one {capability} provider is required"
            )));
        }
        Ok(Self {
            capability,
            providers,
            backoff: Mutex::new(HashMap::new()),
        })
    }

    /// The capability this router serves
    #[must_use]
    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// The ordered provider list
    #[must_use]
    pub fn providers(&self) -> &[Arc<P>] {
        &self.providers
    }

    /// Execute `call` against the providers with failover.
    ///
    /// Returns the first successful result. On success the provider's
    /// backoff is cleared and no further providers are tried.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllProvidersFailed`] once every provider has
    /// failed or been skipped and the single post-sweep retry has also
    /// failed, with one [`FailureRecord`] per attempt in order.
    pub async fn execute<T, F, Fut>(&self, call: F) -> Result<T>
    where
        F: Fn(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut failures: Vec<FailureRecord> = Vec::new();

        for provider in &self.providers {
            let name = provider.name().to_string();

            let delay = self.backoff_delay(&name);
            if !delay.is_zero() {
                tracing::debug!(
                    capability = %self.capability,
                    provider = %name,
                    remaining = ?delay,
                    "provider in backoff, skipping"
                );
                continue;
            }

            tracing::info!(capability = %self.capability, provider = %name, "trying provider");
            match call(Arc::clone(provider)).await {
                Ok(result) => {
                    self.record_success(&name);
                    tracing::info!(capability = %self.capability, provider = %name, "provider succeeded");
                    return Ok(result);
                }
                Err(err) => {
                    let kind = err.failure_kind();
                    tracing::warn!(
                        capability = %self.capability,
                        provider = %name,
                        error = %err,
                        "provider failed"
                    );
                    self.record_failure(&name);
                    failures.push(FailureRecord {
                        provider: name,
                        kind,
                        message: err.to_string(),
                    });
                }
            }
        }

        // Every provider failed or sat in backoff. One extra attempt
        // against the skipped provider with the smallest remaining delay;
        // providers that already failed this call are not retried.
        let mut skipped: Vec<(Duration, &Arc<P>)> = self
            .providers
            .iter()
            .filter(|p| !failures.iter().any(|f| f.provider == p.name()))
            .map(|p| (self.backoff_delay(p.name()), p))
            .collect();
        skipped.sort_by_key(|(delay, _)| *delay);

        if let Some((delay, provider)) = skipped.into_iter().next() {
            let name = provider.name().to_string();
            if !delay.is_zero() {
                tracing::info!(
                    capability = %self.capability,
                    provider = %name,
                    wait = ?delay,
                    "all providers exhausted, waiting to retry"
                );
                tokio::time::sleep(delay).await;
            }
            tracing::info!(capability = %self.capability, provider = %name, "retrying after backoff");
            match call(Arc::clone(provider)).await {
                Ok(result) => {
                    self.record_success(&name);
                    return Ok(result);
                }
                Err(err) => {
                    let kind = err.failure_kind();
                    self.record_failure(&name);
                    failures.push(FailureRecord {
                        provider: name,
                        kind,
                        message: err.to_string(),
                    });
                }
            }
        }

        Err(Error::AllProvidersFailed {
            capability: self.capability,
            failures,
        })
    }

    /// Remaining backoff delay for a provider; zero when none is active.
    /// Entries older than the forget window are dropped.
    fn backoff_delay(&self, name: &str) -> Duration {
        let mut map = self.backoff.lock().unwrap();
        let Some(state) = map.get(name).copied() else {
            return Duration::ZERO;
        };
        let elapsed = state.last_failure.elapsed();
        if elapsed > FORGET_AFTER {
            map.remove(name);
            return Duration::ZERO;
        }
        exponential_delay(state.failures).saturating_sub(elapsed)
    }

    fn record_failure(&self, name: &str) {
        let mut map = self.backoff.lock().unwrap();
        let entry = map.entry(name.to_string()).or_insert(BackoffState {
            failures: 0,
            last_failure: Instant::now(),
        });
        entry.failures += 1;
        entry.last_failure = Instant::now();
    }

    fn record_success(&self, name: &str) {
        self.backoff.lock().unwrap().remove(name);
    }
}

/// Backoff schedule: 1s, 2s, 4s, 8s, 16s (capped)
fn exponential_delay(failures: u32) -> Duration {
    let exp = failures.saturating_sub(1).min(4);
    Duration::from_secs(1 << exp).min(MAX_BACKOFF)
}
