//! Synchronization driver
//!
//! The driver runs one check cycle at a time:
//!
//! ```text
//! ┌─────────────────┐
//! │ AddressResolver │──► Resolution
//! └─────────────────┘        │
//!                            ▼
//!                  ┌───────────────────┐
//!                  │ LastKnownAddress  │  change detection (or forced)
//!                  └───────────────────┘
//!                            │
//!            ┌───────────────┴───────────────┐
//!            ▼                               ▼
//!  ┌──────────────────┐            ┌──────────────────┐
//!  │ DnsProvider × N  │            │   RelayClient    │
//!  │   (concurrent)   │            │ (one submission) │
//!  └──────────────────┘            └──────────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Resolve; abort the cycle if no family produced an address
//! 2. Compare against [`LastKnownAddress`]; stop if nothing changed and the
//!    cycle is not forced
//! 3. Record the new values *before* any provider runs, so a provider
//!    failure never causes a second attempt for the same change
//! 4. Submit once to the center, or run every provider as its own task and
//!    log their reports after all complete; a provider task that panics is
//!    reported as that provider's failure
//!
//! There are no retries inside a cycle: the next tick is the retry.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::address::{AddressResolver, Enable, ResolvedAddress};
use crate::error::{Error, Result};
use crate::relay::RelayClient;
use crate::traits::{DnsProvider, RunReport};

/// Addresses seen by the previous cycles of this process
///
/// Owned by whoever drives the cycles and passed into every
/// [`SyncDriver::check`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastKnownAddress {
    pub ipv4: String,
    pub ipv6: String,
}

impl LastKnownAddress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a fresh resolution into the state
    ///
    /// Empty families are "not resolved" and neither count as a change nor
    /// overwrite the state. Returns the families to forward: changed ones,
    /// or every resolved one when `forced`. Unforwarded families are empty.
    pub fn observe(&mut self, resolved: &ResolvedAddress, forced: bool) -> ResolvedAddress {
        let mut forward = ResolvedAddress::default();

        if !resolved.ipv4.is_empty() && (forced || resolved.ipv4 != self.ipv4) {
            self.ipv4 = resolved.ipv4.clone();
            forward.ipv4 = resolved.ipv4.clone();
        }
        if !resolved.ipv6.is_empty() && (forced || resolved.ipv6 != self.ipv6) {
            self.ipv6 = resolved.ipv6.clone();
            forward.ipv6 = resolved.ipv6.clone();
        }

        forward
    }
}

/// Where a cycle sends detected changes
pub enum Dispatch {
    /// Update every provider directly
    Direct(Vec<Arc<dyn DnsProvider>>),
    /// Submit to a center which updates on our behalf
    Relay(Arc<dyn RelayClient>),
}

/// What one cycle did
#[derive(Debug)]
pub enum CycleOutcome {
    /// No family could be resolved
    Aborted,
    /// Nothing changed and the cycle was not forced
    Unchanged,
    /// The pair was submitted to the center
    Relayed(Result<Vec<String>>),
    /// One report per provider, in dispatch order
    Dispatched(Vec<RunReport>),
}

/// Drives check cycles
pub struct SyncDriver {
    resolver: AddressResolver,
    dispatch: Dispatch,
}

impl SyncDriver {
    /// Create a new driver
    pub fn new(resolver: AddressResolver, dispatch: Dispatch) -> Self {
        Self { resolver, dispatch }
    }

    fn enable(&self) -> Enable {
        self.resolver.enable()
    }

    /// Run one check cycle
    ///
    /// # Returns
    ///
    /// - `Ok(CycleOutcome)`: The cycle completed; per-family and per-provider
    ///   failures are logged and carried in the outcome
    /// - `Err(Error::NeedsInterfaceSelection)`: The operator must pick an
    ///   interface before any cycle can succeed
    pub async fn check(&self, state: &mut LastKnownAddress, forced: bool) -> Result<CycleOutcome> {
        let resolution = match self.resolver.resolve().await {
            Ok(resolution) => resolution,
            Err(e @ Error::NeedsInterfaceSelection(_)) => return Err(e),
            Err(e) => {
                error!("Address resolution failed: {}", e);
                return Ok(CycleOutcome::Aborted);
            }
        };

        for e in &resolution.errors {
            warn!("{}", e);
        }
        if resolution.address.is_empty() {
            debug!("No address resolved, skipping this cycle");
            return Ok(CycleOutcome::Aborted);
        }

        let forward = state.observe(&resolution.address, forced);
        if forward.is_empty() {
            debug!(
                "Address unchanged (IPv4: {:?}, IPv6: {:?})",
                state.ipv4, state.ipv6
            );
            return Ok(CycleOutcome::Unchanged);
        }
        info!(
            "Address change detected (IPv4: {:?}, IPv6: {:?}, forced: {})",
            forward.ipv4, forward.ipv6, forced
        );

        match &self.dispatch {
            Dispatch::Relay(client) => {
                let result = client.submit(self.enable(), &resolution.address).await;
                match &result {
                    Ok(lines) => lines.iter().for_each(|line| info!("{}", line)),
                    Err(e) => error!("Center request failed: {}", e),
                }
                Ok(CycleOutcome::Relayed(result))
            }
            Dispatch::Direct(providers) => {
                let reports = fan_out(providers, self.enable(), &forward).await;

                for report in &reports {
                    for e in &report.errors {
                        error!("{}", e);
                    }
                    for message in &report.messages {
                        info!("{}", message);
                    }
                }
                Ok(CycleOutcome::Dispatched(reports))
            }
        }
    }
}

/// Run every provider on its own task and collect one report per provider,
/// in dispatch order
async fn fan_out(
    providers: &[Arc<dyn DnsProvider>],
    enable: Enable,
    forward: &ResolvedAddress,
) -> Vec<RunReport> {
    let mut set = JoinSet::new();
    for (index, provider) in providers.iter().enumerate() {
        let provider = Arc::clone(provider);
        let ipv4 = forward.ipv4.clone();
        let ipv6 = forward.ipv6.clone();
        set.spawn(async move { (index, provider.run(enable, &ipv4, &ipv6).await) });
    }

    let mut slots: Vec<Option<RunReport>> = providers.iter().map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, report)) => slots[index] = Some(report),
            Err(e) => error!("Provider task failed: {}", e),
        }
    }

    // A missing slot belongs to a task that panicked or was cancelled
    slots
        .into_iter()
        .zip(providers)
        .map(|(slot, provider)| {
            slot.unwrap_or_else(|| {
                let name = provider.provider_name();
                let mut report = RunReport::new(name);
                report
                    .errors
                    .push(Error::provider(name, "update task aborted before reporting"));
                report
            })
        })
        .collect()
}

impl SyncDriver {
    /// Run a cycle every `period` until `shutdown` resolves
    ///
    /// The first cycle starts immediately. A cycle always runs to completion;
    /// a slow cycle delays the next tick instead of overlapping it.
    pub async fn run_until(
        &self,
        period: Duration,
        forced: bool,
        shutdown: impl Future<Output = ()>,
    ) -> Result<LastKnownAddress> {
        let mut state = LastKnownAddress::new();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check(&mut state, forced).await?;
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_forwards_changed_families_only() {
        let mut state = LastKnownAddress {
            ipv4: "1.1.1.1".to_string(),
            ipv6: String::new(),
        };
        let forward = state.observe(&ResolvedAddress::new("1.1.1.1", "2001:db8:0:0:0:0:0:1"), false);

        assert_eq!(forward.ipv4, "");
        assert_eq!(forward.ipv6, "2001:db8:0:0:0:0:0:1");
        assert_eq!(state.ipv6, "2001:db8:0:0:0:0:0:1");
    }

    #[test]
    fn test_observe_forced() {
        let mut state = LastKnownAddress {
            ipv4: "1.1.1.1".to_string(),
            ipv6: "2001:db8:0:0:0:0:0:1".to_string(),
        };
        let resolved = ResolvedAddress::new("1.1.1.1", "2001:db8:0:0:0:0:0:1");

        assert!(state.observe(&resolved, false).is_empty());
        assert_eq!(state.observe(&resolved, true), resolved);
    }

    #[test]
    fn test_observe_ignores_unresolved_family() {
        let mut state = LastKnownAddress {
            ipv4: "1.1.1.1".to_string(),
            ipv6: "2001:db8:0:0:0:0:0:1".to_string(),
        };
        let forward = state.observe(&ResolvedAddress::new("", "2001:db8:0:0:0:0:0:1"), false);

        assert!(forward.is_empty());
        assert_eq!(state.ipv4, "1.1.1.1");
    }
}
