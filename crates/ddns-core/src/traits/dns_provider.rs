// # DNS Provider Trait
//
// Defines the uniform contract every DNS provider adapter implements.
//
// ## Implementations
//
// - DNSPod: `ddns-provider-dnspod` crate
// - AliDNS: `ddns-provider-alidns` crate
// - Cloudflare: `ddns-provider-cloudflare` crate
// - Huawei Cloud: `ddns-provider-huaweicloud` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::{DnsProvider, Enable};
//
// let provider = /* DnsProvider implementation */;
// let report = provider
//     .run(Enable { ipv4: true, ipv6: true }, "203.0.113.7", "")
//     .await;
// for line in &report.messages {
//     tracing::info!("{}", line);
// }
// ```

use async_trait::async_trait;
use std::fmt;

use crate::address::{Enable, same_address};
use crate::config::RecordTarget;
use crate::traits::IpVersion;

/// DNS record type managed by the watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
}

impl RecordType {
    /// Wire name used by every provider API
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A DNS record as fetched from the provider right before an update
///
/// Never cached across cycles: the line/zone context can change on the
/// provider side independently of this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// The record ID (provider-specific)
    pub id: String,
    /// Line id, zone id or other context the update call needs
    pub context: String,
    /// The value currently published
    pub value: String,
    /// A or AAAA
    pub record_type: RecordType,
}

/// Outcome of one [`DnsProvider::run`] invocation
#[derive(Debug, Default)]
pub struct RunReport {
    /// Provider display name
    pub provider: &'static str,
    /// One line per record actually written
    pub messages: Vec<String>,
    /// Every failure, already prefixed with the provider name
    pub errors: Vec<crate::Error>,
    /// Number of update calls issued
    pub updates: usize,
}

impl RunReport {
    /// Create an empty report for a provider
    pub fn new(provider: &'static str) -> Self {
        Self {
            provider,
            ..Self::default()
        }
    }

    /// Whether every attempted operation succeeded
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Trait for DNS provider implementations
///
/// Adapters only encapsulate authentication and wire format: a record lookup
/// and a record update. The fetch/compare/update algorithm is the provided
/// [`run`](DnsProvider::run) method and is identical for every provider.
///
/// # Contract
///
/// - `fetch_record` must resolve exactly one record by `(name, type)`; zero
///   matches is [`Error::RecordNotFound`](crate::Error::RecordNotFound), several
///   matches resolve to the first in provider response order
/// - Every error returned is prefixed with the provider name
/// - No retries: the next scheduled cycle is the retry mechanism
/// - No state beyond a single request
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Fetch the current record for `subdomain` under the configured domain
    async fn fetch_record(
        &self,
        subdomain: &str,
        record_type: RecordType,
    ) -> Result<DnsRecord, crate::Error>;

    /// Point `record` at `value`
    async fn update_record(
        &self,
        record: &DnsRecord,
        subdomain: &str,
        value: &str,
    ) -> Result<(), crate::Error>;

    /// The domain and subdomains this provider instance manages
    fn target(&self) -> &RecordTarget;

    /// Get the provider name (for logging and error prefixes)
    ///
    /// # Returns
    ///
    /// A static display name (e.g., "DNSPod", "Cloudflare")
    fn provider_name(&self) -> &'static str;

    /// Synchronize the managed records with the resolved addresses
    ///
    /// For each enabled family with a non-empty address and a configured
    /// subdomain: fetch the record, do nothing if it already holds the
    /// address, otherwise update it. Failures for one family never stop the
    /// other.
    async fn run(&self, enabled: Enable, ipv4: &str, ipv6: &str) -> RunReport {
        let mut report = RunReport::new(self.provider_name());
        let target = self.target();

        let families = [
            (IpVersion::V4, enabled.ipv4, ipv4, target.sub_domain.a.as_str()),
            (IpVersion::V6, enabled.ipv6, ipv6, target.sub_domain.aaaa.as_str()),
        ];

        for (version, on, value, subdomain) in families {
            if !on || value.is_empty() || subdomain.is_empty() {
                continue;
            }

            let record_type = version.record_type();
            let record = match self.fetch_record(subdomain, record_type).await {
                Ok(record) => record,
                Err(e) => {
                    report.errors.push(e);
                    continue;
                }
            };

            let fqdn = target.fqdn(subdomain);
            if same_address(&record.value, value) {
                tracing::debug!(
                    "{}: {} ({}) already points to {}",
                    self.provider_name(),
                    fqdn,
                    record_type,
                    value
                );
                continue;
            }

            report.updates += 1;
            match self.update_record(&record, subdomain, value).await {
                Ok(()) => report.messages.push(format!(
                    "{}: {} ({}) updated to {}",
                    self.provider_name(),
                    fqdn,
                    record_type,
                    value
                )),
                Err(e) => report.errors.push(e),
            }
        }

        report
    }
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this provider
    ///
    /// # Returns
    ///
    /// A boxed DnsProvider trait object
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
