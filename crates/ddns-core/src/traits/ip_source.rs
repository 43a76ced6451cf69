// # IP Source Traits
//
// Defines the interfaces the address resolver uses to find the caller's own
// address.
//
// ## Implementations
//
// - Lookup API (`GET <url>` -> `{ip, latest_version}`): `ddns-ip-http` crate
// - Local interfaces: `ddns-ip-netcard` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::traits::{IpSource, IpVersion};
//
// let source = /* IpSource implementation */;
// let ipv6 = source.lookup(IpVersion::V6).await?;
// ```

use async_trait::async_trait;

use crate::address::InterfaceMap;
use crate::traits::RecordType;

/// IP version (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Human readable family name used in logs and errors
    pub fn label(self) -> &'static str {
        match self {
            IpVersion::V4 => "IPv4",
            IpVersion::V6 => "IPv6",
        }
    }

    /// The DNS record type that carries this family
    pub fn record_type(self) -> RecordType {
        match self {
            IpVersion::V4 => RecordType::A,
            IpVersion::V6 => RecordType::Aaaa,
        }
    }
}

/// Trait for remote "what is my IP" sources
///
/// Implementations perform exactly one request per call and return the raw
/// textual address reported by the service. Family validation and IPv6
/// canonicalization are owned by [`AddressResolver`](crate::AddressResolver).
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Look up the current address for one family
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The address exactly as reported
    /// - `Err(Error)`: If the service could not be reached or answered garbage
    async fn lookup(&self, version: IpVersion) -> Result<String, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn name(&self) -> &'static str {
        "lookup-api"
    }
}

/// Trait for listing local interface addresses
///
/// Keys are `"<interface name> <ordinal>"`, values are addresses with the
/// prefix length removed and IPv6 fully expanded.
pub trait InterfaceEnumerator: Send + Sync {
    /// Enumerate every interface address on this host
    fn interfaces(&self) -> Result<InterfaceMap, crate::Error>;
}
