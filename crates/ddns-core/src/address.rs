//! Address resolution
//!
//! Determines the caller's current IPv4/IPv6 either from a lookup API or from
//! a named local network interface, and canonicalizes every IPv6 result to
//! the fully expanded 8-group form so that comparisons and provider updates
//! operate on one textual representation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv6Addr};
use std::sync::Arc;
use tracing::debug;

use crate::config::NetworkCard;
use crate::error::{Error, Result};
use crate::traits::{InterfaceEnumerator, IpSource, IpVersion};

/// Interface addresses keyed by `"<interface name> <ordinal>"`
///
/// Ordered by key, so "first match" searches are deterministic.
pub type InterfaceMap = BTreeMap<String, String>;

/// Which address families are managed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enable {
    #[serde(default)]
    pub ipv4: bool,
    #[serde(default)]
    pub ipv6: bool,
}

impl Enable {
    /// Both families enabled
    pub fn both() -> Self {
        Self {
            ipv4: true,
            ipv6: true,
        }
    }

    fn get(self, version: IpVersion) -> bool {
        match version {
            IpVersion::V4 => self.ipv4,
            IpVersion::V6 => self.ipv6,
        }
    }
}

/// Addresses produced by one resolution
///
/// An empty string means "not resolved this cycle".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    #[serde(default)]
    pub ipv4: String,
    #[serde(default)]
    pub ipv6: String,
}

impl ResolvedAddress {
    /// Create a pair from borrowed values
    pub fn new(ipv4: impl Into<String>, ipv6: impl Into<String>) -> Self {
        Self {
            ipv4: ipv4.into(),
            ipv6: ipv6.into(),
        }
    }

    /// Whether neither family produced a value
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }

    fn set(&mut self, version: IpVersion, value: String) {
        match version {
            IpVersion::V4 => self.ipv4 = value,
            IpVersion::V6 => self.ipv6 = value,
        }
    }
}

/// Expand an IPv6 literal to 8 colon-separated lowercase hex groups
///
/// `::1` becomes `0:0:0:0:0:0:0:1`. Leading zeros inside a group are dropped,
/// groups are never empty. Anything that is not an IPv6 literal, and
/// IPv4-mapped addresses, are returned unchanged.
pub fn expand_ipv6(ip: &str) -> String {
    let Ok(addr) = ip.parse::<Ipv6Addr>() else {
        return ip.to_string();
    };
    if addr.to_ipv4_mapped().is_some() {
        return ip.to_string();
    }

    addr.segments()
        .iter()
        .map(|segment| format!("{segment:x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Compare two textual addresses, ignoring IPv6 compression differences
pub fn same_address(a: &str, b: &str) -> bool {
    match (a.parse::<IpAddr>(), b.parse::<IpAddr>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Whether `ip` is a global-unicast, non-private IPv6 address
///
/// Rejects IPv4 values, unspecified, loopback, multicast, link-local
/// (`fe80::/10`) and unique-local (`fc00::/7`) addresses.
pub fn is_public_unicast_v6(ip: &str) -> bool {
    if !ip.contains(':') {
        return false;
    }
    let Ok(addr) = ip.parse::<Ipv6Addr>() else {
        return false;
    };

    let first = addr.segments()[0];
    let link_local = (first & 0xffc0) == 0xfe80;
    let unique_local = (first & 0xfe00) == 0xfc00;

    !(addr.is_unspecified() || addr.is_loopback() || addr.is_multicast() || link_local || unique_local)
}

/// Split `"<name> <ordinal>"` into the bare interface name
fn strip_ordinal(key: &str) -> &str {
    match key.rsplit_once(' ') {
        Some((name, ordinal)) if !ordinal.is_empty() && ordinal.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => key,
    }
}

/// Search the interface map for a public IPv6 address
///
/// 1. the exact `preferred` key
/// 2. `"<name> 0"`, `"<name> 1"`, ... for the preferred interface name (a
///    trailing ordinal on `preferred` is stripped first), stopping at the
///    first missing ordinal
/// 3. the first public address of any interface, in key order
pub fn fallback_ipv6(interfaces: &InterfaceMap, preferred: &str) -> Option<String> {
    if !preferred.is_empty() {
        if let Some(ip) = interfaces.get(preferred).filter(|ip| is_public_unicast_v6(ip)) {
            return Some(ip.clone());
        }

        let name = strip_ordinal(preferred);
        for ordinal in 0.. {
            let Some(ip) = interfaces.get(&format!("{name} {ordinal}")) else {
                break;
            };
            if is_public_unicast_v6(ip) {
                debug!("IPv6 fallback picked {} {}", name, ordinal);
                return Some(ip.clone());
            }
        }
    }

    interfaces
        .iter()
        .find(|(_, ip)| is_public_unicast_v6(ip))
        .map(|(key, ip)| {
            debug!("IPv6 fallback picked first public address on {}", key);
            ip.clone()
        })
}

/// Result of one resolution: whatever was obtained plus per-family failures
#[derive(Debug, Default)]
pub struct Resolution {
    /// Resolved addresses; empty for families that failed or are disabled
    pub address: ResolvedAddress,
    /// One entry per family that failed
    pub errors: Vec<Error>,
}

/// Determines the caller's current addresses
///
/// Per enabled family the resolver either reads a named interface (when
/// network-card mode is on and a name is configured for that family) or asks
/// the lookup API.
pub struct AddressResolver {
    enable: Enable,
    lookup: Arc<dyn IpSource>,
    network_card: NetworkCard,
    enumerator: Option<Arc<dyn InterfaceEnumerator>>,
    ipv6_fallback: bool,
}

impl AddressResolver {
    /// Create a resolver that only uses the lookup API
    pub fn new(enable: Enable, lookup: Arc<dyn IpSource>) -> Self {
        Self {
            enable,
            lookup,
            network_card: NetworkCard::default(),
            enumerator: None,
            ipv6_fallback: false,
        }
    }

    /// Read addresses from local interfaces according to `network_card`
    pub fn with_network_card(
        mut self,
        network_card: NetworkCard,
        enumerator: Arc<dyn InterfaceEnumerator>,
    ) -> Self {
        self.network_card = network_card;
        self.enumerator = Some(enumerator);
        self
    }

    /// Enable the IPv6 interface fallback search
    pub fn with_ipv6_fallback(mut self, enabled: bool) -> Self {
        self.ipv6_fallback = enabled;
        self
    }

    /// The families this resolver produces
    pub fn enable(&self) -> Enable {
        self.enable
    }

    fn interface_name(&self, version: IpVersion) -> &str {
        match version {
            IpVersion::V4 => &self.network_card.ipv4,
            IpVersion::V6 => &self.network_card.ipv6,
        }
    }

    fn enumerate(&self) -> Result<InterfaceMap> {
        match &self.enumerator {
            Some(enumerator) => enumerator.interfaces(),
            None => Err(Error::config("Network-card mode enabled without an interface enumerator")),
        }
    }

    /// Resolve the current addresses
    ///
    /// # Returns
    ///
    /// - `Ok(Resolution)`: Possibly partial; failed families are empty and
    ///   listed in `errors`
    /// - `Err(Error::NeedsInterfaceSelection)`: Network-card mode is on but no
    ///   interface name is configured; carries the enumerated interfaces
    /// - `Err(Error)`: Interfaces could not be enumerated
    pub async fn resolve(&self) -> Result<Resolution> {
        let card = &self.network_card;
        if card.enable && card.ipv4.is_empty() && card.ipv6.is_empty() {
            return Err(Error::NeedsInterfaceSelection(self.enumerate()?));
        }

        let interfaces = if card.enable {
            Some(self.enumerate()?)
        } else {
            None
        };

        let mut resolution = Resolution::default();
        for version in [IpVersion::V4, IpVersion::V6] {
            if !self.enable.get(version) {
                continue;
            }
            match self.resolve_family(version, interfaces.as_ref()).await {
                Ok(value) => resolution.address.set(version, value),
                Err(e) => resolution.errors.push(e),
            }
        }

        Ok(resolution)
    }

    async fn resolve_family(&self, version: IpVersion, interfaces: Option<&InterfaceMap>) -> Result<String> {
        let name = self.interface_name(version);
        let raw = match interfaces {
            Some(map) if !name.is_empty() => self.from_interfaces(version, map, name)?,
            _ => self.lookup.lookup(version).await?,
        };
        let raw = raw.trim();

        match version {
            IpVersion::V4 if raw.contains(':') => Err(Error::MalformedAddress {
                family: version.label(),
                value: raw.to_string(),
            }),
            IpVersion::V6 if !raw.contains(':') => Err(Error::MalformedAddress {
                family: version.label(),
                value: raw.to_string(),
            }),
            IpVersion::V4 if raw.is_empty() => Err(Error::resolution("lookup returned an empty IPv4 address")),
            IpVersion::V4 => Ok(raw.to_string()),
            IpVersion::V6 => Ok(expand_ipv6(raw)),
        }
    }

    fn from_interfaces(&self, version: IpVersion, map: &InterfaceMap, name: &str) -> Result<String> {
        let found = match version {
            IpVersion::V4 => map.get(name).cloned(),
            IpVersion::V6 if self.ipv6_fallback => fallback_ipv6(map, name),
            IpVersion::V6 => map.get(name).filter(|ip| is_public_unicast_v6(ip)).cloned(),
        };

        found.ok_or_else(|| {
            Error::interface_not_found(format!(
                "{} interface {:?} does not exist or has no usable address",
                version.label(),
                name
            ))
        })
    }
}
