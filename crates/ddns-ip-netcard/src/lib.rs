// # Network-Card Source
//
// Lists the addresses bound to local interfaces.
//
// ## Key format
//
// Every address gets the key `"<interface name> <ordinal>"`, where the
// ordinal counts the addresses of that interface in the order the OS
// reports them, across both families. Values carry no prefix length and
// IPv6 addresses are fully expanded, so the map can be written to
// `network_card.json` and copied into `client.json` verbatim.

use std::collections::HashMap;
use std::net::IpAddr;

use ddns_core::address::{InterfaceMap, expand_ipv6};
use ddns_core::traits::InterfaceEnumerator;
use ddns_core::{Error, Result};

/// Enumerates interfaces through the OS
#[derive(Debug, Default, Clone, Copy)]
pub struct IfAddrsEnumerator;

impl IfAddrsEnumerator {
    pub fn new() -> Self {
        Self
    }
}

impl InterfaceEnumerator for IfAddrsEnumerator {
    fn interfaces(&self) -> Result<InterfaceMap> {
        let interfaces = if_addrs::get_if_addrs()
            .map_err(|e| Error::resolution(format!("failed to list network interfaces: {}", e)))?;

        let map = build_map(interfaces.into_iter().map(|iface| {
            let ip = iface.ip();
            (iface.name, ip)
        }));
        tracing::debug!("Enumerated {} interface addresses", map.len());
        Ok(map)
    }
}

/// Number each interface's addresses in arrival order
pub fn build_map(addresses: impl IntoIterator<Item = (String, IpAddr)>) -> InterfaceMap {
    let mut ordinals: HashMap<String, usize> = HashMap::new();
    let mut map = InterfaceMap::new();

    for (name, ip) in addresses {
        let ordinal = ordinals.entry(name.clone()).or_insert(0);
        let value = match ip {
            IpAddr::V4(v4) => v4.to_string(),
            IpAddr::V6(v6) => expand_ipv6(&v6.to_string()),
        };
        map.insert(format!("{} {}", name, ordinal), value);
        *ordinal += 1;
    }

    map
}
