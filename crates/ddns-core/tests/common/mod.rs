//! Test doubles shared by the contract tests
//!
//! Each double records how often it was called so tests can assert on
//! side effects (or their absence) without any network access.

#![allow(dead_code)]

use async_trait::async_trait;
use ddns_core::config::{ProviderConfig, RecordTarget};
use ddns_core::error::{Error, Result};
use ddns_core::relay::RelayClient;
use ddns_core::traits::{
    DnsProvider, DnsProviderFactory, DnsRecord, InterfaceEnumerator, IpSource, IpVersion,
    RecordType,
};
use ddns_core::{Enable, InterfaceMap, ResolvedAddress};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Call counters, shareable between a provider and the test
#[derive(Default)]
pub struct ProviderCalls {
    fetches: AtomicUsize,
    updates: AtomicUsize,
    updated: Mutex<Vec<(String, String)>>,
}

impl ProviderCalls {
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// `(fqdn, value)` for every update, in call order
    pub fn updated(&self) -> Vec<(String, String)> {
        self.updated.lock().unwrap().clone()
    }
}

/// An in-memory DNS provider
pub struct MockDnsProvider {
    name: &'static str,
    target: RecordTarget,
    records: Mutex<HashMap<(String, RecordType), String>>,
    calls: Arc<ProviderCalls>,
    failing: bool,
    panicking: bool,
    delay: Option<Duration>,
}

impl MockDnsProvider {
    pub fn new(name: &'static str, target: RecordTarget) -> Self {
        Self {
            name,
            target,
            records: Mutex::new(HashMap::new()),
            calls: Arc::new(ProviderCalls::default()),
            failing: false,
            panicking: false,
            delay: None,
        }
    }

    /// A provider whose every request fails
    pub fn failing(name: &'static str, target: RecordTarget) -> Self {
        Self {
            failing: true,
            ..Self::new(name, target)
        }
    }

    /// A provider that panics inside its record lookup
    pub fn panicking(name: &'static str, target: RecordTarget) -> Self {
        Self {
            panicking: true,
            ..Self::new(name, target)
        }
    }

    /// Hold every record lookup for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Share counters with the test (or with a factory)
    pub fn with_calls(mut self, calls: Arc<ProviderCalls>) -> Self {
        self.calls = calls;
        self
    }

    /// Seed an existing record
    pub fn with_record(self, subdomain: &str, record_type: RecordType, value: &str) -> Self {
        self.records
            .lock()
            .unwrap()
            .insert((subdomain.to_string(), record_type), value.to_string());
        self
    }

    pub fn calls(&self) -> Arc<ProviderCalls> {
        Arc::clone(&self.calls)
    }

    pub fn value(&self, subdomain: &str, record_type: RecordType) -> Option<String> {
        self.records
            .lock()
            .unwrap()
            .get(&(subdomain.to_string(), record_type))
            .cloned()
    }
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    async fn fetch_record(&self, subdomain: &str, record_type: RecordType) -> Result<DnsRecord> {
        self.calls.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panicking {
            panic!("{} lost its connection state", self.name);
        }
        if self.failing {
            return Err(Error::provider(self.name, "simulated outage"));
        }

        match self.value(subdomain, record_type) {
            Some(value) => Ok(DnsRecord {
                id: format!("{}-{}", subdomain, record_type),
                context: "default".to_string(),
                value,
                record_type,
            }),
            None => Err(Error::RecordNotFound {
                provider: self.name,
                name: self.target.fqdn(subdomain),
                record_type: record_type.as_str(),
            }),
        }
    }

    async fn update_record(&self, record: &DnsRecord, subdomain: &str, value: &str) -> Result<()> {
        self.calls.updates.fetch_add(1, Ordering::SeqCst);
        self.calls
            .updated
            .lock()
            .unwrap()
            .push((self.target.fqdn(subdomain), value.to_string()));
        self.records
            .lock()
            .unwrap()
            .insert((subdomain.to_string(), record.record_type), value.to_string());
        Ok(())
    }

    fn target(&self) -> &RecordTarget {
        &self.target
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

/// Factory building [`MockDnsProvider`]s that share one set of counters
///
/// Every created provider already holds `A`/`AAAA` records with `seed`.
pub struct MockProviderFactory {
    pub calls: Arc<ProviderCalls>,
    pub created: Arc<AtomicUsize>,
    seed: String,
}

impl MockProviderFactory {
    pub fn new(seed: &str) -> Self {
        Self {
            calls: Arc::new(ProviderCalls::default()),
            created: Arc::new(AtomicUsize::new(0)),
            seed: seed.to_string(),
        }
    }
}

impl DnsProviderFactory for MockProviderFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let target = config.target().clone();
        let a = target.sub_domain.a.clone();
        let aaaa = target.sub_domain.aaaa.clone();

        Ok(Box::new(
            MockDnsProvider::new(config.kind().display_name(), target)
                .with_calls(Arc::clone(&self.calls))
                .with_record(&a, RecordType::A, &self.seed)
                .with_record(&aaaa, RecordType::Aaaa, &self.seed),
        ))
    }
}

/// Lookup source answering from mutable per-family values
///
/// `None` makes the lookup fail.
pub struct ScriptedIpSource {
    ipv4: Mutex<Option<String>>,
    ipv6: Mutex<Option<String>>,
    lookups: AtomicUsize,
}

impl ScriptedIpSource {
    pub fn new(ipv4: Option<&str>, ipv6: Option<&str>) -> Self {
        Self {
            ipv4: Mutex::new(ipv4.map(str::to_string)),
            ipv6: Mutex::new(ipv6.map(str::to_string)),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, ipv4: Option<&str>, ipv6: Option<&str>) {
        *self.ipv4.lock().unwrap() = ipv4.map(str::to_string);
        *self.ipv6.lock().unwrap() = ipv6.map(str::to_string);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpSource for ScriptedIpSource {
    async fn lookup(&self, version: IpVersion) -> Result<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let value = match version {
            IpVersion::V4 => self.ipv4.lock().unwrap().clone(),
            IpVersion::V6 => self.ipv6.lock().unwrap().clone(),
        };
        value.ok_or_else(|| Error::http("connection refused"))
    }
}

/// Interface enumerator returning a fixed map
pub struct StaticInterfaces(pub InterfaceMap);

impl StaticInterfaces {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), ddns_core::address::expand_ipv6(v)))
                .collect(),
        )
    }
}

impl InterfaceEnumerator for StaticInterfaces {
    fn interfaces(&self) -> Result<InterfaceMap> {
        Ok(self.0.clone())
    }
}

/// Relay client that records submissions
#[derive(Default)]
pub struct RecordingRelayClient {
    pub submissions: Mutex<Vec<(Enable, ResolvedAddress)>>,
}

impl RecordingRelayClient {
    pub fn submissions(&self) -> Vec<(Enable, ResolvedAddress)> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelayClient for RecordingRelayClient {
    async fn submit(&self, enable: Enable, address: &ResolvedAddress) -> Result<Vec<String>> {
        self.submissions
            .lock()
            .unwrap()
            .push((enable, address.clone()));
        Ok(vec!["center: accepted".to_string()])
    }
}

/// Target managing `www` (A) and `v6` (AAAA) under example.com
pub fn target() -> RecordTarget {
    RecordTarget::new("example.com", "www", "v6")
}
