//! Contract Test: Change Detection
//!
//! Constraints verified:
//! - Only families that changed since the last cycle reach providers
//! - Forced cycles bypass change detection
//! - A cycle with nothing resolved touches neither state nor providers
//! - The last-known address is recorded even when the provider fails
//! - Relay mode submits the whole pair exactly once

mod common;

use common::*;
use ddns_core::traits::{DnsProvider, RecordType};
use ddns_core::{
    AddressResolver, CycleOutcome, Dispatch, Enable, LastKnownAddress, SyncDriver,
};
use std::sync::Arc;

fn driver(source: Arc<ScriptedIpSource>, provider: Arc<MockDnsProvider>) -> SyncDriver {
    let resolver = AddressResolver::new(Enable::both(), source);
    SyncDriver::new(resolver, Dispatch::Direct(vec![provider as Arc<dyn DnsProvider>]))
}

#[tokio::test]
async fn only_changed_family_triggers_provider_updates() {
    let source = Arc::new(ScriptedIpSource::new(Some("1.1.1.1"), Some("2001:db8::1")));
    let provider = Arc::new(
        MockDnsProvider::new("Mock", target())
            .with_record("www", RecordType::A, "9.9.9.9")
            .with_record("v6", RecordType::Aaaa, "2001:db8::ffff"),
    );
    let calls = provider.calls();
    let driver = driver(source, Arc::clone(&provider));

    let mut state = LastKnownAddress {
        ipv4: "1.1.1.1".to_string(),
        ipv6: String::new(),
    };
    let outcome = driver.check(&mut state, false).await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Dispatched(ref reports) if reports.len() == 1));
    assert_eq!(calls.fetch_count(), 1, "IPv4 is unchanged and must not be fetched");
    assert_eq!(
        calls.updated(),
        vec![("v6.example.com".to_string(), "2001:db8:0:0:0:0:0:1".to_string())]
    );
    assert_eq!(provider.value("www", RecordType::A).as_deref(), Some("9.9.9.9"));
    assert_eq!(state.ipv6, "2001:db8:0:0:0:0:0:1");
}

#[tokio::test]
async fn unchanged_address_ends_the_cycle() {
    let source = Arc::new(ScriptedIpSource::new(Some("1.1.1.1"), Some("2001:db8::1")));
    let provider = Arc::new(
        MockDnsProvider::new("Mock", target())
            .with_record("www", RecordType::A, "1.1.1.1")
            .with_record("v6", RecordType::Aaaa, "2001:db8::1"),
    );
    let calls = provider.calls();
    let driver = driver(source, provider);

    let mut state = LastKnownAddress::new();
    driver.check(&mut state, false).await.unwrap();
    assert_eq!(calls.fetch_count(), 2);

    let outcome = driver.check(&mut state, false).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Unchanged));
    assert_eq!(calls.fetch_count(), 2, "no provider call without a change");
}

#[tokio::test]
async fn forced_cycle_bypasses_change_detection() {
    let source = Arc::new(ScriptedIpSource::new(Some("1.1.1.1"), Some("2001:db8::1")));
    let provider = Arc::new(
        MockDnsProvider::new("Mock", target())
            .with_record("www", RecordType::A, "1.1.1.1")
            .with_record("v6", RecordType::Aaaa, "2001:db8:0:0:0:0:0:1"),
    );
    let calls = provider.calls();
    let driver = driver(source, provider);

    let mut state = LastKnownAddress {
        ipv4: "1.1.1.1".to_string(),
        ipv6: "2001:db8:0:0:0:0:0:1".to_string(),
    };
    let outcome = driver.check(&mut state, true).await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Dispatched(_)));
    assert_eq!(calls.fetch_count(), 2);
    assert_eq!(calls.update_count(), 0, "records already hold the address");
}

#[tokio::test]
async fn nothing_resolved_aborts_the_cycle() {
    let source = Arc::new(ScriptedIpSource::new(None, None));
    let provider = Arc::new(MockDnsProvider::new("Mock", target()));
    let calls = provider.calls();
    let driver = driver(Arc::clone(&source), provider);

    let mut state = LastKnownAddress {
        ipv4: "1.1.1.1".to_string(),
        ipv6: String::new(),
    };
    let outcome = driver.check(&mut state, true).await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Aborted));
    assert_eq!(source.lookup_count(), 2);
    assert_eq!(calls.fetch_count(), 0);
    assert_eq!(state.ipv4, "1.1.1.1");
}

#[tokio::test]
async fn malformed_ipv4_is_discarded_but_ipv6_proceeds() {
    let source = Arc::new(ScriptedIpSource::new(Some("2001:db8::7"), Some("2001:db8::1")));
    let provider = Arc::new(
        MockDnsProvider::new("Mock", target())
            .with_record("www", RecordType::A, "1.1.1.1")
            .with_record("v6", RecordType::Aaaa, "2001:db8::2"),
    );
    let calls = provider.calls();
    let driver = driver(source, provider);

    let mut state = LastKnownAddress::new();
    driver.check(&mut state, false).await.unwrap();

    assert_eq!(state.ipv4, "");
    assert_eq!(state.ipv6, "2001:db8:0:0:0:0:0:1");
    assert_eq!(calls.update_count(), 1);
}

#[tokio::test]
async fn state_is_recorded_before_a_failing_provider_runs() {
    let source = Arc::new(ScriptedIpSource::new(Some("203.0.113.7"), None));
    let provider = Arc::new(MockDnsProvider::failing("Broken", target()));
    let calls = provider.calls();
    let driver = driver(source, provider);

    let mut state = LastKnownAddress::new();
    let outcome = driver.check(&mut state, false).await.unwrap();
    match outcome {
        CycleOutcome::Dispatched(reports) => {
            assert!(!reports[0].is_success());
            assert!(reports[0].errors[0].to_string().starts_with("Broken: "));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(state.ipv4, "203.0.113.7");

    // Same address again: no second attempt for the same change.
    driver.check(&mut state, false).await.unwrap();
    assert_eq!(calls.fetch_count(), 1);
}

#[tokio::test]
async fn relay_mode_submits_the_pair_once() {
    let source = Arc::new(ScriptedIpSource::new(Some("203.0.113.7"), Some("2001:db8::1")));
    let relay = Arc::new(RecordingRelayClient::default());
    let resolver = AddressResolver::new(Enable::both(), source);
    let driver = SyncDriver::new(resolver, Dispatch::Relay(relay.clone()));

    let mut state = LastKnownAddress {
        ipv4: "203.0.113.7".to_string(),
        ipv6: String::new(),
    };
    let outcome = driver.check(&mut state, false).await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Relayed(Ok(_))));
    let submissions = relay.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0, Enable::both());
    assert_eq!(submissions[0].1.ipv4, "203.0.113.7");
    assert_eq!(submissions[0].1.ipv6, "2001:db8:0:0:0:0:0:1");
}
