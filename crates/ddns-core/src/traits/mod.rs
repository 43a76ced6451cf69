//! Core traits for the DDNS watchdog
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpSource`]: Look up the caller's address from a remote service
//! - [`InterfaceEnumerator`]: List local interface addresses
//! - [`DnsProvider`]: Fetch and update DNS records via provider APIs

pub mod dns_provider;
pub mod ip_source;

pub use dns_provider::{DnsProvider, DnsProviderFactory, DnsRecord, RecordType, RunReport};
pub use ip_source::{InterfaceEnumerator, IpSource, IpVersion};
