// # ddns-core
//
// Core library for the DDNS watchdog.
//
// ## Architecture Overview
//
// This library provides the core functionality for keeping A/AAAA records
// pointed at the caller's current public address:
// - **AddressResolver**: Determines the current IPv4/IPv6, from a lookup API
//   (`IpSource`) or from a local network interface (`InterfaceEnumerator`)
// - **DnsProvider**: Uniform contract every DNS provider adapter implements;
//   the shared `run` algorithm fetches, compares and updates records
// - **SyncDriver**: One check cycle: change detection against the last-known
//   address, then fan-out to providers or a single submission to the center
// - **RelayService**: Center-side protocol that authorizes a token against the
//   whitelist and replays the provider contract on the client's behalf
// - **ProviderRegistry**: Plugin-based registry for DNS providers
//
// ## Data Flow
//
// ```text
// AddressResolver ──► SyncDriver ──┬──► DnsProvider (one task per provider)
//                                  └──► RelayClient ──► RelayService ──► DnsProvider
// ```

pub mod address;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod registry;
pub mod relay;
pub mod traits;

// Re-export core types for convenience
pub use address::{AddressResolver, Enable, InterfaceMap, Resolution, ResolvedAddress};
pub use config::{ClientConfig, ProviderConfig, RecordTarget, ServiceKind, Subdomain};
pub use engine::{CycleOutcome, Dispatch, LastKnownAddress, SyncDriver};
pub use error::{Error, Result};
pub use registry::ProviderRegistry;
pub use relay::{CenterRequest, GeneralResponse, LookupResponse, RelayService, Whitelist};
pub use traits::{DnsProvider, DnsRecord, InterfaceEnumerator, IpSource, IpVersion, RecordType, RunReport};
