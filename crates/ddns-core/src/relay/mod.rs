//! Center relay protocol
//!
//! A center server updates DNS records on behalf of remote clients. Clients
//! authenticate with an opaque token; the token's whitelist entry names the
//! service and record target, and the server's own credentials are used to
//! run the ordinary [`DnsProvider`](crate::DnsProvider) contract.
//!
//! - Wire types: [`CenterRequest`], [`GeneralResponse`], [`LookupResponse`]
//! - [`Whitelist`]: token lookup with atomically swapped snapshots
//! - [`RelayService`]: authorizes and replays a request
//! - [`RelayClient`]: the client side of the protocol

pub mod client;
pub mod client_ip;
pub mod service;
pub mod whitelist;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::{Enable, ResolvedAddress};

pub use client::{CenterClient, RelayClient};
pub use client_ip::client_ip;
pub use service::{RelayRejection, RelayService};
pub use whitelist::{UpsertStatus, Whitelist, WhitelistEntry};

/// Longest token the center accepts, in bytes
pub const MAX_TOKEN_LEN: usize = 127;

/// Body of `POST <center route>`
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CenterRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub enable: Enable,
    #[serde(default)]
    pub ip: ResolvedAddress,
}

impl fmt::Debug for CenterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CenterRequest")
            .field("token", &"<REDACTED>")
            .field("enable", &self.enable)
            .field("ip", &self.ip)
            .finish()
    }
}

/// Generic `{message}` response body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralResponse {
    #[serde(default)]
    pub message: String,
}

/// Body of the "what is my IP" endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub latest_version: String,
}
