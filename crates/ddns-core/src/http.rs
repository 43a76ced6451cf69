//! Shared outbound HTTP policy
//!
//! Every request this workspace sends (lookup API, provider APIs, center) goes
//! through a client built here.

use std::fmt::Write;
use std::time::Duration;

use crate::error::{Error, Result};

/// Version reported by the lookup endpoint and the User-Agent
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent sent on every outbound request
pub const USER_AGENT: &str = concat!("ddns-watchdog/", env!("CARGO_PKG_VERSION"));

/// Overall per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection establishment timeout
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build an HTTP client with the shared policy
///
/// TLS 1.2 minimum, 30 s timeout, and no idle connection pool: cycles are
/// minutes apart, so a pooled connection would most likely be stale.
pub fn build_client() -> Result<reqwest::Client> {
    build_client_with_agent(USER_AGENT)
}

/// Same as [`build_client`] with a custom User-Agent
pub fn build_client_with_agent(user_agent: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .min_tls_version(reqwest::tls::Version::TLS_1_2)
        .pool_max_idle_per_host(0)
        .build()
        .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))
}

/// RFC 3986 percent-encoding, unreserved characters kept as-is
pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}
