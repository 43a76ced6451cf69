// # Lookup API Source
//
// Asks a "what is my IP" endpoint for the caller's address.
//
// ## Protocol
//
// `GET <url>` answers `200 {"ip": "<address>", "latest_version": "<tag>"}`.
// One URL per family: the IPv6 URL is expected to be reachable over IPv6
// only, so the server sees (and echoes) the caller's IPv6 address.
//
// A center server exposes the same endpoint, so this crate also provides
// the version query a non-root center uses to ask its root for the latest
// release tag.

use ddns_core::config::{ApiUrl, DEFAULT_IPV4_API_URL, DEFAULT_IPV6_API_URL};
use ddns_core::traits::{IpSource, IpVersion};
use ddns_core::{Error, LookupResponse, Result};

/// Lookup-API address source
#[derive(Debug, Clone)]
pub struct LookupApiSource {
    ipv4_url: String,
    ipv6_url: String,
    client: reqwest::Client,
}

impl LookupApiSource {
    /// Create a source; empty URLs fall back to the public defaults
    pub fn new(api_url: &ApiUrl, client: reqwest::Client) -> Self {
        let or_default = |url: &str, default: &str| {
            if url.trim().is_empty() {
                default.to_string()
            } else {
                url.trim().to_string()
            }
        };

        Self {
            ipv4_url: or_default(&api_url.ipv4, DEFAULT_IPV4_API_URL),
            ipv6_url: or_default(&api_url.ipv6, DEFAULT_IPV6_API_URL),
            client,
        }
    }

    /// URL queried for a family
    pub fn url(&self, version: IpVersion) -> &str {
        match version {
            IpVersion::V4 => &self.ipv4_url,
            IpVersion::V6 => &self.ipv6_url,
        }
    }
}

#[async_trait::async_trait]
impl IpSource for LookupApiSource {
    async fn lookup(&self, version: IpVersion) -> Result<String> {
        let url = self.url(version);
        tracing::debug!("Requesting {} address from {}", version.label(), url);

        let response = fetch(&self.client, url).await?;
        Ok(response.ip)
    }
}

/// Issue one lookup request and decode the answer
pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<LookupResponse> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::resolution(format!("request to {} failed: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::resolution(format!(
            "{} answered with status {}",
            url,
            status.as_u16()
        )));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| Error::resolution(format!("reading response from {} failed: {}", url, e)))?;
    parse_response(&body)
}

/// Ask a root center for the latest release tag
///
/// Never fails: the error text is folded into the tag as `N/A (<reason>)`.
pub async fn latest_version(client: &reqwest::Client, root_url: &str) -> String {
    match fetch(client, root_url).await {
        Ok(response) if !response.latest_version.is_empty() => response.latest_version,
        Ok(_) => "N/A (empty version from root server)".to_string(),
        Err(e) => {
            tracing::warn!("Failed to fetch latest version: {}", e);
            format!("N/A ({})", e)
        }
    }
}

fn parse_response(body: &[u8]) -> Result<LookupResponse> {
    serde_json::from_slice(body)
        .map_err(|e| Error::resolution(format!("invalid lookup response: {}", e)))
}
