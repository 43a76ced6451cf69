// # Cloudflare DNS Provider
//
// Cloudflare adapter for the DDNS watchdog.
//
// ## Behavior
//
// - Bearer token authentication, zone id taken from configuration
// - One request per call: a list query to fetch, a PUT to update
// - `ttl` and `proxied` of the fetched record are preserved on update
// - HTTP status and the `{success, errors}` envelope are both checked
// - No retries, no caching: the next cycle re-fetches
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=...&name=...`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ddns_core::config::{CloudflareConfig, ProviderConfig, RecordTarget, ServiceKind};
use ddns_core::traits::{DnsProvider, DnsProviderFactory, DnsRecord, RecordType};
use ddns_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

const PROVIDER: &str = "Cloudflare";

/// Record settings carried from fetch to update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct RecordSettings {
    ttl: u64,
    proxied: bool,
}

/// Cloudflare DNS provider
///
/// Isolated and stateless beyond a single request.
pub struct CloudflareProvider {
    /// ⚠️ NEVER log this value
    api_token: String,
    zone_id: String,
    target: RecordTarget,
    client: reqwest::Client,
}

impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("target", &self.target)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the token or zone id is empty.
    pub fn new(config: &CloudflareConfig, client: reqwest::Client) -> Result<Self> {
        if config.api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }
        if config.zone_id.is_empty() {
            return Err(Error::config("Cloudflare zone id cannot be empty"));
        }

        Ok(Self {
            api_token: config.api_token.clone(),
            zone_id: config.zone_id.clone(),
            target: config.target.clone(),
            client,
        })
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", CLOUDFLARE_API_BASE, self.zone_id)
    }

    async fn send(&self, request: reqwest::RequestBuilder, action: &str) -> Result<Value> {
        let response = request
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status.as_u16(), &error_text, action));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;
        check_envelope(&json)?;
        Ok(json)
    }
}

/// Map an HTTP failure to a provider error
fn status_error(status: u16, body: &str, action: &str) -> Error {
    let message = match status {
        401 | 403 => format!(
            "Authentication failed: Invalid API token or insufficient permissions. Status: {}",
            status
        ),
        409 => format!("Conflict: Record is being updated concurrently. Status: {}", status),
        429 => format!("Rate limit exceeded. Status: {}", status),
        500..=599 => format!("Cloudflare server error: {} - {}", status, body),
        _ => format!("{} failed: {} - {}", action, status, body),
    };
    Error::provider(PROVIDER, message)
}

/// Reject `{"success": false, "errors": [...]}` envelopes
fn check_envelope(json: &Value) -> Result<()> {
    if json["success"].as_bool() == Some(false) {
        let detail = json["errors"]
            .as_array()
            .map(|errors| {
                errors
                    .iter()
                    .map(|e| format!("{}: {}", e["code"], e["message"].as_str().unwrap_or_default()))
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or_default();
        return Err(Error::provider(PROVIDER, format!("API error: {}", detail)));
    }
    Ok(())
}

/// Pick the first record matching `(fqdn, type)` from a list response
fn parse_record(json: &Value, fqdn: &str, record_type: RecordType) -> Result<DnsRecord> {
    let records = json["result"].as_array().ok_or_else(|| {
        Error::provider(PROVIDER, "Invalid response format: result is not an array")
    })?;

    let record = records
        .iter()
        .find(|r| {
            r["name"].as_str().is_some_and(|n| n.eq_ignore_ascii_case(fqdn))
                && r["type"].as_str() == Some(record_type.as_str())
        })
        .ok_or_else(|| Error::RecordNotFound {
            provider: PROVIDER,
            name: fqdn.to_string(),
            record_type: record_type.as_str(),
        })?;

    let id = record["id"].as_str().ok_or_else(|| {
        Error::provider(PROVIDER, "Invalid response format: record.id is not a string")
    })?;

    let settings = RecordSettings {
        ttl: record["ttl"].as_u64().unwrap_or(1),
        proxied: record["proxied"].as_bool().unwrap_or(false),
    };

    Ok(DnsRecord {
        id: id.to_string(),
        context: serde_json::to_string(&settings)?,
        value: record["content"].as_str().unwrap_or_default().to_string(),
        record_type,
    })
}

/// Body of the update request
///
/// `ttl` and `proxied` come from the fetched record's context, which must parse.
fn update_payload(record: &DnsRecord, fqdn: &str, value: &str) -> Result<Value> {
    let settings: RecordSettings = serde_json::from_str(&record.context).map_err(|e| {
        Error::provider(
            PROVIDER,
            format!("Record {} carries unreadable settings: {}", record.id, e),
        )
    })?;

    Ok(serde_json::json!({
        "type": record.record_type.as_str(),
        "name": fqdn,
        "content": value,
        "ttl": settings.ttl,
        "proxied": settings.proxied,
    }))
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// ```http
    /// GET /zones/:zone_id/dns_records?type=A&name=www.example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn fetch_record(&self, subdomain: &str, record_type: RecordType) -> Result<DnsRecord> {
        let fqdn = self.target.fqdn(subdomain);
        tracing::debug!("Looking up record {} (type: {})", fqdn, record_type);

        let request = self
            .client
            .get(self.records_url())
            .query(&[("type", record_type.as_str()), ("name", fqdn.as_str())]);
        let json = self.send(request, "Record lookup").await?;

        parse_record(&json, &fqdn, record_type)
    }

    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// {"type": "A", "name": "...", "content": "1.2.3.4", "ttl": 1, "proxied": false}
    /// ```
    async fn update_record(&self, record: &DnsRecord, subdomain: &str, value: &str) -> Result<()> {
        let fqdn = self.target.fqdn(subdomain);
        let url = format!("{}/{}", self.records_url(), record.id);

        let payload = update_payload(record, &fqdn, value)?;
        let request = self.client.put(url).json(&payload);
        self.send(request, "Record update").await?;

        Ok(())
    }

    fn target(&self) -> &RecordTarget {
        &self.target
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory {
    client: reqwest::Client,
}

impl CloudflareFactory {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare(config) => Ok(Box::new(CloudflareProvider::new(
                config,
                self.client.clone(),
            )?)),
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust,no_run
/// use ddns_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// ddns_provider_cloudflare::register(&registry).unwrap();
/// ```
pub fn register(registry: &ddns_core::ProviderRegistry) -> Result<()> {
    let client = ddns_core::http::build_client()?;
    registry.register_provider(
        ServiceKind::Cloudflare.as_str(),
        Box::new(CloudflareFactory::new(client)),
    );
    Ok(())
}
