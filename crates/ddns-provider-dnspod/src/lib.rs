// # DNSPod DNS Provider
//
// DNSPod adapter for the DDNS watchdog, speaking the legacy `dnsapi.cn`
// form API.
//
// ## Behavior
//
// - Authentication: `login_token=<id>,<token>` in every form body
// - Fetch: `Record.List` filtered by `sub_domain`, matched on `(name, type)`
// - Update: `Record.Modify` reusing the record's `line_id`
// - Success iff `status.code == "1"`; anything else becomes
//   `DNSPod: <code>: <message>`
//
// ## API Reference
//
// - https://docs.dnspod.cn/api/

use async_trait::async_trait;
use ddns_core::config::{DnspodConfig, ProviderConfig, RecordTarget, ServiceKind};
use ddns_core::traits::{DnsProvider, DnsProviderFactory, DnsRecord, RecordType};
use ddns_core::{Error, Result};
use serde::Deserialize;

const DNSPOD_API_BASE: &str = "https://dnsapi.cn";

const PROVIDER: &str = "DNSPod";

#[derive(Debug, Default, Deserialize)]
struct Status {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    record_type: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    line_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    status: Status,
    #[serde(default)]
    records: Vec<Record>,
}

impl ApiResponse {
    fn check(self) -> Result<Self> {
        if self.status.code != "1" {
            return Err(Error::provider(
                PROVIDER,
                format!("{}: {}", self.status.code, self.status.message),
            ));
        }
        Ok(self)
    }
}

/// DNSPod DNS provider
pub struct DnspodProvider {
    id: String,
    /// ⚠️ NEVER log this value
    token: String,
    target: RecordTarget,
    client: reqwest::Client,
}

impl std::fmt::Debug for DnspodProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnspodProvider")
            .field("id", &self.id)
            .field("token", &"<REDACTED>")
            .field("target", &self.target)
            .finish()
    }
}

impl DnspodProvider {
    /// Create a new DNSPod provider
    pub fn new(config: &DnspodConfig, client: reqwest::Client) -> Result<Self> {
        if config.id.is_empty() || config.token.is_empty() {
            return Err(Error::config("DNSPod id and token cannot be empty"));
        }

        Ok(Self {
            id: config.id.clone(),
            token: config.token.clone(),
            target: config.target.clone(),
            client,
        })
    }

    /// Parameters shared by every call
    fn common_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("login_token", format!("{},{}", self.id, self.token)),
            ("format", "json".to_string()),
            ("lang", "cn".to_string()),
            ("error_on_empty", "no".to_string()),
            ("domain", self.target.domain.clone()),
        ]
    }

    async fn post(&self, action: &str, params: Vec<(&'static str, String)>) -> Result<ApiResponse> {
        let url = format!("{}/{}", DNSPOD_API_BASE, action);

        let response = self
            .client
            .post(url)
            // dnsapi.cn requires a parenthesised contact part in the agent
            .header(reqwest::header::USER_AGENT, format!("{} ()", ddns_core::http::USER_AGENT))
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::provider(
                PROVIDER,
                format!("{} failed with HTTP status {}", action, status.as_u16()),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to read response: {}", e)))?;
        parse_response(&body)
    }
}

fn parse_response(body: &[u8]) -> Result<ApiResponse> {
    let response: ApiResponse = serde_json::from_slice(body)
        .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;
    response.check()
}

fn find_record(
    records: Vec<Record>,
    subdomain: &str,
    record_type: RecordType,
    fqdn: &str,
) -> Result<DnsRecord> {
    records
        .into_iter()
        .find(|r| r.name == subdomain && r.record_type == record_type.as_str())
        .filter(|r| !r.id.is_empty() && !r.line_id.is_empty())
        .map(|r| DnsRecord {
            id: r.id,
            context: r.line_id,
            value: r.value,
            record_type,
        })
        .ok_or_else(|| Error::RecordNotFound {
            provider: PROVIDER,
            name: fqdn.to_string(),
            record_type: record_type.as_str(),
        })
}

#[async_trait]
impl DnsProvider for DnspodProvider {
    async fn fetch_record(&self, subdomain: &str, record_type: RecordType) -> Result<DnsRecord> {
        let fqdn = self.target.fqdn(subdomain);
        tracing::debug!("Looking up record {} (type: {})", fqdn, record_type);

        let mut params = self.common_params();
        params.push(("sub_domain", subdomain.to_string()));

        let response = self.post("Record.List", params).await?;
        find_record(response.records, subdomain, record_type, &fqdn)
    }

    async fn update_record(&self, record: &DnsRecord, subdomain: &str, value: &str) -> Result<()> {
        let mut params = self.common_params();
        params.extend([
            ("record_id", record.id.clone()),
            ("sub_domain", subdomain.to_string()),
            ("record_type", record.record_type.as_str().to_string()),
            ("record_line_id", record.context.clone()),
            ("value", value.to_string()),
        ]);

        self.post("Record.Modify", params).await?;
        Ok(())
    }

    fn target(&self) -> &RecordTarget {
        &self.target
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating DNSPod providers
pub struct DnspodFactory {
    client: reqwest::Client,
}

impl DnspodFactory {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl DnsProviderFactory for DnspodFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Dnspod(config) => {
                Ok(Box::new(DnspodProvider::new(config, self.client.clone())?))
            }
            _ => Err(Error::config("Invalid config for DNSPod provider")),
        }
    }
}

/// Register the DNSPod provider with a registry
pub fn register(registry: &ddns_core::ProviderRegistry) -> Result<()> {
    let client = ddns_core::http::build_client()?;
    registry.register_provider(
        ServiceKind::Dnspod.as_str(),
        Box::new(DnspodFactory::new(client)),
    );
    Ok(())
}
