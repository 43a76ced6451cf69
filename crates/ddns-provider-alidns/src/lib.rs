// # AliDNS Provider
//
// Alibaba Cloud DNS adapter for the DDNS watchdog.
//
// ## Behavior
//
// - RPC-style API: every parameter travels in the query string of an
//   empty-bodied POST, signed with ACS3-HMAC-SHA256
// - Fetch: `DescribeSubDomainRecords` with `SubDomain=<fqdn>` and `Type`
// - Update: `UpdateDomainRecord` reusing the fetched record's `Line`
// - Any `{Code, Message}` envelope is an error, whatever the HTTP status
//
// ## Security Requirements
//
// - AccessKey secret NEVER appears in logs or Debug output
//
// ## API Reference
//
// - https://www.alibabacloud.com/help/en/dns/api-alidns-2015-01-09-dir-parsing-records

mod sign;

use std::collections::BTreeMap;

use async_trait::async_trait;
use ddns_core::config::{AlidnsConfig, ProviderConfig, RecordTarget, ServiceKind};
use ddns_core::traits::{DnsProvider, DnsProviderFactory, DnsRecord, RecordType};
use ddns_core::{Error, Result};
use serde::Deserialize;
use serde_json::Value;

use sign::{EMPTY_BODY_SHA256, SigningInput};

const ALIDNS_HOST: &str = "alidns.aliyuncs.com";
const ALIDNS_VERSION: &str = "2015-01-09";

const PROVIDER: &str = "AliDNS";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Record {
    #[serde(default)]
    record_id: String,
    #[serde(rename = "RR", default)]
    rr: String,
    #[serde(rename = "Type", default)]
    record_type: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    line: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DomainRecords {
    #[serde(default)]
    record: Vec<Record>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeSubDomainRecordsResponse {
    #[serde(default)]
    domain_records: DomainRecords,
}

/// AliDNS provider
pub struct AlidnsProvider {
    access_key_id: String,
    /// ⚠️ NEVER log this value
    access_key_secret: String,
    target: RecordTarget,
    client: reqwest::Client,
}

impl std::fmt::Debug for AlidnsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlidnsProvider")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<REDACTED>")
            .field("target", &self.target)
            .finish()
    }
}

impl AlidnsProvider {
    /// Create a new AliDNS provider
    pub fn new(config: &AlidnsConfig, client: reqwest::Client) -> Result<Self> {
        if config.access_key_id.is_empty() || config.access_key_secret.is_empty() {
            return Err(Error::config("AliDNS AccessKey id and secret cannot be empty"));
        }

        Ok(Self {
            access_key_id: config.access_key_id.clone(),
            access_key_secret: config.access_key_secret.clone(),
            target: config.target.clone(),
            client,
        })
    }

    async fn call(&self, action: &str, params: &BTreeMap<&str, String>) -> Result<Value> {
        let query = sign::canonical_query(params);
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let nonce = uuid::Uuid::new_v4().to_string();

        let authorization = sign::authorization(
            &self.access_key_id,
            &self.access_key_secret,
            &query,
            &SigningInput {
                host: ALIDNS_HOST,
                action,
                version: ALIDNS_VERSION,
                timestamp: &timestamp,
                nonce: &nonce,
            },
        )?;

        let url = if query.is_empty() {
            format!("https://{}/", ALIDNS_HOST)
        } else {
            format!("https://{}/?{}", ALIDNS_HOST, query)
        };

        let response = self
            .client
            .post(url)
            .header("x-acs-action", action)
            .header("x-acs-version", ALIDNS_VERSION)
            .header("x-acs-date", &timestamp)
            .header("x-acs-signature-nonce", &nonce)
            .header("x-acs-content-sha256", EMPTY_BODY_SHA256)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to read response: {}", e)))?;
        parse_body(action, status, &body)
    }
}

/// Turn a raw response into JSON, surfacing the `{Code, Message}` envelope
fn parse_body(action: &str, status: u16, body: &str) -> Result<Value> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) if status >= 400 => {
            return Err(Error::provider(
                PROVIDER,
                format!("{} failed: HTTP {} - {}", action, status, body),
            ));
        }
        Err(e) => {
            return Err(Error::provider(PROVIDER, format!("Failed to parse response: {}", e)));
        }
    };

    if let (Some(code), Some(message)) = (value["Code"].as_str(), value["Message"].as_str()) {
        return Err(Error::provider(PROVIDER, format!("{}: {}", code, message)));
    }
    if status >= 400 {
        return Err(Error::provider(
            PROVIDER,
            format!("{} failed: HTTP {} - {}", action, status, body),
        ));
    }
    Ok(value)
}

fn find_record(value: Value, subdomain: &str, record_type: RecordType, fqdn: &str) -> Result<DnsRecord> {
    let response: DescribeSubDomainRecordsResponse = serde_json::from_value(value)
        .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse records: {}", e)))?;

    response
        .domain_records
        .record
        .into_iter()
        .find(|r| r.rr == subdomain && r.record_type == record_type.as_str() && !r.record_id.is_empty())
        .map(|r| DnsRecord {
            id: r.record_id,
            context: r.line,
            value: r.value,
            record_type,
        })
        .ok_or_else(|| Error::RecordNotFound {
            provider: PROVIDER,
            name: fqdn.to_string(),
            record_type: record_type.as_str(),
        })
}

fn update_params(record: &DnsRecord, subdomain: &str, value: &str) -> BTreeMap<&'static str, String> {
    let mut params = BTreeMap::new();
    params.insert("RecordId", record.id.clone());
    params.insert("RR", subdomain.to_string());
    params.insert("Type", record.record_type.as_str().to_string());
    params.insert("Value", value.to_string());
    if !record.context.is_empty() {
        params.insert("Line", record.context.clone());
    }
    params
}

#[async_trait]
impl DnsProvider for AlidnsProvider {
    async fn fetch_record(&self, subdomain: &str, record_type: RecordType) -> Result<DnsRecord> {
        let fqdn = self.target.fqdn(subdomain);
        tracing::debug!("Looking up record {} (type: {})", fqdn, record_type);

        let mut params = BTreeMap::new();
        params.insert("SubDomain", fqdn.clone());
        params.insert("Type", record_type.as_str().to_string());

        let value = self.call("DescribeSubDomainRecords", &params).await?;
        find_record(value, subdomain, record_type, &fqdn)
    }

    async fn update_record(&self, record: &DnsRecord, subdomain: &str, value: &str) -> Result<()> {
        self.call("UpdateDomainRecord", &update_params(record, subdomain, value))
            .await?;
        Ok(())
    }

    fn target(&self) -> &RecordTarget {
        &self.target
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating AliDNS providers
pub struct AlidnsFactory {
    client: reqwest::Client,
}

impl AlidnsFactory {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl DnsProviderFactory for AlidnsFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Alidns(config) => {
                Ok(Box::new(AlidnsProvider::new(config, self.client.clone())?))
            }
            _ => Err(Error::config("Invalid config for AliDNS provider")),
        }
    }
}

/// Register the AliDNS provider with a registry
pub fn register(registry: &ddns_core::ProviderRegistry) -> Result<()> {
    let client = ddns_core::http::build_client()?;
    registry.register_provider(
        ServiceKind::Alidns.as_str(),
        Box::new(AlidnsFactory::new(client)),
    );
    Ok(())
}
