// # Huawei Cloud DNS Provider
//
// Huawei Cloud DNS adapter for the DDNS watchdog.
//
// ## Behavior
//
// - Every request is signed with SDK-HMAC-SHA256 (AK/SK)
// - Fetch resolves the public zone of the configured domain first, then the
//   recordset by fully-qualified name; the zone id travels as record context
// - Update replaces the recordset's `records` with the single new value
// - Errors come as `{code, message}` or `{error_code, error_msg}`
//
// ## API Reference
//
// - List zones: GET `/v2/zones?type=public&name=<domain>.`
// - List recordsets: GET `/v2/zones/{zone_id}/recordsets?type=&name=<fqdn>.`
// - Update recordset: PUT `/v2/zones/{zone_id}/recordsets/{recordset_id}`

mod sign;

use async_trait::async_trait;
use ddns_core::config::{HuaweiCloudConfig, ProviderConfig, RecordTarget, ServiceKind};
use ddns_core::traits::{DnsProvider, DnsProviderFactory, DnsRecord, RecordType};
use ddns_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use sign::CanonicalRequest;

const HUAWEICLOUD_DNS_HOST: &str = "dns.myhuaweicloud.com";

const PROVIDER: &str = "HuaweiCloud";

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(alias = "error_code")]
    code: Option<String>,
    #[serde(alias = "error_msg")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ZoneList {
    #[serde(default)]
    zones: Vec<Zone>,
}

#[derive(Debug, Deserialize)]
struct Recordset {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    record_type: String,
    #[serde(default)]
    records: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RecordsetList {
    #[serde(default)]
    recordsets: Vec<Recordset>,
}

#[derive(Debug, Serialize)]
struct UpdateRecordset<'a> {
    name: String,
    #[serde(rename = "type")]
    record_type: &'a str,
    records: Vec<&'a str>,
}

/// Huawei Cloud DNS provider
pub struct HuaweiCloudProvider {
    access_key_id: String,
    /// ⚠️ NEVER log this value
    secret_access_key: String,
    target: RecordTarget,
    client: reqwest::Client,
}

impl std::fmt::Debug for HuaweiCloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuaweiCloudProvider")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<REDACTED>")
            .field("target", &self.target)
            .finish()
    }
}

/// Names in the Huawei API are absolute
fn absolute(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

impl HuaweiCloudProvider {
    /// Create a new Huawei Cloud provider
    pub fn new(config: &HuaweiCloudConfig, client: reqwest::Client) -> Result<Self> {
        if config.access_key_id.is_empty() || config.secret_access_key.is_empty() {
            return Err(Error::config("Huawei Cloud AK/SK cannot be empty"));
        }

        Ok(Self {
            access_key_id: config.access_key_id.clone(),
            secret_access_key: config.secret_access_key.clone(),
            target: config.target.clone(),
            client,
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
        payload: String,
    ) -> Result<T> {
        let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let headers = [
            ("Host", HUAWEICLOUD_DNS_HOST.to_string()),
            ("X-Sdk-Date", timestamp.clone()),
            ("Content-Type", "application/json".to_string()),
        ];

        let authorization = sign::authorization(
            &self.access_key_id,
            &self.secret_access_key,
            &CanonicalRequest {
                method: method.as_str(),
                path,
                query,
                headers: &headers,
                payload: &payload,
            },
            &timestamp,
        )?;

        let query_string = sign::canonical_query(query);
        let url = if query_string.is_empty() {
            format!("https://{}{}", HUAWEICLOUD_DNS_HOST, path)
        } else {
            format!("https://{}{}?{}", HUAWEICLOUD_DNS_HOST, path, query_string)
        };

        let mut builder = self
            .client
            .request(method, url)
            .header("X-Sdk-Date", &timestamp)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::AUTHORIZATION, authorization);
        if !payload.is_empty() {
            builder = builder.body(payload);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to read response: {}", e)))?;
        parse_body(status, &body)
    }

    async fn zone_id(&self) -> Result<String> {
        let domain = absolute(&self.target.domain);
        let zones: ZoneList = self
            .request(
                reqwest::Method::GET,
                "/v2/zones",
                &[("type", "public".to_string()), ("name", domain.clone())],
                String::new(),
            )
            .await?;
        pick_zone(zones, &domain)
    }
}

fn parse_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T> {
    if !(200..300).contains(&status) {
        let message = match serde_json::from_str::<ErrorResponse>(body) {
            Ok(ErrorResponse {
                code: Some(code),
                message,
            }) => format!("{}: {}", code, message.unwrap_or_default()),
            _ => format!("HTTP {}: {}", status, body),
        };
        return Err(Error::provider(PROVIDER, message));
    }

    serde_json::from_str(body)
        .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))
}

/// Zone lookup is a fuzzy match on the API side; insist on the exact name
fn pick_zone(zones: ZoneList, domain: &str) -> Result<String> {
    zones
        .zones
        .into_iter()
        .find(|z| z.name.eq_ignore_ascii_case(domain))
        .map(|z| z.id)
        .ok_or_else(|| Error::provider(PROVIDER, format!("public zone {} not found", domain)))
}

fn find_recordset(
    list: RecordsetList,
    zone_id: String,
    record_type: RecordType,
    fqdn: &str,
) -> Result<DnsRecord> {
    let name = absolute(fqdn);
    list.recordsets
        .into_iter()
        .find(|r| r.name.eq_ignore_ascii_case(&name) && r.record_type == record_type.as_str())
        .map(|r| DnsRecord {
            id: r.id,
            context: zone_id,
            value: r.records.into_iter().next().unwrap_or_default(),
            record_type,
        })
        .ok_or_else(|| Error::RecordNotFound {
            provider: PROVIDER,
            name: fqdn.to_string(),
            record_type: record_type.as_str(),
        })
}

fn update_payload(record: &DnsRecord, fqdn: &str, value: &str) -> Result<String> {
    Ok(serde_json::to_string(&UpdateRecordset {
        name: absolute(fqdn),
        record_type: record.record_type.as_str(),
        records: vec![value],
    })?)
}

#[async_trait]
impl DnsProvider for HuaweiCloudProvider {
    async fn fetch_record(&self, subdomain: &str, record_type: RecordType) -> Result<DnsRecord> {
        let fqdn = self.target.fqdn(subdomain);
        tracing::debug!("Looking up record {} (type: {})", fqdn, record_type);

        let zone_id = self.zone_id().await?;
        let path = format!("/v2/zones/{}/recordsets", zone_id);
        let list: RecordsetList = self
            .request(
                reqwest::Method::GET,
                &path,
                &[
                    ("type", record_type.as_str().to_string()),
                    ("name", absolute(&fqdn)),
                ],
                String::new(),
            )
            .await?;

        find_recordset(list, zone_id, record_type, &fqdn)
    }

    async fn update_record(&self, record: &DnsRecord, subdomain: &str, value: &str) -> Result<()> {
        let fqdn = self.target.fqdn(subdomain);
        let path = format!("/v2/zones/{}/recordsets/{}", record.context, record.id);

        let _: serde_json::Value = self
            .request(
                reqwest::Method::PUT,
                &path,
                &[],
                update_payload(record, &fqdn, value)?,
            )
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

/// Factory for creating Huawei Cloud providers
pub struct HuaweiCloudFactory {
    client: reqwest::Client,
}

impl HuaweiCloudFactory {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl DnsProviderFactory for HuaweiCloudFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::HuaweiCloud(config) => {
                Ok(Box::new(HuaweiCloudProvider::new(config, self.client.clone())?))
            }
            _ => Err(Error::config("Invalid config for Huawei Cloud provider")),
        }
    }
}

/// Register the Huawei Cloud provider with a registry
pub fn register(registry: &ddns_core::ProviderRegistry) -> Result<()> {
    let client = ddns_core::http::build_client()?;
    registry.register_provider(
        ServiceKind::HuaweiCloud.as_str(),
        Box::new(HuaweiCloudFactory::new(client)),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_names() {
        assert_eq!(absolute("example.com"), "example.com.");
        assert_eq!(absolute("example.com."), "example.com.");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = HuaweiCloudConfig {
            access_key_id: "test-ak".to_string(),
            secret_access_key: "test-sk-very-secret".to_string(),
            target: RecordTarget::new("example.com", "www", ""),
        };
        let provider = HuaweiCloudProvider::new(&config, reqwest::Client::new()).unwrap();
        assert!(!format!("{:?}", provider).contains("test-sk-very-secret"));
    }

    #[test]
    fn test_error_envelope_variants() {
        let err = parse_body::<serde_json::Value>(
            401,
            r#"{"code":"APIGW.0301","message":"Incorrect IAM authentication information"}"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "HuaweiCloud: APIGW.0301: Incorrect IAM authentication information"
        );

        let err = parse_body::<serde_json::Value>(
            400,
            r#"{"error_code":"DNS.0302","error_msg":"The record set already exists."}"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "HuaweiCloud: DNS.0302: The record set already exists.");

        let err = parse_body::<serde_json::Value>(503, "unavailable").unwrap_err();
        assert_eq!(err.to_string(), "HuaweiCloud: HTTP 503: unavailable");
    }

    #[test]
    fn test_pick_zone_requires_exact_name() {
        let zones: ZoneList = serde_json::from_str(
            r#"{"zones":[
                {"id":"z-sub","name":"sub.example.com."},
                {"id":"z-root","name":"example.com."}
            ]}"#,
        )
        .unwrap();
        assert_eq!(pick_zone(zones, "example.com.").unwrap(), "z-root");

        let empty: ZoneList = serde_json::from_str(r#"{"zones":[]}"#).unwrap();
        assert!(pick_zone(empty, "example.com.").is_err());
    }

    #[test]
    fn test_find_recordset_carries_zone() {
        let list: RecordsetList = serde_json::from_str(
            r#"{"recordsets":[
                {"id":"rs-6","name":"www.example.com.","type":"AAAA","records":["2001:db8::1"]},
                {"id":"rs-4","name":"www.example.com.","type":"A","records":["1.1.1.1"]}
            ]}"#,
        )
        .unwrap();
        let record =
            find_recordset(list, "z-root".to_string(), RecordType::A, "www.example.com").unwrap();

        assert_eq!(record.id, "rs-4");
        assert_eq!(record.context, "z-root");
        assert_eq!(record.value, "1.1.1.1");
    }

    #[test]
    fn test_update_payload() {
        let record = DnsRecord {
            id: "rs-4".to_string(),
            context: "z-root".to_string(),
            value: "1.1.1.1".to_string(),
            record_type: RecordType::A,
        };
        assert_eq!(
            update_payload(&record, "www.example.com", "203.0.113.9").unwrap(),
            r#"{"name":"www.example.com.","type":"A","records":["203.0.113.9"]}"#
        );
    }
}
