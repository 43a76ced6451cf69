//! Configuration types for the DDNS watchdog
//!
//! Every persisted setting lives in a JSON file under the configuration
//! directory. This module defines the shapes of those files, their
//! validation rules, and the helpers used to load and persist them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::address::Enable;
use crate::error::{Error, Result};

/// Default lookup endpoint for IPv4
pub const DEFAULT_IPV4_API_URL: &str = "https://yzyweb.cn/ddns-watchdog";

/// Default lookup endpoint for IPv6
pub const DEFAULT_IPV6_API_URL: &str = "https://yzyweb.cn/ddns-watchdog6";

/// Client settings file name
pub const CLIENT_CONFIG_FILE: &str = "client.json";

/// Server settings file name
pub const SERVER_CONFIG_FILE: &str = "server.json";

/// Server-side provider credentials file name
pub const SERVICES_CONFIG_FILE: &str = "services.json";

/// Center whitelist file name
pub const WHITELIST_FILE: &str = "whitelist.json";

/// Enumerated interfaces, written when no interface is selected
pub const NETWORK_CARD_FILE: &str = "network_card.json";

/// Subdomains managed for each record type
///
/// An empty value means the record type is not managed. `@` is the apex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subdomain {
    #[serde(default)]
    pub a: String,
    #[serde(default)]
    pub aaaa: String,
}

/// The `{domain, subdomain-A, subdomain-AAAA}` triple a provider manages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTarget {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub sub_domain: Subdomain,
}

impl RecordTarget {
    /// Create a target
    pub fn new(domain: impl Into<String>, a: impl Into<String>, aaaa: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            sub_domain: Subdomain {
                a: a.into(),
                aaaa: aaaa.into(),
            },
        }
    }

    /// Fully qualified name of `subdomain` under this domain
    pub fn fqdn(&self, subdomain: &str) -> String {
        if subdomain.is_empty() || subdomain == "@" {
            self.domain.clone()
        } else {
            format!("{}.{}", subdomain, self.domain)
        }
    }

    /// Validate the target
    pub fn validate(&self) -> Result<()> {
        if self.domain.is_empty() {
            return Err(Error::config("Domain cannot be empty"));
        }
        if self.sub_domain.a.is_empty() && self.sub_domain.aaaa.is_empty() {
            return Err(Error::config(format!(
                "No subdomain configured for {}, set sub_domain.a or sub_domain.aaaa",
                self.domain
            )));
        }
        Ok(())
    }
}

/// The supported DNS services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Dnspod,
    Alidns,
    Cloudflare,
    HuaweiCloud,
}

impl ServiceKind {
    /// All services, in dispatch order
    pub const ALL: [ServiceKind; 4] = [
        ServiceKind::Dnspod,
        ServiceKind::Alidns,
        ServiceKind::Cloudflare,
        ServiceKind::HuaweiCloud,
    ];

    /// Lowercase identifier used in config files and the registry
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Dnspod => "dnspod",
            ServiceKind::Alidns => "alidns",
            ServiceKind::Cloudflare => "cloudflare",
            ServiceKind::HuaweiCloud => "huaweicloud",
        }
    }

    /// Name used as the prefix of log lines and errors
    pub fn display_name(self) -> &'static str {
        match self {
            ServiceKind::Dnspod => "DNSPod",
            ServiceKind::Alidns => "AliDNS",
            ServiceKind::Cloudflare => "Cloudflare",
            ServiceKind::HuaweiCloud => "HuaweiCloud",
        }
    }

    /// The client-side settings file for this service
    pub fn config_file(self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        ServiceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lower)
            .ok_or_else(|| Error::config(format!("Unknown service: {}", s)))
    }
}

fn require(value: &str, what: &str, service: ServiceKind) -> Result<()> {
    if value.is_empty() {
        return Err(Error::config(format!(
            "{} {} cannot be empty",
            service.display_name(),
            what
        )));
    }
    Ok(())
}

/// DNSPod credentials and target (`dnspod.json`)
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DnspodConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub token: String,
    #[serde(flatten)]
    pub target: RecordTarget,
}

/// AliDNS credentials and target (`alidns.json`)
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AlidnsConfig {
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub access_key_secret: String,
    #[serde(flatten)]
    pub target: RecordTarget,
}

/// Cloudflare credentials and target (`cloudflare.json`)
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CloudflareConfig {
    #[serde(default)]
    pub zone_id: String,
    #[serde(default)]
    pub api_token: String,
    #[serde(flatten)]
    pub target: RecordTarget,
}

/// Huawei Cloud credentials and target (`huaweicloud.json`)
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct HuaweiCloudConfig {
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(flatten)]
    pub target: RecordTarget,
}

// Credentials never reach Debug output.
macro_rules! redacted_debug {
    ($ty:ident, $public:ident, $secret:ident) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field(stringify!($public), &self.$public)
                    .field(stringify!($secret), &"<REDACTED>")
                    .field("target", &self.target)
                    .finish()
            }
        }
    };
}

redacted_debug!(DnspodConfig, id, token);
redacted_debug!(AlidnsConfig, access_key_id, access_key_secret);
redacted_debug!(CloudflareConfig, zone_id, api_token);
redacted_debug!(HuaweiCloudConfig, access_key_id, secret_access_key);

/// Provider configuration, polymorphic over the supported services
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Dnspod(DnspodConfig),
    Alidns(AlidnsConfig),
    Cloudflare(CloudflareConfig),
    HuaweiCloud(HuaweiCloudConfig),
}

impl ProviderConfig {
    /// Load `<dir>/<service>.json`
    pub fn load(kind: ServiceKind, dir: &Path) -> Result<Self> {
        let path = dir.join(kind.config_file());
        let config = match kind {
            ServiceKind::Dnspod => ProviderConfig::Dnspod(load_json(&path)?),
            ServiceKind::Alidns => ProviderConfig::Alidns(load_json(&path)?),
            ServiceKind::Cloudflare => ProviderConfig::Cloudflare(load_json(&path)?),
            ServiceKind::HuaweiCloud => ProviderConfig::HuaweiCloud(load_json(&path)?),
        };
        config.validate()?;
        Ok(config)
    }

    /// Which service this configuration is for
    pub fn kind(&self) -> ServiceKind {
        match self {
            ProviderConfig::Dnspod(_) => ServiceKind::Dnspod,
            ProviderConfig::Alidns(_) => ServiceKind::Alidns,
            ProviderConfig::Cloudflare(_) => ServiceKind::Cloudflare,
            ProviderConfig::HuaweiCloud(_) => ServiceKind::HuaweiCloud,
        }
    }

    /// Get the provider type name (registry key)
    pub fn type_name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// The record target
    pub fn target(&self) -> &RecordTarget {
        match self {
            ProviderConfig::Dnspod(c) => &c.target,
            ProviderConfig::Alidns(c) => &c.target,
            ProviderConfig::Cloudflare(c) => &c.target,
            ProviderConfig::HuaweiCloud(c) => &c.target,
        }
    }

    /// Validate credentials and target
    pub fn validate(&self) -> Result<()> {
        let kind = self.kind();
        match self {
            ProviderConfig::Dnspod(c) => {
                require(&c.id, "id", kind)?;
                require(&c.token, "token", kind)?;
            }
            ProviderConfig::Alidns(c) => {
                require(&c.access_key_id, "access_key_id", kind)?;
                require(&c.access_key_secret, "access_key_secret", kind)?;
            }
            ProviderConfig::Cloudflare(c) => {
                require(&c.zone_id, "zone_id", kind)?;
                require(&c.api_token, "api_token", kind)?;
            }
            ProviderConfig::HuaweiCloud(c) => {
                require(&c.access_key_id, "access_key_id", kind)?;
                require(&c.secret_access_key, "secret_access_key", kind)?;
            }
        }
        self.target().validate().map_err(|e| match e {
            Error::Config(msg) => Error::config(format!("{}: {}", kind.display_name(), msg)),
            other => other,
        })
    }
}

/// Lookup API endpoints per family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiUrl {
    #[serde(default = "default_ipv4_url")]
    pub ipv4: String,
    #[serde(default = "default_ipv6_url")]
    pub ipv6: String,
}

impl Default for ApiUrl {
    fn default() -> Self {
        Self {
            ipv4: default_ipv4_url(),
            ipv6: default_ipv6_url(),
        }
    }
}

fn default_ipv4_url() -> String {
    DEFAULT_IPV4_API_URL.to_string()
}

fn default_ipv6_url() -> String {
    DEFAULT_IPV6_API_URL.to_string()
}

/// Network-card mode: read addresses from named local interfaces
///
/// Names are interface map keys (`"eth0 0"`). A family with an empty name
/// keeps using the lookup API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCard {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub ipv4: String,
    #[serde(default)]
    pub ipv6: String,
}

/// Which providers the client updates directly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Services {
    #[serde(default)]
    pub dnspod: bool,
    #[serde(default)]
    pub alidns: bool,
    #[serde(default)]
    pub cloudflare: bool,
    #[serde(default)]
    pub huaweicloud: bool,
}

impl Services {
    /// Whether `kind` is enabled
    pub fn is_enabled(&self, kind: ServiceKind) -> bool {
        match kind {
            ServiceKind::Dnspod => self.dnspod,
            ServiceKind::Alidns => self.alidns,
            ServiceKind::Cloudflare => self.cloudflare,
            ServiceKind::HuaweiCloud => self.huaweicloud,
        }
    }
}

/// Relay mode settings
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CenterConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub token: String,
}

impl fmt::Debug for CenterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CenterConfig")
            .field("enable", &self.enable)
            .field("api_url", &self.api_url)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

/// Client settings (`client.json`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api_url: ApiUrl,
    #[serde(default)]
    pub enable: Enable,
    #[serde(default)]
    pub enable_ipv6_fallback: bool,
    #[serde(default)]
    pub network_card: NetworkCard,
    #[serde(default)]
    pub services: Services,
    #[serde(default)]
    pub center: CenterConfig,
    /// Minutes between checks; zero or negative runs a single check
    #[serde(default)]
    pub check_cycle_minutes: i64,
}

/// Longest accepted check cycle
pub const MAX_CHECK_CYCLE_MINUTES: i64 = 365 * 24 * 60;

impl ClientConfig {
    /// Load `<dir>/client.json`
    pub fn load(dir: &Path) -> Result<Self> {
        let config: ClientConfig = load_json(&dir.join(CLIENT_CONFIG_FILE))?;
        config.validate()?;
        Ok(config)
    }

    /// Time between checks, `None` for a single check
    pub fn check_period(&self) -> Result<Option<Duration>> {
        if self.check_cycle_minutes <= 0 {
            return Ok(None);
        }
        if self.check_cycle_minutes > MAX_CHECK_CYCLE_MINUTES {
            return Err(Error::config(format!(
                "check_cycle_minutes {} exceeds {} (one year)",
                self.check_cycle_minutes, MAX_CHECK_CYCLE_MINUTES
            )));
        }

        u64::try_from(self.check_cycle_minutes)
            .ok()
            .and_then(|minutes| minutes.checked_mul(60))
            .map(|secs| Some(Duration::from_secs(secs)))
            .ok_or_else(|| Error::config("check_cycle_minutes is out of range"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.check_period()?;

        if !self.enable.ipv4 && !self.enable.ipv6 {
            return Err(Error::config("Neither IPv4 nor IPv6 is enabled"));
        }

        if self.center.enable {
            if self.center.api_url.is_empty() {
                return Err(Error::config("Center mode requires center.api_url"));
            }
            if self.center.token.is_empty() {
                return Err(Error::config("Center mode requires center.token"));
            }
            return Ok(());
        }

        if self.enabled_services().is_empty() {
            return Err(Error::config("No DNS service enabled"));
        }

        Ok(())
    }

    /// Services the client updates directly, in dispatch order
    pub fn enabled_services(&self) -> Vec<ServiceKind> {
        ServiceKind::ALL
            .into_iter()
            .filter(|kind| self.services.is_enabled(*kind))
            .collect()
    }
}

/// Center route paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default = "default_get_ip_route")]
    pub get_ip: String,
    #[serde(default = "default_center_route")]
    pub center: String,
}

impl Default for Route {
    fn default() -> Self {
        Self {
            get_ip: default_get_ip_route(),
            center: default_center_route(),
        }
    }
}

fn default_get_ip_route() -> String {
    "/".to_string()
}

fn default_center_route() -> String {
    "/center".to_string()
}

/// HTTPS listener settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub enable: bool,
    /// PEM certificate chain
    #[serde(default)]
    pub cert_file: String,
    /// PEM private key
    #[serde(default)]
    pub key_file: String,
}

/// Center server settings (`server.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_addr")]
    pub server_addr: String,
    #[serde(default)]
    pub is_root_server: bool,
    #[serde(default = "default_ipv4_url")]
    pub root_server_url: String,
    /// Mount the relay route; off means the center only answers lookups
    #[serde(default = "default_center_service")]
    pub center_service: bool,
    #[serde(default)]
    pub route: Route,
    #[serde(default)]
    pub tls: TlsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: default_server_addr(),
            is_root_server: false,
            root_server_url: default_ipv4_url(),
            center_service: default_center_service(),
            route: Route::default(),
            tls: TlsConfig::default(),
        }
    }
}

fn default_server_addr() -> String {
    ":10032".to_string()
}

fn default_center_service() -> bool {
    true
}

impl ServerConfig {
    /// Load `<dir>/server.json`
    pub fn load(dir: &Path) -> Result<Self> {
        let config: ServerConfig = load_json(&dir.join(SERVER_CONFIG_FILE))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for path in [&self.route.get_ip, &self.route.center] {
            if !path.starts_with('/') {
                return Err(Error::config(format!("Route must start with '/': {:?}", path)));
            }
        }
        if self.route.get_ip == self.route.center {
            return Err(Error::config("route.get_ip and route.center must differ"));
        }
        if !self.is_root_server && self.root_server_url.is_empty() {
            return Err(Error::config("A non-root server needs root_server_url"));
        }
        if self.tls.enable && (self.tls.cert_file.is_empty() || self.tls.key_file.is_empty()) {
            return Err(Error::config("tls.enable needs cert_file and key_file"));
        }
        Ok(())
    }

    /// Bind address; a bare `:port` listens on every interface
    pub fn bind_addr(&self) -> String {
        if self.server_addr.starts_with(':') {
            format!("0.0.0.0{}", self.server_addr)
        } else {
            self.server_addr.clone()
        }
    }
}

/// Server-held DNSPod credentials
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DnspodCredentials {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub token: String,
}

/// Server-held AliDNS credentials
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AlidnsCredentials {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub access_key_secret: String,
}

/// Server-held Cloudflare credentials
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CloudflareCredentials {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub zone_id: String,
    #[serde(default)]
    pub api_token: String,
}

/// Server-held Huawei Cloud credentials
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct HuaweiCloudCredentials {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
}

/// Provider credentials the center uses on behalf of clients (`services.json`)
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ServiceCredentials {
    #[serde(default)]
    pub dnspod: DnspodCredentials,
    #[serde(default)]
    pub alidns: AlidnsCredentials,
    #[serde(default)]
    pub cloudflare: CloudflareCredentials,
    #[serde(default)]
    pub huawei_cloud: HuaweiCloudCredentials,
}

impl fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("dnspod", &self.dnspod.enable)
            .field("alidns", &self.alidns.enable)
            .field("cloudflare", &self.cloudflare.enable)
            .field("huawei_cloud", &self.huawei_cloud.enable)
            .finish()
    }
}

impl ServiceCredentials {
    /// Load `<dir>/services.json`
    pub fn load(dir: &Path) -> Result<Self> {
        load_json(&dir.join(SERVICES_CONFIG_FILE))
    }

    /// Whether the center serves `kind`
    pub fn is_enabled(&self, kind: ServiceKind) -> bool {
        match kind {
            ServiceKind::Dnspod => self.dnspod.enable,
            ServiceKind::Alidns => self.alidns.enable,
            ServiceKind::Cloudflare => self.cloudflare.enable,
            ServiceKind::HuaweiCloud => self.huawei_cloud.enable,
        }
    }

    /// Build the provider configuration for a relayed request
    ///
    /// Credentials come from this file, the target from the whitelist entry.
    pub fn provider_config(&self, kind: ServiceKind, target: RecordTarget) -> Result<ProviderConfig> {
        if !self.is_enabled(kind) {
            return Err(Error::config(format!(
                "{} is not enabled on this server",
                kind.display_name()
            )));
        }

        let config = match kind {
            ServiceKind::Dnspod => ProviderConfig::Dnspod(DnspodConfig {
                id: self.dnspod.id.clone(),
                token: self.dnspod.token.clone(),
                target,
            }),
            ServiceKind::Alidns => ProviderConfig::Alidns(AlidnsConfig {
                access_key_id: self.alidns.access_key_id.clone(),
                access_key_secret: self.alidns.access_key_secret.clone(),
                target,
            }),
            ServiceKind::Cloudflare => ProviderConfig::Cloudflare(CloudflareConfig {
                zone_id: self.cloudflare.zone_id.clone(),
                api_token: self.cloudflare.api_token.clone(),
                target,
            }),
            ServiceKind::HuaweiCloud => ProviderConfig::HuaweiCloud(HuaweiCloudConfig {
                access_key_id: self.huawei_cloud.access_key_id.clone(),
                secret_access_key: self.huawei_cloud.secret_access_key.clone(),
                target,
            }),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Read and parse a JSON file
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read(path)
        .map_err(|e| Error::config(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_slice(&data)
        .map_err(|e| Error::config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write `value` as pretty JSON, replacing the file atomically
///
/// The parent directory is created if missing. On Unix the file is only
/// readable by its owner, since most of these files hold credentials.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let data = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
    }

    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fqdn() {
        let target = RecordTarget::new("example.com", "www", "@");
        assert_eq!(target.fqdn("www"), "www.example.com");
        assert_eq!(target.fqdn("@"), "example.com");
        assert_eq!(target.fqdn(""), "example.com");
    }

    #[test]
    fn test_target_requires_a_subdomain() {
        assert!(RecordTarget::new("example.com", "", "").validate().is_err());
        assert!(RecordTarget::new("", "www", "").validate().is_err());
        assert!(RecordTarget::new("example.com", "", "v6").validate().is_ok());
    }

    #[test]
    fn test_service_kind_parse() {
        assert_eq!("DNSPod".parse::<ServiceKind>().unwrap(), ServiceKind::Dnspod);
        assert_eq!(
            "HuaweiCloud".parse::<ServiceKind>().unwrap(),
            ServiceKind::HuaweiCloud
        );
        assert!("route53".parse::<ServiceKind>().is_err());
        assert_eq!(
            serde_json::to_string(&ServiceKind::HuaweiCloud).unwrap(),
            "\"huaweicloud\""
        );
    }

    #[test]
    fn test_provider_config_validation() {
        let config = ProviderConfig::Dnspod(DnspodConfig {
            id: "12345".to_string(),
            token: String::new(),
            target: RecordTarget::new("example.com", "www", ""),
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("DNSPod token"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = CloudflareConfig {
            zone_id: "zone".to_string(),
            api_token: "very-secret".to_string(),
            target: RecordTarget::new("example.com", "www", ""),
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("<REDACTED>"));
    }

    #[test]
    fn test_client_config_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"enable":{"ipv4":true},"services":{"cloudflare":true}}"#,
        )
        .unwrap();
        assert_eq!(config.api_url.ipv4, DEFAULT_IPV4_API_URL);
        assert_eq!(config.api_url.ipv6, DEFAULT_IPV6_API_URL);
        assert_eq!(config.enabled_services(), vec![ServiceKind::Cloudflare]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_client_config_center_mode_needs_token() {
        let mut config = ClientConfig {
            enable: Enable::both(),
            ..Default::default()
        };
        config.center.enable = true;
        config.center.api_url = "https://center.example.com/center".to_string();
        assert!(config.validate().is_err());

        config.center.token = "abc".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_check_period_bounds() {
        let mut config = ClientConfig {
            enable: Enable::both(),
            services: Services {
                dnspod: true,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(config.check_period().unwrap(), None);

        config.check_cycle_minutes = 5;
        assert_eq!(config.check_period().unwrap(), Some(Duration::from_secs(300)));

        config.check_cycle_minutes = i64::MAX;
        assert!(config.check_period().is_err());
        assert!(config.validate().is_err());

        config.check_cycle_minutes = MAX_CHECK_CYCLE_MINUTES;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_file_flattens_target() {
        let config: DnspodConfig = serde_json::from_str(
            r#"{"id":"1","token":"t","domain":"example.com","sub_domain":{"a":"www","aaaa":""}}"#,
        )
        .unwrap();
        assert_eq!(config.target.domain, "example.com");
        assert_eq!(config.target.sub_domain.a, "www");
    }

    #[test]
    fn test_server_bind_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:10032");
        assert_eq!(config.route.get_ip, "/");
        assert_eq!(config.route.center, "/center");
    }

    #[test]
    fn test_server_tls_and_center_toggle() {
        let config: ServerConfig = serde_json::from_str(r#"{"is_root_server":true}"#).unwrap();
        assert!(config.center_service);
        assert!(!config.tls.enable);

        let config: ServerConfig = serde_json::from_str(
            r#"{"is_root_server":true,"center_service":false,"tls":{"enable":true,"cert_file":"cert.pem"}}"#,
        )
        .unwrap();
        assert!(!config.center_service);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("key_file"));
    }

    #[test]
    fn test_relay_provider_config_needs_enabled_service() {
        let mut services = ServiceCredentials::default();
        let target = RecordTarget::new("example.com", "home", "");
        assert!(services.provider_config(ServiceKind::Alidns, target.clone()).is_err());

        services.alidns = AlidnsCredentials {
            enable: true,
            access_key_id: "id".to_string(),
            access_key_secret: "secret".to_string(),
        };
        let config = services.provider_config(ServiceKind::Alidns, target).unwrap();
        assert_eq!(config.kind(), ServiceKind::Alidns);
        assert_eq!(config.target().sub_domain.a, "home");
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SERVER_CONFIG_FILE);
        save_json(&path, &ServerConfig::default()).unwrap();

        let loaded: ServerConfig = load_json(&path).unwrap();
        assert_eq!(loaded.server_addr, ":10032");
        assert!(!path.with_extension("json.tmp").exists());
    }
}
