//! HTTP surface of the center
//!
//! Two routes, both configurable through `server.json`:
//!
//! - lookup (`GET`, default `/`): echoes the caller's address and a version hint
//! - relay (`POST`, default `/center`): authorizes a [`CenterRequest`] and
//!   replays it against the whitelisted provider configuration
//!
//! Any other method on either route answers 405. With `center_service` off
//! the relay route is not mounted at all. Every response carries
//! `Cache-Control: no-cache`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::header::{CACHE_CONTROL, HeaderValue};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::map_response;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use ddns_core::config::{Route, ServerConfig};
use ddns_core::relay::client_ip;
use ddns_core::{CenterRequest, LookupResponse, RelayService};
use tracing::{debug, warn};

/// Where the lookup endpoint gets its version hint from
#[derive(Debug, Clone)]
pub enum VersionHint {
    /// Answer with this server's own version
    Local(String),
    /// Ask the root center on every lookup
    Root { url: String, client: reqwest::Client },
}

impl VersionHint {
    pub fn from_config(config: &ServerConfig, client: reqwest::Client) -> Self {
        if config.is_root_server {
            VersionHint::Local(ddns_core::http::VERSION.to_string())
        } else {
            VersionHint::Root {
                url: config.root_server_url.clone(),
                client,
            }
        }
    }

    async fn resolve(&self) -> String {
        match self {
            VersionHint::Local(version) => version.clone(),
            VersionHint::Root { url, client } => ddns_ip_http::latest_version(client, url).await,
        }
    }
}

/// Shared handler state
pub struct AppState {
    pub relay: RelayService,
    pub version: VersionHint,
}

/// Build the router for `route`, mounting the relay only if `center_service`
pub fn router(state: Arc<AppState>, route: &Route, center_service: bool) -> Router {
    let mut router = Router::new().route(&route.get_ip, get(lookup));
    if center_service {
        router = router.route(&route.center, post(relay));
    }
    router
        .layer(map_response(no_cache))
        .with_state(state)
}

async fn no_cache(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn lookup(
    State(state): State<Arc<AppState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<LookupResponse> {
    let ip = client_ip(
        header(&headers, "X-Forwarded-For"),
        header(&headers, "X-Real-IP"),
        &remote.to_string(),
    );
    debug!("Lookup from {}", ip);

    Json(LookupResponse {
        ip,
        latest_version: state.version.resolve().await,
    })
}

async fn relay(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: CenterRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Malformed relay request: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match state.relay.handle(&request).await {
        Ok(response) => Json(response).into_response(),
        Err(rejection) => {
            warn!("Relay request rejected: {}", rejection.error());
            StatusCode::from_u16(rejection.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ddns_core::config::{DnspodCredentials, RecordTarget, ServiceCredentials, ServiceKind};
    use ddns_core::relay::WhitelistEntry;
    use ddns_core::traits::{DnsProvider, DnsProviderFactory, DnsRecord, RecordType};
    use ddns_core::{GeneralResponse, ProviderRegistry, Result, Whitelist};
    use ddns_core::config::ProviderConfig;

    const TOKEN: &str = "Zq8pL2mX9vR4tY7wK3nB6cD1fG5hJ0sA";

    struct StaticProvider {
        target: RecordTarget,
    }

    #[async_trait]
    impl DnsProvider for StaticProvider {
        async fn fetch_record(&self, _subdomain: &str, record_type: RecordType) -> Result<DnsRecord> {
            Ok(DnsRecord {
                id: "1".to_string(),
                context: "0".to_string(),
                value: "198.51.100.1".to_string(),
                record_type,
            })
        }

        async fn update_record(&self, _record: &DnsRecord, _subdomain: &str, _value: &str) -> Result<()> {
            Ok(())
        }

        fn target(&self) -> &RecordTarget {
            &self.target
        }

        fn provider_name(&self) -> &'static str {
            "DNSPod"
        }
    }

    struct StaticFactory;

    impl DnsProviderFactory for StaticFactory {
        fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
            Ok(Box::new(StaticProvider {
                target: config.target().clone(),
            }))
        }
    }

    async fn spawn(route: Route, center_service: bool) -> String {
        let registry = ProviderRegistry::new();
        registry.register_provider(ServiceKind::Dnspod.as_str(), Box::new(StaticFactory));

        let whitelist = Whitelist::in_memory([(
            TOKEN.to_string(),
            WhitelistEntry {
                enable: true,
                description: "lab".to_string(),
                service: ServiceKind::Dnspod,
                domain_record: RecordTarget::new("example.com", "lab", "lab"),
            },
        )]);
        let services = ServiceCredentials {
            dnspod: DnspodCredentials {
                enable: true,
                id: "1".to_string(),
                token: "server-secret".to_string(),
            },
            ..Default::default()
        };

        let state = Arc::new(AppState {
            relay: RelayService::new(Arc::new(whitelist), Arc::new(registry), services),
            version: VersionHint::Local("v9.9.9".to_string()),
        });
        let app = router(state, &route, center_service);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_lookup_echoes_caller() {
        let base = spawn(Route::default(), true).await;
        let client = reqwest::Client::new();

        let response = client.get(format!("{}/", base)).send().await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()[CACHE_CONTROL], "no-cache");
        let body: LookupResponse = response.json().await.unwrap();
        assert_eq!(body.ip, "127.0.0.1");
        assert_eq!(body.latest_version, "v9.9.9");

        let forwarded: LookupResponse = client
            .get(format!("{}/", base))
            .header("X-Forwarded-For", "2001:db8::7, 10.0.0.1")
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(forwarded.ip, "2001:db8:0:0:0:0:0:7");
    }

    #[tokio::test]
    async fn test_wrong_methods_are_rejected() {
        let base = spawn(Route::default(), true).await;
        let client = reqwest::Client::new();

        let response = client.post(format!("{}/", base)).send().await.unwrap();
        assert_eq!(response.status(), 405);

        let response = client.get(format!("{}/center", base)).send().await.unwrap();
        assert_eq!(response.status(), 405);
    }

    #[tokio::test]
    async fn test_relay_statuses() {
        let route = Route {
            get_ip: "/ip".to_string(),
            center: "/relay".to_string(),
        };
        let base = spawn(route, true).await;
        let client = reqwest::Client::new();
        let url = format!("{}/relay", base);

        let request = |token: &str| {
            serde_json::json!({
                "token": token,
                "enable": {"ipv4": true, "ipv6": false},
                "ip": {"ipv4": "203.0.113.50", "ipv6": ""}
            })
        };

        let ok = client.post(&url).json(&request(TOKEN)).send().await.unwrap();
        assert_eq!(ok.status(), 200);
        assert_eq!(ok.headers()[CACHE_CONTROL], "no-cache");
        let body: GeneralResponse = ok.json().await.unwrap();
        assert!(body.message.contains("lab.example.com"));

        let unknown = client.post(&url).json(&request("nope")).send().await.unwrap();
        assert_eq!(unknown.status(), 403);

        let oversized = client
            .post(&url)
            .json(&request(&"x".repeat(128)))
            .send()
            .await
            .unwrap();
        assert_eq!(oversized.status(), 403);

        let garbage = client.post(&url).body("not json").send().await.unwrap();
        assert_eq!(garbage.status(), 500);
        assert!(garbage.bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_relay_route_can_be_switched_off() {
        let base = spawn(Route::default(), false).await;
        let client = reqwest::Client::new();

        let relay = client
            .post(format!("{}/center", base))
            .json(&serde_json::json!({"token": TOKEN}))
            .send()
            .await
            .unwrap();
        assert_eq!(relay.status(), 404);

        let lookup = client.get(format!("{}/", base)).send().await.unwrap();
        assert_eq!(lookup.status(), 200);
    }
}
