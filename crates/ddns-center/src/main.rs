// # ddns-center - DDNS Watchdog Center
//
// Serves the lookup endpoint and the token-authorized update relay, and
// administers the whitelist of relay tokens.
//
// ## Configuration
//
// - `DDNS_CONF_DIR`: directory holding `server.json`, `services.json` and
//   `whitelist.json` (default `conf`)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn or error (default info)
// - `DDNS_CENTER_ADDR`: overrides `server_addr` of `server.json`
//
// `server.json` may switch the relay off (`center_service`) and serve HTTPS
// from PEM files (`tls.enable`, `tls.cert_file`, `tls.key_file`).
//
// ## Usage
//
// ```bash
// ddns-center                      # serve
// ddns-center add -g --service dnspod --domain example.com --a home
// ddns-center remove -t <token>
// ```

mod opts;
mod server;

use anyhow::{Context, Result};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use ddns_core::config::{Route, ServerConfig, ServiceCredentials, TlsConfig, WHITELIST_FILE};
use ddns_core::{ProviderRegistry, RelayService, Whitelist};
use opts::{Action, AddArgs};
use server::{AppState, VersionHint};
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes, same convention as ddnsd
#[derive(Debug, Clone, Copy)]
enum CenterExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<CenterExitCode> for ExitCode {
    fn from(code: CenterExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

struct Settings {
    conf_dir: PathBuf,
    log_level: Level,
    addr_override: Option<String>,
}

impl Settings {
    fn from_env() -> Result<Self> {
        let conf_dir = env::var("DDNS_CONF_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "conf".to_string());
        let log_level = env::var("DDNS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            conf_dir: PathBuf::from(conf_dir),
            log_level: parse_log_level(&log_level)?,
            addr_override: env::var("DDNS_CENTER_ADDR").ok().filter(|s| !s.is_empty()),
        })
    }
}

fn parse_log_level(value: &str) -> Result<Level> {
    match value.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "DDNS_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            value
        ),
    }
}

fn main() -> ExitCode {
    let action = match opts::parse_clap() {
        Ok(action) => action,
        Err(e) => {
            eprintln!("{}", e);
            return CenterExitCode::ConfigError.into();
        }
    };

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return CenterExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.log_level)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return CenterExitCode::ConfigError.into();
    }

    let whitelist_path = settings.conf_dir.join(WHITELIST_FILE);
    match action {
        Action::Add(args) => admin(add_entry(&whitelist_path, args)),
        Action::Remove { token } => admin(remove_entry(&whitelist_path, &token)),
        Action::Serve => serve_main(&settings),
    }
}

fn admin(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => CenterExitCode::CleanShutdown.into(),
        Err(e) => {
            error!("{:#}", e);
            CenterExitCode::ConfigError.into()
        }
    }
}

fn add_entry(path: &Path, args: AddArgs) -> Result<()> {
    let whitelist = Whitelist::load(path)?;
    let token = args
        .token
        .unwrap_or_else(|| Whitelist::generate_token(args.length));

    let status = whitelist.add(
        &token,
        &args.description,
        &args.service,
        &args.domain,
        &args.a,
        &args.aaaa,
    )?;
    info!("{} token {} in {}", status.as_str(), token, path.display());
    Ok(())
}

fn remove_entry(path: &Path, token: &str) -> Result<()> {
    let whitelist = Whitelist::load(path)?;
    match whitelist.remove(token)? {
        Some(entry) => info!("Removed token of {} ({})", entry.description, entry.service),
        None => warn!("Token not found in {}", path.display()),
    }
    Ok(())
}

/// Everything `serve` needs, assembled from the conf dir
struct Listener {
    addr: String,
    route: Route,
    center_service: bool,
    tls: TlsConfig,
}

fn serve_main(settings: &Settings) -> ExitCode {
    let (listener, state) = match build(settings) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return CenterExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return CenterExitCode::RuntimeError.into();
        }
    };

    match rt.block_on(serve(listener, state)) {
        Ok(()) => CenterExitCode::CleanShutdown.into(),
        Err(e) => {
            error!("Server error: {:#}", e);
            CenterExitCode::RuntimeError.into()
        }
    }
}

fn build(settings: &Settings) -> Result<(Listener, Arc<AppState>)> {
    let dir = &settings.conf_dir;
    let config = ServerConfig::load(dir).with_context(|| format!("loading {}", dir.display()))?;
    let services = ServiceCredentials::load(dir)?;
    let whitelist = Whitelist::load(dir.join(WHITELIST_FILE))?;
    info!("Loaded {} whitelist entries", whitelist.len());

    let registry = ProviderRegistry::new();
    register_providers(&registry)?;

    let client = ddns_core::http::build_client()?;
    let state = AppState {
        relay: RelayService::new(Arc::new(whitelist), Arc::new(registry), services),
        version: VersionHint::from_config(&config, client),
    };

    let listener = Listener {
        addr: settings
            .addr_override
            .clone()
            .unwrap_or_else(|| config.bind_addr()),
        route: config.route,
        center_service: config.center_service,
        tls: config.tls,
    };
    Ok((listener, Arc::new(state)))
}

fn register_providers(registry: &ProviderRegistry) -> Result<()> {
    #[cfg(feature = "dnspod")]
    ddns_provider_dnspod::register(registry)?;
    #[cfg(feature = "alidns")]
    ddns_provider_alidns::register(registry)?;
    #[cfg(feature = "cloudflare")]
    ddns_provider_cloudflare::register(registry)?;
    #[cfg(feature = "huaweicloud")]
    ddns_provider_huaweicloud::register(registry)?;

    info!("Registered providers: {}", registry.list_providers().join(", "));
    Ok(())
}

async fn serve(listener: Listener, state: Arc<AppState>) -> Result<()> {
    let Listener {
        addr,
        route,
        center_service,
        tls,
    } = listener;
    let app = server::router(state, &route, center_service);
    let relay = if center_service {
        route.center.as_str()
    } else {
        "disabled"
    };

    if tls.enable {
        let config = rustls_config(&tls).await?;
        let socket = tokio::net::lookup_host(&addr)
            .await
            .with_context(|| format!("resolving {}", addr))?
            .next()
            .with_context(|| format!("{} resolves to no address", addr))?;

        let handle = Handle::new();
        tokio::spawn({
            let handle = handle.clone();
            async move {
                shutdown_signal().await;
                handle.graceful_shutdown(Some(Duration::from_secs(10)));
            }
        });

        info!(
            "Listening on https://{} (lookup {}, relay {})",
            socket, route.get_ip, relay
        );
        axum_server::bind_rustls(socket, config)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .with_context(|| format!("serving {}", socket))?;
    } else {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding {}", addr))?;

        info!(
            "Listening on http://{} (lookup {}, relay {})",
            addr, route.get_ip, relay
        );
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    }

    info!("Center stopped");
    Ok(())
}

async fn rustls_config(tls: &TlsConfig) -> Result<RustlsConfig> {
    RustlsConfig::from_pem_file(&tls.cert_file, &tls.key_file)
        .await
        .with_context(|| format!("loading TLS files {} and {}", tls.cert_file, tls.key_file))
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn shutdown_signal() {
    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to set up signal handlers ({}), falling back to Ctrl-C", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to wait for CTRL-C: {}", e);
        std::future::pending::<()>().await;
    }
}
