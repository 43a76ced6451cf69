// # ddnsd - DDNS Watchdog Client
//
// Thin integration layer: reads configuration, wires the resolver, the
// providers (or the center client) and the sync driver together, then runs
// one check or a periodic loop. All DDNS logic lives in ddns-core.
//
// ## Configuration
//
// Process settings come from environment variables:
//
// - `DDNS_CONF_DIR`: directory holding `client.json` and the per-provider
//   files (default `conf`)
// - `DDNS_LOG_LEVEL`: trace, debug, info, warn or error (default info)
// - `DDNS_FORCE`: `1`/`true` pushes every resolved address on every cycle,
//   even when unchanged
//
// Everything else is read from `<DDNS_CONF_DIR>/client.json`. A
// `check_cycle_minutes` of zero or less runs a single check and exits.
//
// ## Example
//
// ```bash
// export DDNS_CONF_DIR=/etc/ddns-watchdog
// export DDNS_LOG_LEVEL=debug
//
// ddnsd
// ```

use anyhow::{Context, Result};
use ddns_core::config::{NETWORK_CARD_FILE, ProviderConfig, save_json};
use ddns_core::engine::{CycleOutcome, Dispatch, LastKnownAddress, SyncDriver};
use ddns_core::relay::CenterClient;
use ddns_core::{AddressResolver, ClientConfig, Error, ProviderRegistry};
use ddns_ip_http::LookupApiSource;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Process-level settings
#[derive(Debug)]
struct Settings {
    conf_dir: PathBuf,
    log_level: Level,
    force: bool,
}

impl Settings {
    /// Load settings from environment variables
    fn from_env() -> Result<Self> {
        let conf_dir = env::var("DDNS_CONF_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "conf".to_string());
        let log_level = env::var("DDNS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let force = env::var("DDNS_FORCE").unwrap_or_default();

        Ok(Self {
            conf_dir: PathBuf::from(conf_dir),
            log_level: parse_log_level(&log_level)?,
            force: parse_flag(&force)?,
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

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "" | "0" | "false" | "no" => Ok(false),
        "1" | "true" | "yes" => Ok(true),
        _ => anyhow::bail!("DDNS_FORCE '{}' is not a boolean", value),
    }
}

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting ddnsd {}", ddns_core::http::VERSION);

    let (config, driver) = match build(&settings) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(run(&settings, &config, &driver));
    match result {
        Ok(code) => code.into(),
        Err(e) => {
            if let Some(Error::NeedsInterfaceSelection(map)) = e.downcast_ref::<Error>() {
                return save_interface_map(&settings.conf_dir, map).into();
            }
            error!("Daemon error: {:#}", e);
            DdnsExitCode::RuntimeError.into()
        }
    }
}

/// Load `client.json` and assemble the sync driver
fn build(settings: &Settings) -> Result<(ClientConfig, SyncDriver)> {
    let config = ClientConfig::load(&settings.conf_dir)
        .with_context(|| format!("loading {}", settings.conf_dir.display()))?;
    let client = ddns_core::http::build_client()?;

    let lookup = Arc::new(LookupApiSource::new(&config.api_url, client.clone()));
    let mut resolver = AddressResolver::new(config.enable, lookup)
        .with_ipv6_fallback(config.enable_ipv6_fallback);
    if config.network_card.enable {
        resolver = with_network_card(resolver, &config)?;
    }

    let dispatch = if config.center.enable {
        info!("Forwarding updates through the center at {}", config.center.api_url);
        Dispatch::Relay(Arc::new(CenterClient::new(
            config.center.api_url.clone(),
            config.center.token.clone(),
            client,
        )))
    } else {
        let registry = ProviderRegistry::new();
        register_providers(&registry)?;

        let mut providers = Vec::new();
        for kind in config.enabled_services() {
            let provider_config = ProviderConfig::load(kind, &settings.conf_dir)
                .with_context(|| format!("loading {}", kind.config_file()))?;
            let provider = registry.create_provider(&provider_config)?;
            info!(
                "Managing {} records of {}",
                provider.provider_name(),
                provider_config.target().domain
            );
            providers.push(provider);
        }
        Dispatch::Direct(providers)
    };

    Ok((config, SyncDriver::new(resolver, dispatch)))
}

#[cfg(feature = "netcard")]
fn with_network_card(resolver: AddressResolver, config: &ClientConfig) -> Result<AddressResolver> {
    Ok(resolver.with_network_card(
        config.network_card.clone(),
        Arc::new(ddns_ip_netcard::IfAddrsEnumerator::new()),
    ))
}

#[cfg(not(feature = "netcard"))]
fn with_network_card(_resolver: AddressResolver, _config: &ClientConfig) -> Result<AddressResolver> {
    anyhow::bail!("network_card.enable is set but ddnsd was built without the netcard feature")
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

/// Run one check or the periodic loop
async fn run(settings: &Settings, config: &ClientConfig, driver: &SyncDriver) -> Result<DdnsExitCode> {
    let Some(period) = config.check_period()? else {
        let mut state = LastKnownAddress::new();
        let outcome = driver.check(&mut state, settings.force).await?;
        return Ok(exit_code_for(&outcome));
    };

    info!("Checking every {} minute(s)", config.check_cycle_minutes);
    driver.run_until(period, settings.force, shutdown_signal()).await?;

    info!("Shutting down daemon");
    Ok(DdnsExitCode::CleanShutdown)
}

/// Exit code of a single-shot run
fn exit_code_for(outcome: &CycleOutcome) -> DdnsExitCode {
    let failed = match outcome {
        CycleOutcome::Aborted => true,
        CycleOutcome::Unchanged => false,
        CycleOutcome::Relayed(result) => result.is_err(),
        CycleOutcome::Dispatched(reports) => reports.iter().any(|r| !r.errors.is_empty()),
    };
    if failed {
        DdnsExitCode::RuntimeError
    } else {
        DdnsExitCode::CleanShutdown
    }
}

/// Persist the enumerated interfaces so the operator can pick one
fn save_interface_map(conf_dir: &Path, map: &ddns_core::InterfaceMap) -> DdnsExitCode {
    let path = conf_dir.join(NETWORK_CARD_FILE);
    match save_json(&path, map) {
        Ok(()) => {
            warn!(
                "No network interface selected. {} interface addresses were written to {}; \
                copy the desired keys into network_card.ipv4 / network_card.ipv6 of client.json",
                map.len(),
                path.display()
            );
        }
        Err(e) => error!("Failed to write {}: {}", path.display(), e),
    }
    DdnsExitCode::ConfigError
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

/// Wait for Ctrl-C
#[cfg(not(unix))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to wait for CTRL-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddns_core::RunReport;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("warn").unwrap(), Level::WARN);
        assert!(parse_log_level("verbose").is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert!(!parse_flag("").unwrap());
        assert!(parse_flag("1").unwrap());
        assert!(parse_flag(" TRUE ").unwrap());
        assert!(parse_flag("sometimes").is_err());
    }

    #[test]
    fn test_single_shot_exit_codes() {
        assert_eq!(exit_code_for(&CycleOutcome::Unchanged), DdnsExitCode::CleanShutdown);
        assert_eq!(exit_code_for(&CycleOutcome::Aborted), DdnsExitCode::RuntimeError);
        assert_eq!(
            exit_code_for(&CycleOutcome::Relayed(Ok(vec!["ok".to_string()]))),
            DdnsExitCode::CleanShutdown
        );

        let failed = RunReport {
            provider: "DNSPod",
            errors: vec![Error::provider("DNSPod", "10002: token invalid")],
            ..Default::default()
        };
        assert_eq!(
            exit_code_for(&CycleOutcome::Dispatched(vec![RunReport::default(), failed])),
            DdnsExitCode::RuntimeError
        );
    }

    #[test]
    fn test_save_interface_map() {
        let dir = tempfile::tempdir().unwrap();
        let mut map = ddns_core::InterfaceMap::new();
        map.insert("eth0 0".to_string(), "10.0.0.1".to_string());

        assert_eq!(save_interface_map(dir.path(), &map), DdnsExitCode::ConfigError);

        let saved = std::fs::read_to_string(dir.path().join(NETWORK_CARD_FILE)).unwrap();
        assert!(saved.contains("eth0 0"));
    }
}
