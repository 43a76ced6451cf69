//! Server side of the center relay

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ServiceCredentials;
use crate::error::Error;
use crate::registry::ProviderRegistry;
use crate::relay::{CenterRequest, GeneralResponse, Whitelist};

/// Why a relay request was refused
///
/// Only the status code reaches the HTTP caller; the error is for the log.
#[derive(Debug)]
pub enum RelayRejection {
    /// Token oversized, unknown, or disabled
    Forbidden(Error),
    /// Configuration or provider failure
    Internal(Error),
}

impl RelayRejection {
    /// HTTP status code for this rejection
    pub fn status_code(&self) -> u16 {
        match self {
            RelayRejection::Forbidden(_) => 403,
            RelayRejection::Internal(_) => 500,
        }
    }

    /// The underlying error
    pub fn error(&self) -> &Error {
        match self {
            RelayRejection::Forbidden(e) | RelayRejection::Internal(e) => e,
        }
    }
}

/// Authorizes relay requests and runs the provider contract for them
pub struct RelayService {
    whitelist: Arc<Whitelist>,
    registry: Arc<ProviderRegistry>,
    services: ServiceCredentials,
}

impl RelayService {
    pub fn new(
        whitelist: Arc<Whitelist>,
        registry: Arc<ProviderRegistry>,
        services: ServiceCredentials,
    ) -> Self {
        Self {
            whitelist,
            registry,
            services,
        }
    }

    /// The whitelist consulted for every request
    pub fn whitelist(&self) -> &Arc<Whitelist> {
        &self.whitelist
    }

    /// Handle one `{token, enable, ip}` report
    ///
    /// No provider is created, let alone called, unless the token is
    /// authorized. The provider runs with this server's credentials and the
    /// whitelist entry's record target.
    pub async fn handle(&self, req: &CenterRequest) -> Result<GeneralResponse, RelayRejection> {
        let entry = self
            .whitelist
            .authorize(&req.token)
            .map_err(RelayRejection::Forbidden)?;

        let config = self
            .services
            .provider_config(entry.service, entry.domain_record.clone())
            .map_err(RelayRejection::Internal)?;
        let provider = self
            .registry
            .create_provider(&config)
            .map_err(RelayRejection::Internal)?;

        let report = provider.run(req.enable, &req.ip.ipv4, &req.ip.ipv6).await;

        for message in &report.messages {
            info!("{} ({})", message, entry.description);
        }
        if !report.is_success() {
            for error in &report.errors {
                warn!("Relay for {} failed: {}", entry.description, error);
            }
            let detail = report
                .errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RelayRejection::Internal(Error::Other(detail)));
        }

        let message = if report.messages.is_empty() {
            format!(
                "{}: {} records already up to date, no change",
                report.provider, entry.domain_record.domain
            )
        } else {
            report.messages.join("\n")
        };

        Ok(GeneralResponse { message })
    }
}
