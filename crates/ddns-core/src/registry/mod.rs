//! Plugin-based provider registry
//!
//! Provider crates register a factory under their service name, and both the
//! client daemon and the center build providers through the registry instead
//! of matching on the service kind themselves.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddns_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! ddns_provider_cloudflare::register(&registry);
//!
//! let config = ddns_core::ProviderConfig::load(ServiceKind::Cloudflare, conf_dir)?;
//! let provider = registry.create_provider(&config)?;
//! ```

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Provider registry for plugin-based DNS provider creation
///
/// Keys are service names as returned by [`ProviderConfig::type_name`].
/// Uses interior mutability with `RwLock`, so registration works through a
/// shared reference and lookups may run concurrently.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory
    ///
    /// A second registration under the same name replaces the first.
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        let name = name.into();
        match self.providers.write() {
            Ok(mut providers) => {
                providers.insert(name, factory);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(name, factory);
            }
        }
    }

    /// Create a DNS provider from configuration
    ///
    /// The configuration is validated before the factory sees it.
    ///
    /// # Returns
    ///
    /// - `Ok(Arc<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error)`: If the configuration is invalid, the provider type is
    ///   not registered, or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Arc<dyn DnsProvider>> {
        config.validate()?;

        let provider_type = config.type_name();
        let providers = self
            .providers
            .read()
            .map_err(|_| Error::Other("Provider registry lock poisoned".to_string()))?;

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config).map(Arc::from)
    }

    /// List all registered provider types, sorted
    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.providers.read() {
            Ok(providers) => providers.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        };
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        match self.providers.read() {
            Ok(providers) => providers.contains_key(name),
            Err(poisoned) => poisoned.into_inner().contains_key(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CloudflareConfig, RecordTarget};

    struct FailingFactory;

    impl DnsProviderFactory for FailingFactory {
        fn create(&self, _config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
            Err(Error::Other("Mock provider not implemented".to_string()))
        }
    }

    fn cloudflare_config(token: &str) -> ProviderConfig {
        ProviderConfig::Cloudflare(CloudflareConfig {
            zone_id: "zone".to_string(),
            api_token: token.to_string(),
            target: RecordTarget::new("example.com", "www", ""),
        })
    }

    #[test]
    fn test_registry_registration() {
        let registry = ProviderRegistry::new();
        assert!(!registry.has_provider("cloudflare"));

        registry.register_provider("cloudflare", Box::new(FailingFactory));

        assert!(registry.has_provider("cloudflare"));
        assert_eq!(registry.list_providers(), vec!["cloudflare".to_string()]);
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let registry = ProviderRegistry::new();
        let err = registry.create_provider(&cloudflare_config("t")).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_config_rejected_before_factory() {
        let registry = ProviderRegistry::new();
        registry.register_provider("cloudflare", Box::new(FailingFactory));

        let err = registry.create_provider(&cloudflare_config("")).err().unwrap();
        assert!(err.to_string().contains("api_token"));
    }
}
