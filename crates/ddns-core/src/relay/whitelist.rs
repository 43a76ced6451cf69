//! Center whitelist
//!
//! Readers get a consistent snapshot through `ArcSwap` without locking.
//! Administrative writers serialize on a mutex, build a modified copy,
//! persist it, and only then swap it in, so a failed write never changes
//! what the relay sees.

use arc_swap::ArcSwap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::config::{RecordTarget, ServiceKind, load_json, save_json};
use crate::error::{Error, Result};
use crate::relay::MAX_TOKEN_LEN;

/// Description stored when none is given on insert
const DEFAULT_DESCRIPTION: &str = "undefined";

/// One authorized client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub description: String,
    pub service: ServiceKind,
    #[serde(default)]
    pub domain_record: RecordTarget,
}

/// Whether [`Whitelist::add`] created or modified an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStatus {
    Insert,
    Update,
}

impl UpsertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UpsertStatus::Insert => "INSERT",
            UpsertStatus::Update => "UPDATE",
        }
    }
}

type Entries = BTreeMap<String, WhitelistEntry>;

/// Token-keyed whitelist
pub struct Whitelist {
    snapshot: ArcSwap<Entries>,
    writer: Mutex<()>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Whitelist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Whitelist")
            .field("entries", &self.len())
            .field("path", &self.path)
            .finish()
    }
}

impl Whitelist {
    /// Load a whitelist file; a missing file is an empty whitelist
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries: Entries = if path.exists() {
            load_json(&path)?
        } else {
            info!("Whitelist {} does not exist, starting empty", path.display());
            Entries::new()
        };

        Ok(Self {
            snapshot: ArcSwap::from_pointee(entries),
            writer: Mutex::new(()),
            path: Some(path),
        })
    }

    /// A whitelist that is never persisted
    pub fn in_memory(entries: impl IntoIterator<Item = (String, WhitelistEntry)>) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(entries.into_iter().collect()),
            writer: Mutex::new(()),
            path: None,
        }
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of entries in the current snapshot
    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up an entry regardless of its enable flag
    pub fn get(&self, token: &str) -> Option<WhitelistEntry> {
        self.snapshot.load().get(token).cloned()
    }

    /// Authorize a relay token
    ///
    /// Fails if the token is oversized, unknown, or disabled. The error
    /// message is for the server log only.
    pub fn authorize(&self, token: &str) -> Result<WhitelistEntry> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(Error::relay_auth(format!(
                "token is {} bytes, limit is {}",
                token.len(),
                MAX_TOKEN_LEN
            )));
        }

        match self.snapshot.load().get(token) {
            Some(entry) if entry.enable => Ok(entry.clone()),
            Some(entry) => Err(Error::relay_auth(format!(
                "{} is disabled",
                entry.description
            ))),
            None => Err(Error::relay_auth("unknown token")),
        }
    }

    /// Insert or update the entry for `token`
    ///
    /// An update only overwrites the non-empty inputs. An insert requires a
    /// domain and a service, defaults the description to `"undefined"` and
    /// the AAAA subdomain to the A subdomain. At least one of `a`/`aaaa` is
    /// always required.
    pub fn add(
        &self,
        token: &str,
        description: &str,
        service: &str,
        domain: &str,
        a: &str,
        aaaa: &str,
    ) -> Result<UpsertStatus> {
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Err(Error::config(format!(
                "Token must be 1 to {} bytes",
                MAX_TOKEN_LEN
            )));
        }
        let service = if service.is_empty() {
            None
        } else {
            Some(service.parse::<ServiceKind>()?)
        };
        if a.is_empty() && aaaa.is_empty() {
            return Err(Error::config("No record specified, set a subdomain for A or AAAA"));
        }

        self.modify(|entries| match entries.get_mut(token) {
            Some(entry) => {
                if !a.is_empty() {
                    entry.domain_record.sub_domain.a = a.to_string();
                }
                if !aaaa.is_empty() {
                    entry.domain_record.sub_domain.aaaa = aaaa.to_string();
                }
                if let Some(service) = service {
                    entry.service = service;
                }
                if !description.is_empty() {
                    entry.description = description.to_string();
                }
                Ok(UpsertStatus::Update)
            }
            None => {
                let service = service.ok_or_else(|| Error::config("No service specified"))?;
                if domain.is_empty() {
                    return Err(Error::config("No domain specified"));
                }

                let description = if description.is_empty() {
                    DEFAULT_DESCRIPTION
                } else {
                    description
                };
                let aaaa = if aaaa.is_empty() { a } else { aaaa };

                entries.insert(
                    token.to_string(),
                    WhitelistEntry {
                        enable: true,
                        description: description.to_string(),
                        service,
                        domain_record: RecordTarget::new(domain, a, aaaa),
                    },
                );
                Ok(UpsertStatus::Insert)
            }
        })
    }

    /// Remove the entry for `token`, returning it if it existed
    pub fn remove(&self, token: &str) -> Result<Option<WhitelistEntry>> {
        self.modify(|entries| Ok(entries.remove(token)))
    }

    /// Copy the snapshot, apply `f`, persist, then swap
    fn modify<T>(&self, f: impl FnOnce(&mut Entries) -> Result<T>) -> Result<T> {
        let _guard = self
            .writer
            .lock()
            .map_err(|_| Error::Other("Whitelist writer lock poisoned".to_string()))?;

        let mut entries = Entries::clone(&self.snapshot.load());
        let out = f(&mut entries)?;

        if let Some(path) = &self.path {
            save_json(path, &entries)?;
        }
        self.snapshot.store(Arc::new(entries));

        Ok(out)
    }

    /// Generate a random alphanumeric token
    pub fn generate_token(len: usize) -> String {
        rand::rng()
            .sample_iter(&rand::distr::Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }
}
