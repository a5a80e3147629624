//! Client and instance registries.
//!
//! `ClientRegistry` maps vendor client names to factories and is passed to
//! [`EyeTracker`](crate::EyeTracker) by reference. `InstanceRegistry` enforces
//! the single-instance rule: only one tracker may hold the device at a time.

use crate::clients;
use mindlink_common::tracker::client::{ClientFactory, FrontendApi, TrackerError};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Registry of available vendor clients.
///
/// Names are matched case-insensitively, since they come straight from the
/// `client` key of the tracker configuration. Names are listed in sorted
/// order so a lookup error can tell the user what is available.
pub struct ClientRegistry {
    factories: BTreeMap<String, ClientFactory>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Create a registry holding the built-in clients.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        clients::register_builtin_clients(&mut registry);
        registry
    }

    /// Register a client factory.
    ///
    /// # Panics
    /// Panics if a client with the same name is already registered.
    pub fn register(&mut self, name: &str, factory: ClientFactory) {
        let key = normalize(name);
        if self.factories.contains_key(&key) {
            panic!("Client '{name}' is already registered");
        }
        self.factories.insert(key, factory);
    }

    /// Get a client factory by name.
    pub fn get_factory(&self, name: &str) -> Option<ClientFactory> {
        self.factories.get(&normalize(name)).copied()
    }

    /// Create a client instance by name.
    ///
    /// # Errors
    /// Returns `TrackerError::ClientNotFound`, naming the registered
    /// clients, if no client with the given name is registered.
    pub fn create_client(&self, name: &str) -> Result<Box<dyn FrontendApi>, TrackerError> {
        let Some(factory) = self.get_factory(name) else {
            return Err(TrackerError::ClientNotFound(format!(
                "'{}' (available: {})",
                name.trim(),
                self.list_clients().join(", ")
            )));
        };
        let client = factory();
        debug!("Created vendor client '{}' for '{}'", client.name(), name.trim());
        Ok(client)
    }

    /// List all registered client names, sorted.
    pub fn list_clients(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Tracks whether a tracker instance is alive.
///
/// Clones share the same flag. The host keeps one registry and hands it to
/// every tracker it constructs.
#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    active: Arc<AtomicBool>,
}

/// Proof of being the live instance. Dropping it frees the slot.
#[derive(Debug)]
pub struct InstanceGuard {
    active: Arc<AtomicBool>,
}

impl InstanceRegistry {
    /// Create a registry with no live instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the instance slot.
    ///
    /// # Errors
    /// Returns `TrackerError::AlreadyInstantiated` while another guard lives.
    pub fn claim(&self) -> Result<InstanceGuard, TrackerError> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TrackerError::AlreadyInstantiated)?;
        debug!("Tracker instance slot claimed");
        Ok(InstanceGuard {
            active: Arc::clone(&self.active),
        })
    }

    /// Whether an instance currently holds the slot.
    pub fn is_claimed(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}
