use {
    gatehouse_protocol::{ConfigurationEntry, Gateway},
    tokio::sync::RwLock,
    tracing::{debug, info, warn},
};

use crate::{
    configuration::ConfigurationStore,
    error::ServiceError,
    registry::GatewayRegistry,
};

/// Registry and configuration store behind the operations the HTTP layer
/// invokes, one call per request.
///
/// Registration takes the registry write lock for the whole check-and-insert,
/// so of two racing registrations for one id exactly one wins. Reads share
/// the lock. The configuration store never changes and is read lock-free.
#[derive(Debug)]
pub struct ControlPlaneService {
    registry: RwLock<GatewayRegistry>,
    configurations: ConfigurationStore,
}

impl Default for ControlPlaneService {
    fn default() -> Self {
        Self::new(ConfigurationStore::empty())
    }
}

impl ControlPlaneService {
    pub fn new(configurations: ConfigurationStore) -> Self {
        Self {
            registry: RwLock::new(GatewayRegistry::new()),
            configurations,
        }
    }

    /// Register a gateway and echo it back.
    pub async fn register_gateway(&self, gateway: Gateway) -> Result<Gateway, ServiceError> {
        let mut registry = self.registry.write().await;
        match registry.register(gateway.clone()) {
            Ok(()) => {
                info!(gateway_id = %gateway.id, name = %gateway.name, region = %gateway.region, "gateway registered");
                Ok(gateway)
            },
            Err(e) => {
                warn!(gateway_id = %gateway.id, "gateway will not be registered, id already taken");
                Err(e.into())
            },
        }
    }

    pub async fn list_gateways(&self) -> Vec<Gateway> {
        self.registry.read().await.list().to_vec()
    }

    pub async fn get_gateway(&self, id: &str) -> Result<Gateway, ServiceError> {
        let registry = self.registry.read().await;
        registry.lookup(id).cloned().map_err(|e| {
            debug!(gateway_id = %id, "gateway lookup missed");
            ServiceError::from(e)
        })
    }

    /// Configuration for `id`. Does not require `id` to be registered.
    pub fn get_configuration(&self, id: &str) -> Result<Vec<ConfigurationEntry>, ServiceError> {
        match self.configurations.lookup(id) {
            Ok(entries) => Ok(entries.to_vec()),
            Err(e) => {
                warn!(gateway_id = %id, "no configuration for gateway");
                Err(e.into())
            },
        }
    }

    pub async fn is_registered(&self, id: &str) -> bool {
        self.registry.read().await.contains(id)
    }

    pub async fn gateway_count(&self) -> usize {
        self.registry.read().await.len()
    }

    pub fn configurations(&self) -> &ConfigurationStore {
        &self.configurations
    }
}
