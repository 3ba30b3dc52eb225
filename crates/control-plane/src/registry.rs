use std::collections::HashMap;

use gatehouse_protocol::Gateway;

use crate::error::RegistryError;

/// Registered gateways, in registration order.
///
/// Not synchronized; the service wraps it in a lock.
#[derive(Debug, Default)]
pub struct GatewayRegistry {
    gateways: Vec<Gateway>,
    /// id → position in `gateways`
    by_id: HashMap<String, usize>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a gateway unless its id is already taken.
    ///
    /// An existing record is never overwritten, even by an identical one.
    pub fn register(&mut self, gateway: Gateway) -> Result<(), RegistryError> {
        if self.by_id.contains_key(&gateway.id) {
            return Err(RegistryError::AlreadyRegistered(gateway.id));
        }
        self.by_id.insert(gateway.id.clone(), self.gateways.len());
        self.gateways.push(gateway);
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Result<&Gateway, RegistryError> {
        self.by_id
            .get(id)
            .and_then(|&idx| self.gateways.get(idx))
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// All gateways, oldest registration first.
    pub fn list(&self) -> &[Gateway] {
        &self.gateways
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }
}
