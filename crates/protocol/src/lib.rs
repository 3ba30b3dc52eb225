//! Wire types shared by the control plane and the gateway agent.
//!
//! Both sides speak JSON over HTTP. Field names are fixed by the deployed
//! agents, so the serde attributes here are part of the protocol.

use serde::{Deserialize, Deserializer, Serialize};

/// Collection route for gateway records.
pub const GATEWAYS_PATH: &str = "/v1/gateways";

/// Router pattern for a single gateway record.
pub const GATEWAY_ROUTE: &str = "/v1/gateways/{id}";

/// Router pattern for a gateway's configuration entries.
pub const CONFIGURATION_ROUTE: &str = "/v1/gateways/{id}/configuration";

/// Liveness route.
pub const HEALTH_PATH: &str = "/health";

// ── Gateway ──────────────────────────────────────────────────────────────────

/// Identity record a gateway agent submits when it starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gateway {
    /// Infrastructure-assigned identifier (e.g. a cloud instance id).
    pub id: String,
    pub name: String,
    /// Agent software revision.
    pub version: u32,
    pub region: String,
}

impl Gateway {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: u32,
        region: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version,
            region: region.into(),
        }
    }
}

// ── Configuration ────────────────────────────────────────────────────────────

/// Traffic direction a configuration entry governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    #[serde(alias = "SpokeToHub")]
    SpokeToHub,
    #[serde(alias = "HubToSpoke")]
    HubToSpoke,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SpokeToHub => f.write_str("spokeToHub"),
            Self::HubToSpoke => f.write_str("hubToSpoke"),
        }
    }
}

/// A single routing/service rule assigned to a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationEntry {
    pub direction: Direction,
    #[serde(rename = "serviceId")]
    pub service_id: String,
    #[serde(default, deserialize_with = "nullable_ports")]
    pub ports: Vec<u16>,
    #[serde(rename = "vip")]
    pub service_vip: String,
    #[serde(rename = "ip")]
    pub service_ip: String,
}

/// Older producers emit `"ports": null` for "no ports".
fn nullable_ports<'de, D>(deserializer: D) -> Result<Vec<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<u16>>::deserialize(deserializer)?.unwrap_or_default())
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Body of every non-2xx response from the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

// ── Paths ────────────────────────────────────────────────────────────────────

/// Path of a single gateway record. `id` must already be percent-encoded.
pub fn gateway_path(id: &str) -> String {
    format!("{GATEWAYS_PATH}/{id}")
}

/// Path of a gateway's configuration. `id` must already be percent-encoded.
pub fn configuration_path(id: &str) -> String {
    format!("{GATEWAYS_PATH}/{id}/configuration")
}
