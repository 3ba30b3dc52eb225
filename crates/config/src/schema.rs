//! Config schema for both halves of the system.
//!
//! Every default lives here; the CLI layers env and flags on top.

use std::{path::PathBuf, time::Duration};

use {
    secrecy::Secret,
    serde::{Deserialize, Serialize},
};

/// Port the control plane listens on when none is configured.
pub const DEFAULT_PORT: u16 = 10000;

/// Agent poll interval when none is configured (five minutes).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatehouseConfig {
    pub control_plane: ControlPlaneConfig,
    pub agent: AgentConfig,
}

// ── Control plane ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    pub bind: String,
    pub port: u16,
    /// Bulk configuration source (JSON, TOML or YAML), read once at startup.
    pub configurations: Option<PathBuf>,
    /// When set, `/v1` requests must present this bearer token.
    pub token: Option<Secret<String>>,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            configurations: None,
            token: None,
        }
    }
}

// ── Agent ────────────────────────────────────────────────────────────────────

/// Where the agent derives its identity and credential from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataKind {
    /// GCE instance metadata server.
    #[default]
    Gce,
    /// Values from `[agent.identity]`.
    Static,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub control_plane_url: Option<String>,
    /// Reported as `Gateway::version` at registration.
    pub version: u32,
    pub poll_interval_secs: u64,
    pub metadata: MetadataKind,
    pub identity: StaticIdentity,
    pub backoff: BackoffConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            control_plane_url: None,
            version: 0,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            metadata: MetadataKind::default(),
            identity: StaticIdentity::default(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// Fixed identity for hosts without a metadata server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StaticIdentity {
    pub id: String,
    pub name: String,
    /// Zone name, e.g. `europe-west1-b`; the region is derived from it.
    pub zone: String,
    pub token: Option<Secret<String>>,
}

/// Retry schedule for failed configuration polls.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub max_delay_secs: u64,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_secs: DEFAULT_POLL_INTERVAL_SECS,
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    #[test]
    fn defaults() {
        let cfg = GatehouseConfig::default();
        assert_eq!(cfg.control_plane.port, DEFAULT_PORT);
        assert_eq!(cfg.control_plane.bind, "0.0.0.0");
        assert!(cfg.control_plane.token.is_none());
        assert_eq!(cfg.agent.poll_interval(), Duration::from_secs(300));
        assert_eq!(cfg.agent.metadata, MetadataKind::Gce);
        assert_eq!(cfg.agent.backoff.initial_delay(), Duration::from_secs(1));
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let cfg: GatehouseConfig = toml::from_str(
            r#"
            [control_plane]
            port = 8080
            token = "s3cret"

            [agent]
            metadata = "static"

            [agent.identity]
            id = "i-1"
            zone = "europe-west1-b"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.control_plane.port, 8080);
        assert_eq!(cfg.control_plane.bind, "0.0.0.0");
        assert_eq!(
            cfg.control_plane
                .token
                .as_ref()
                .map(|t| t.expose_secret().as_str()),
            Some("s3cret")
        );
        assert_eq!(cfg.agent.metadata, MetadataKind::Static);
        assert_eq!(cfg.agent.identity.id, "i-1");
        assert_eq!(cfg.agent.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let cfg = AgentConfig {
            poll_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(cfg.poll_interval(), Duration::from_secs(1));
    }
}
