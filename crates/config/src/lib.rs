//! Configuration loading for the control plane and the gateway agent.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        ConfigurationMap, config_dir, discover_and_load, find_config_file, load_config,
        load_configurations,
    },
    schema::{
        AgentConfig, BackoffConfig, ControlPlaneConfig, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_PORT,
        GatehouseConfig, MetadataKind, StaticIdentity,
    },
};
