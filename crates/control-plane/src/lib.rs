//! Control plane: authoritative gateway registry and per-gateway
//! configuration, served over HTTP.
//!
//! Lifecycle:
//! 1. Load the bulk configuration source into a [`ConfigurationStore`]
//! 2. Build the [`ControlPlaneService`] around it and an empty registry
//! 3. Serve the `/v1/gateways` routes until Ctrl-C
//!
//! All state is in memory and lives as long as the process.

pub mod auth;
pub mod configuration;
pub mod error;
pub mod registry;
pub mod server;
pub mod service;

pub use {
    auth::BearerAuth,
    configuration::ConfigurationStore,
    error::{ConfigurationError, RegistryError, ServiceError},
    registry::GatewayRegistry,
    server::{build_control_plane_app, start_control_plane},
    service::ControlPlaneService,
};
