//! Gateway agent: registers this host with the control plane and then pulls
//! its configuration on a fixed interval.

pub mod backoff;
pub mod client;
pub mod metadata;
pub mod runner;
pub mod sink;

pub use {
    backoff::Backoff,
    client::{ClientError, ControlPlaneClient},
    metadata::{GceMetadata, MetadataError, MetadataSource, StaticMetadata, region_from_zone},
    runner::{Agent, AgentError, AgentState, metadata_source},
    sink::{ConfigurationSink, LogSink},
};
