use std::{sync::Arc, time::Duration};

use {
    anyhow::Context,
    gatehouse_config::{AgentConfig, MetadataKind},
    gatehouse_protocol::Gateway,
    reqwest::StatusCode,
    tokio::time::{Instant, MissedTickBehavior},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    backoff::Backoff,
    client::{ClientError, ControlPlaneClient},
    metadata::{GceMetadata, MetadataError, MetadataSource, StaticMetadata, describe_gateway},
    sink::ConfigurationSink,
};

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("cannot derive gateway identity: {0}")]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Where the agent is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Deriving identity and registering.
    Bootstrapping,
    /// Pulling configuration every interval. Left only when the process ends.
    Polling,
}

/// Gateway agent: registers once, then pulls its configuration forever.
pub struct Agent {
    client: ControlPlaneClient,
    /// Control-plane URL as configured; identity tokens are minted for it.
    audience: String,
    metadata: Arc<dyn MetadataSource>,
    sink: Arc<dyn ConfigurationSink>,
    version: u32,
    interval: Duration,
    backoff: Backoff,
    state: AgentState,
}

impl Agent {
    pub fn new(
        control_plane_url: &str,
        metadata: Arc<dyn MetadataSource>,
        sink: Arc<dyn ConfigurationSink>,
    ) -> Result<Self, ClientError> {
        let defaults = AgentConfig::default();
        Ok(Self {
            client: ControlPlaneClient::new(control_plane_url)?,
            audience: control_plane_url.to_string(),
            metadata,
            sink,
            version: defaults.version,
            interval: defaults.poll_interval(),
            backoff: Backoff::from(&defaults.backoff),
            state: AgentState::Bootstrapping,
        })
    }

    /// Build an agent from config. Fails when no control-plane URL is set.
    pub fn from_config(
        config: &AgentConfig,
        sink: Arc<dyn ConfigurationSink>,
    ) -> anyhow::Result<Self> {
        let url = config
            .control_plane_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .context("control plane URL is not configured (set CONTROL_PLANE_URL)")?;
        let metadata = metadata_source(config)?;
        Ok(Self::new(url, metadata, sink)?
            .with_version(config.version)
            .with_interval(config.poll_interval())
            .with_backoff(Backoff::from(&config.backoff)))
    }

    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Run until `cancel` fires. Only identity derivation can fail; control
    /// plane errors are logged and retried.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), AgentError> {
        let gateway = self.bootstrap().await?;

        // First poll one full interval after registration.
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            gateway_id = %gateway.id,
            interval_secs = self.interval.as_secs_f64(),
            "polling control plane for configuration"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {},
            }
            if !self.poll_until_applied(&gateway.id, &cancel).await {
                break;
            }
        }

        info!(gateway_id = %gateway.id, "agent stopped");
        Ok(())
    }

    /// Derive identity and register exactly once.
    ///
    /// A failed registration is logged and otherwise ignored.
    pub async fn bootstrap(&mut self) -> Result<Gateway, AgentError> {
        self.state = AgentState::Bootstrapping;
        let gateway = describe_gateway(self.metadata.as_ref(), self.version).await?;
        self.refresh_token().await;

        match self.client.register(&gateway).await {
            Ok(registered) => info!(gateway_id = %registered.id, region = %registered.region, "registered with control plane"),
            Err(e) => warn!(gateway_id = %gateway.id, error = %e, "registration failed, continuing"),
        }

        self.state = AgentState::Polling;
        Ok(gateway)
    }

    /// Fetch the configuration once and hand it to the sink.
    pub async fn poll_once(&self, gateway_id: &str) -> Result<usize, ClientError> {
        debug!(gateway_id, "calling control plane for configuration");
        let entries = self.client.get_configuration(gateway_id).await?;
        if let Err(e) = self.sink.apply(gateway_id, &entries).await {
            warn!(gateway_id, error = %e, "failed to apply configuration");
        }
        Ok(entries.len())
    }

    /// Poll, backing off between failures, until one succeeds.
    /// Returns false if cancelled first.
    async fn poll_until_applied(&mut self, gateway_id: &str, cancel: &CancellationToken) -> bool {
        loop {
            match self.poll_once(gateway_id).await {
                Ok(entries) => {
                    if self.backoff.attempts() > 0 {
                        info!(gateway_id, failures = self.backoff.attempts(), "configuration poll recovered");
                    }
                    debug!(gateway_id, entries, "configuration poll succeeded");
                    self.backoff.reset();
                    return true;
                },
                Err(e) => {
                    if e.status() == Some(StatusCode::UNAUTHORIZED) {
                        self.refresh_token().await;
                    }
                    let delay = self.backoff.next_delay();
                    warn!(
                        gateway_id,
                        attempt = self.backoff.attempts(),
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "configuration poll failed, retrying"
                    );
                    tokio::select! {
                        () = cancel.cancelled() => return false,
                        () = tokio::time::sleep(delay) => {},
                    }
                },
            }
        }
    }

    async fn refresh_token(&mut self) {
        match self.metadata.identity_token(&self.audience).await {
            Ok(token) => self.client.set_token(Some(token)),
            Err(e) => {
                warn!(error = %e, "no identity token, calling control plane without credentials");
            },
        }
    }
}

/// Metadata source selected by config.
pub fn metadata_source(config: &AgentConfig) -> Result<Arc<dyn MetadataSource>, MetadataError> {
    Ok(match config.metadata {
        MetadataKind::Gce => Arc::new(GceMetadata::from_env()?),
        MetadataKind::Static => Arc::new(StaticMetadata::new(config.identity.clone())),
    })
}
