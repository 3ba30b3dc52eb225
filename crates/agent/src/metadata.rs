//! Host metadata: where an agent learns who it is.
//!
//! On GCE the instance metadata server supplies the instance id, name, zone
//! and a signed identity token for the control plane. Elsewhere the identity
//! comes from config.

use std::time::Duration;

use {
    async_trait::async_trait,
    gatehouse_config::StaticIdentity,
    gatehouse_protocol::Gateway,
    secrecy::Secret,
    tracing::debug,
};

/// Default metadata server root.
const GCE_METADATA_HOST: &str = "metadata.google.internal";

/// Env var overriding the metadata server host (`host[:port]`).
pub const GCE_METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("metadata request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("metadata server returned {status} for {path}")]
    Status {
        status: reqwest::StatusCode,
        path: String,
    },
    #[error("metadata value {0} is not available")]
    Missing(&'static str),
}

/// Source of the local gateway identity and credential.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn instance_id(&self) -> Result<String, MetadataError>;
    async fn instance_name(&self) -> Result<String, MetadataError>;
    /// Zone name, e.g. `europe-west1-b`.
    async fn zone(&self) -> Result<String, MetadataError>;
    /// Signed token the control plane can verify, scoped to `audience`.
    async fn identity_token(&self, audience: &str) -> Result<Secret<String>, MetadataError>;
}

/// Region of a zone: `europe-west1-b` → `europe-west1`.
///
/// Accepts the full `projects/<n>/zones/<zone>` form the metadata server
/// returns. A value with no zone suffix is returned unchanged.
pub fn region_from_zone(zone: &str) -> &str {
    let zone = zone.rsplit('/').next().unwrap_or(zone);
    match zone.rsplit_once('-') {
        Some((region, suffix))
            if region.contains('-')
                && !suffix.is_empty()
                && suffix.chars().all(|c| c.is_ascii_lowercase()) =>
        {
            region
        },
        _ => zone,
    }
}

/// Build this host's gateway record.
pub async fn describe_gateway(
    source: &dyn MetadataSource,
    version: u32,
) -> Result<Gateway, MetadataError> {
    let id = source.instance_id().await?;
    let name = source.instance_name().await?;
    let zone = source.zone().await?;
    let region = region_from_zone(&zone);
    debug!(gateway_id = %id, %name, %zone, %region, "derived gateway identity");
    Ok(Gateway::new(id, name, version, region))
}

// ── GCE ──────────────────────────────────────────────────────────────────────

/// Client for the GCE instance metadata server.
#[derive(Debug, Clone)]
pub struct GceMetadata {
    client: reqwest::Client,
    base_url: String,
}

impl GceMetadata {
    /// Metadata server at `$GCE_METADATA_HOST`, or the standard host.
    pub fn from_env() -> Result<Self, MetadataError> {
        let host =
            std::env::var(GCE_METADATA_HOST_ENV).unwrap_or_else(|_| GCE_METADATA_HOST.into());
        Self::with_host(&host)
    }

    pub fn with_host(host: &str) -> Result<Self, MetadataError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            base_url: format!("http://{host}/computeMetadata/v1"),
        })
    }

    async fn get(&self, path: &str) -> Result<String, MetadataError> {
        let resp = self
            .client
            .get(format!("{}/{path}", self.base_url))
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(MetadataError::Status {
                status,
                path: path.to_string(),
            });
        }
        Ok(resp.text().await?.trim().to_string())
    }
}

#[async_trait]
impl MetadataSource for GceMetadata {
    async fn instance_id(&self) -> Result<String, MetadataError> {
        self.get("instance/id").await
    }

    async fn instance_name(&self) -> Result<String, MetadataError> {
        self.get("instance/name").await
    }

    async fn zone(&self) -> Result<String, MetadataError> {
        self.get("instance/zone").await
    }

    async fn identity_token(&self, audience: &str) -> Result<Secret<String>, MetadataError> {
        let path = format!(
            "instance/service-accounts/default/identity?audience={}",
            urlencoding::encode(audience)
        );
        let token = self.get(&path).await?;
        if token.is_empty() {
            return Err(MetadataError::Missing("identity token"));
        }
        Ok(Secret::new(token))
    }
}

// ── Static ───────────────────────────────────────────────────────────────────

/// Identity fixed in config, for hosts without a metadata server.
#[derive(Debug, Clone)]
pub struct StaticMetadata {
    identity: StaticIdentity,
}

impl StaticMetadata {
    pub fn new(identity: StaticIdentity) -> Self {
        Self { identity }
    }
}

fn required(value: &str, what: &'static str) -> Result<String, MetadataError> {
    if value.is_empty() {
        return Err(MetadataError::Missing(what));
    }
    Ok(value.to_string())
}

#[async_trait]
impl MetadataSource for StaticMetadata {
    async fn instance_id(&self) -> Result<String, MetadataError> {
        required(&self.identity.id, "instance id")
    }

    async fn instance_name(&self) -> Result<String, MetadataError> {
        // Name is informational; fall back to the id.
        if self.identity.name.is_empty() {
            return self.instance_id().await;
        }
        Ok(self.identity.name.clone())
    }

    async fn zone(&self) -> Result<String, MetadataError> {
        required(&self.identity.zone, "zone")
    }

    async fn identity_token(&self, _audience: &str) -> Result<Secret<String>, MetadataError> {
        self.identity
            .token
            .clone()
            .ok_or(MetadataError::Missing("identity token"))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        axum::{
            Router,
            extract::Query,
            http::{HeaderMap, StatusCode},
            routing::get,
        },
        secrecy::ExposeSecret,
        std::collections::HashMap,
    };

    #[test]
    fn region_derivation() {
        assert_eq!(region_from_zone("europe-west1-b"), "europe-west1");
        assert_eq!(region_from_zone("us-central1-a"), "us-central1");
        assert_eq!(
            region_from_zone("projects/123456/zones/asia-east1-c"),
            "asia-east1"
        );
        assert_eq!(region_from_zone("europe-west1"), "europe-west1");
        assert_eq!(region_from_zone("local"), "local");
        assert_eq!(region_from_zone(""), "");
    }

    fn static_source(token: Option<&str>) -> StaticMetadata {
        StaticMetadata::new(StaticIdentity {
            id: "i-123".into(),
            name: String::new(),
            zone: "europe-west1-b".into(),
            token: token.map(|t| Secret::new(t.to_string())),
        })
    }

    #[tokio::test]
    async fn static_identity() {
        let source = static_source(Some("tok"));
        let gateway = describe_gateway(&source, 3).await.unwrap();
        assert_eq!(gateway, Gateway::new("i-123", "i-123", 3, "europe-west1"));
        assert_eq!(
            source.identity_token("http://cp").await.unwrap().expose_secret(),
            "tok"
        );
    }

    #[tokio::test]
    async fn static_identity_requires_id_and_zone() {
        let source = StaticMetadata::new(StaticIdentity::default());
        assert!(matches!(
            describe_gateway(&source, 0).await,
            Err(MetadataError::Missing("instance id"))
        ));
        assert!(static_source(None).identity_token("x").await.is_err());
    }

    async fn fake_metadata_server() -> String {
        async fn value(headers: HeaderMap, body: &'static str) -> Result<&'static str, StatusCode> {
            if headers.get("Metadata-Flavor").and_then(|v| v.to_str().ok()) != Some("Google") {
                return Err(StatusCode::FORBIDDEN);
            }
            Ok(body)
        }

        let app = Router::new()
            .route(
                "/computeMetadata/v1/instance/id",
                get(|h: HeaderMap| value(h, "4520031799277581759\n")),
            )
            .route(
                "/computeMetadata/v1/instance/name",
                get(|h: HeaderMap| value(h, "edge-gtw-1")),
            )
            .route(
                "/computeMetadata/v1/instance/zone",
                get(|h: HeaderMap| value(h, "projects/42/zones/europe-west1-b")),
            )
            .route(
                "/computeMetadata/v1/instance/service-accounts/default/identity",
                get(|Query(q): Query<HashMap<String, String>>| async move {
                    format!("jwt-for-{}", q.get("audience").cloned().unwrap_or_default())
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn gce_identity_and_token() {
        let host = fake_metadata_server().await;
        let source = GceMetadata::with_host(&host).unwrap();

        let gateway = describe_gateway(&source, 0).await.unwrap();
        assert_eq!(
            gateway,
            Gateway::new("4520031799277581759", "edge-gtw-1", 0, "europe-west1")
        );

        let token = source
            .identity_token("https://cp.example.com")
            .await
            .unwrap();
        assert_eq!(token.expose_secret(), "jwt-for-https://cp.example.com");
    }

    #[tokio::test]
    async fn gce_missing_path_is_status_error() {
        let host = fake_metadata_server().await;
        let source = GceMetadata::with_host(&host).unwrap();
        let err = source.get("instance/hostname").await.unwrap_err();
        assert!(matches!(
            err,
            MetadataError::Status { status, .. } if status == StatusCode::NOT_FOUND
        ));
    }
}
