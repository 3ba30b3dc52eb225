use std::time::Duration;

use {
    gatehouse_protocol::{
        ConfigurationEntry, ErrorBody, GATEWAYS_PATH, Gateway, configuration_path, gateway_path,
    },
    reqwest::{Method, RequestBuilder, Response, StatusCode},
    secrecy::{ExposeSecret, Secret},
    serde::de::DeserializeOwned,
    url::Url,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid control plane URL {url}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("control plane request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("control plane returned {status}: {message}")]
    Status { status: StatusCode, message: String },
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
            Self::InvalidUrl { .. } => None,
        }
    }
}

/// HTTP client for the control-plane `/v1/gateways` API.
#[derive(Clone)]
pub struct ControlPlaneClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<Secret<String>>,
}

impl std::fmt::Debug for ControlPlaneClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlaneClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ControlPlaneClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url).map_err(|source| ClientError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Attach `Authorization: Bearer <token>` to every request.
    #[must_use]
    pub fn with_token(mut self, token: Option<Secret<String>>) -> Self {
        self.token = token;
        self
    }

    pub fn set_token(&mut self, token: Option<Secret<String>>) {
        self.token = token;
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn register(&self, gateway: &Gateway) -> Result<Gateway, ClientError> {
        let resp = self
            .request(Method::POST, GATEWAYS_PATH)
            .json(gateway)
            .send()
            .await?;
        decode(resp).await
    }

    pub async fn list_gateways(&self) -> Result<Vec<Gateway>, ClientError> {
        let resp = self.request(Method::GET, GATEWAYS_PATH).send().await?;
        decode(resp).await
    }

    pub async fn get_gateway(&self, id: &str) -> Result<Gateway, ClientError> {
        let path = gateway_path(&urlencoding::encode(id));
        let resp = self.request(Method::GET, &path).send().await?;
        decode(resp).await
    }

    pub async fn get_configuration(&self, id: &str) -> Result<Vec<ConfigurationEntry>, ClientError> {
        let path = configuration_path(&urlencoding::encode(id));
        let resp = self.request(Method::GET, &path).send().await?;
        decode(resp).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<T>().await?);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or(body);
    Err(ClientError::Status { status, message })
}
