//! Gateway client backed by `reqwest`.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;

use txwatch_core::error::GatewayError;
use txwatch_core::gateway::{ByteStream, TxGateway};
use txwatch_core::policy::RetryPolicy;
use txwatch_core::types::{BuildResponse, RegisterRequest, TxStatus};

use crate::config::GatewayConfig;

/// HTTP client for the transaction gateway.
pub struct HttpGateway {
    base_url: String,
    http: reqwest::Client,
    retry: RetryPolicy,
    config: GatewayConfig,
}

impl HttpGateway {
    /// Create a client for the gateway described by `config`.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| GatewayError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            retry: RetryPolicy::new(config.retry.clone()),
            config,
        })
    }

    /// Create with default configuration.
    pub fn default_for(base_url: impl Into<String>) -> Result<Self, GatewayError> {
        Self::new(GatewayConfig::new(base_url))
    }

    /// Absolute URL of `{base}/tx/{path}`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/tx/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send_once(&self, req: RequestBuilder) -> Result<Response, GatewayError> {
        let timeout = self.config.request_timeout();
        let resp = self
            .authorize(req)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout.as_millis() as u64))?;
        Ok(resp)
    }

    async fn fetch_status_once(&self, url: &str) -> Result<Option<TxStatus>, GatewayError> {
        let resp = self.send_once(self.http.get(url)).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = ensure_success(resp).await?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;
        Ok(Some(serde_json::from_slice(&body)?))
    }
}

#[async_trait]
impl TxGateway for HttpGateway {
    async fn build(&self, build_path: &str, params: &Value) -> Result<BuildResponse, GatewayError> {
        let url = self.endpoint(build_path);
        tracing::debug!(url = %url, "requesting unsigned transaction");

        let resp = self.send_once(self.http.post(&url).json(params)).await?;
        let resp = ensure_success(resp).await?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;
        serde_json::from_slice::<BuildResponse>(&body)
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))
    }

    async fn register(&self, req: &RegisterRequest) -> Result<(), GatewayError> {
        let url = self.endpoint("register");
        self.retry
            .run("register", || async {
                let resp = self.send_once(self.http.post(&url).json(req)).await?;
                ensure_success(resp).await.map(|_| ())
            })
            .await
    }

    async fn fetch_status(&self, tx_hash: &str) -> Result<Option<TxStatus>, GatewayError> {
        let url = self.endpoint(&format!("status/{tx_hash}"));
        self.retry
            .run("status", || self.fetch_status_once(&url))
            .await
    }

    async fn open_stream(&self, tx_hash: &str) -> Result<ByteStream, GatewayError> {
        let url = self.endpoint(&format!("stream/{tx_hash}"));
        tracing::debug!(url = %url, "opening status stream");

        // no overall timeout: the stream stays open until the transaction settles
        let resp = self
            .authorize(self.http.get(&url))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;
        let resp = ensure_success(resp).await?;

        Ok(resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| GatewayError::Stream(e.to_string())))
            .boxed())
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

async fn ensure_success(resp: Response) -> Result<Response, GatewayError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(GatewayError::from_response(status, &body))
}

fn classify(e: reqwest::Error, timeout_ms: u64) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout { ms: timeout_ms }
    } else {
        GatewayError::Http(e.to_string())
    }
}
