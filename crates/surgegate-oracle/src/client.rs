//! The oracle seam and its HTTP implementation.
//!
//! `HttpOracle` speaks the Ollama `/api/generate` protocol over a plain
//! hyper HTTP/1 connection, one connection per call.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::Uri;
use http_body_util::{BodyExt, Full};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OracleError, OracleResult};
use crate::prompt::OracleRequest;

/// Future returned by [`DecisionOracle::generate`].
pub type OracleFuture<'a> = Pin<Box<dyn Future<Output = OracleResult<String>> + Send + 'a>>;

/// Anything that can turn an observation into free-text advice.
///
/// Implementations do no parsing; the reply is handed to the extraction
/// and validation stages as-is.
pub trait DecisionOracle: Send + Sync {
    fn generate<'a>(&'a self, request: &'a OracleRequest) -> OracleFuture<'a>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
    num_predict: u32,
    repeat_penalty: f64,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Ollama-compatible oracle client.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    /// `host:port` to connect to.
    address: String,
    /// Full request URI for the generate endpoint.
    uri: String,
    model: String,
}

impl HttpOracle {
    /// Build a client for `base_url` (e.g. `http://127.0.0.1:11434`).
    pub fn new(base_url: &str, model: impl Into<String>) -> OracleResult<Self> {
        let parsed: Uri = base_url
            .parse()
            .map_err(|e: http::uri::InvalidUri| OracleError::InvalidEndpoint(format!("{base_url}: {e}")))?;

        if parsed.scheme_str() != Some("http") {
            return Err(OracleError::InvalidEndpoint(format!(
                "{base_url}: only http:// endpoints are supported"
            )));
        }
        let authority = parsed
            .authority()
            .ok_or_else(|| OracleError::InvalidEndpoint(format!("{base_url}: missing host")))?;

        let address = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));
        let base_path = parsed.path().trim_end_matches('/');
        Ok(Self {
            uri: format!("http://{address}{base_path}/api/generate"),
            address,
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.uri
    }

    async fn post_generate(&self, prompt: &str) -> OracleResult<String> {
        let payload = serde_json::to_vec(&GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: 0.0,
                top_p: 0.9,
                num_predict: 150,
                repeat_penalty: 1.0,
            },
        })
        .map_err(|e| OracleError::Malformed(e.to_string()))?;

        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| OracleError::Transport(format!("connect {}: {e}", self.address)))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| OracleError::Transport(format!("handshake: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "oracle connection closed");
            }
        });

        let req = http::Request::builder()
            .method(http::Method::POST)
            .uri(&self.uri)
            .header(http::header::HOST, &self.address)
            .header(http::header::CONTENT_TYPE, "application/json")
            .header(http::header::USER_AGENT, "surgegate-oracle/0.1")
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| OracleError::Transport(format!("request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| OracleError::Transport(format!("body: {e}")))?
            .to_bytes();

        let parsed: GenerateResponse =
            serde_json::from_slice(&body).map_err(|e| OracleError::Malformed(format!("envelope: {e}")))?;
        Ok(parsed.response.trim().to_string())
    }
}

impl DecisionOracle for HttpOracle {
    fn generate<'a>(&'a self, request: &'a OracleRequest) -> OracleFuture<'a> {
        Box::pin(async move {
            let prompt = request.prompt();
            debug!(
                tenant = %request.tenant,
                resource = %request.resource,
                model = %self.model,
                prompt_words = prompt.split_whitespace().count(),
                "calling oracle"
            );
            self.post_generate(&prompt).await
        })
    }
}
