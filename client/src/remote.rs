//! Per-server requests against the tornado-profile endpoints.
//!
//! Every request produces exactly one [`RemoteResult`]. Connection failures, timeouts, error
//! statuses and undecodable bodies are captured in [`Outcome::Error`] so that one broken server
//! never hides the answers of the others.

use crate::render::Record;
use eyre::Context as _;
use futures::future::join_all;
use profile_client_config::StatsConfig;
use reqwest::{
    Client as HttpClient,
    Method,
};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Error bodies are cut to this many characters before they end up in a table.
pub const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    Text,
}

/// One endpoint call, sent unchanged to every server.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub path: &'static str,
    pub query: Vec<(&'static str, String)>,
    pub response: ResponseKind,
}

impl Request {
    fn new(method: Method, path: &'static str, response: ResponseKind) -> Self {
        Self {
            method,
            path,
            query: Vec::new(),
            response,
        }
    }

    pub fn status() -> Self {
        Self::new(Method::GET, "profiler", ResponseKind::Json)
    }

    pub fn start() -> Self {
        Self::new(Method::POST, "profiler", ResponseKind::Text)
    }

    pub fn stop() -> Self {
        Self::new(Method::DELETE, "profiler", ResponseKind::Text)
    }

    pub fn clear() -> Self {
        Self::new(Method::DELETE, "profiler/stats", ResponseKind::Text)
    }

    pub fn stats(settings: &StatsConfig) -> Self {
        let mut request = Self::new(Method::GET, "profiler/stats", ResponseKind::Json);
        request.query = vec![
            ("sort", settings.order.as_str().to_string()),
            ("count", settings.count.to_string()),
            ("strip_dirs", settings.strip_dirs.to_string()),
        ];
        request
    }

    fn endpoint(&self, host: &str) -> Result<Url, RemoteError> {
        let raw = format!("{}/{}", host.trim_end_matches('/'), self.path);
        let mut url = Url::parse(&raw).map_err(|err| RemoteError::InvalidUrl {
            url: raw.clone(),
            reason: err.to_string(),
        })?;
        if !self.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(self.query.iter().map(|(key, value)| (*key, value.as_str())));
        }
        Ok(url)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("invalid server url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("{0}")]
    Transport(String),
    #[error("{status}: {body}")]
    Status { status: u16, body: String },
    #[error("Parsing json on '{body}': {reason}")]
    Decode { body: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Plain text answer, `"OK"` when the server sent an empty body.
    Text(String),
    Document(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Payload(Payload),
    Error(RemoteError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResult {
    pub host: String,
    pub outcome: Outcome,
}

impl RemoteResult {
    pub fn payload(host: impl Into<String>, payload: Payload) -> Self {
        Self {
            host: host.into(),
            outcome: Outcome::Payload(payload),
        }
    }

    pub fn error(host: impl Into<String>, error: RemoteError) -> Self {
        Self {
            host: host.into(),
            outcome: Outcome::Error(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    /// Flattens the result into a table row keyed by column name. `host` always wins over a
    /// field of the same name in the document.
    pub fn into_record(self) -> Record {
        let mut record = Record::new();
        match self.outcome {
            Outcome::Payload(Payload::Text(text)) => {
                record.insert("response".to_string(), Value::String(text));
            }
            Outcome::Payload(Payload::Document(Value::Object(fields))) => record.extend(fields),
            Outcome::Payload(Payload::Document(other)) => {
                record.insert("response".to_string(), other);
            }
            Outcome::Error(err) => {
                record.insert("error".to_string(), Value::String(err.to_string()));
            }
        }
        record.insert("host".to_string(), Value::String(self.host));
        record
    }
}

/// Sends [`Request`]s to servers, sharing one connection pool.
#[derive(Clone, Debug)]
pub struct Invoker {
    http_client: HttpClient,
    timeout: Duration,
}

impl Invoker {
    pub fn new(timeout: Duration) -> eyre::Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .wrap_err("Failed to build HTTP client")?;
        Ok(Self { http_client, timeout })
    }

    /// Sends `request` to every host concurrently. Results come back in `hosts` order.
    pub async fn invoke_all(&self, hosts: &[String], request: &Request) -> Vec<RemoteResult> {
        join_all(hosts.iter().map(|host| self.invoke(host, request))).await
    }

    pub async fn invoke(&self, host: &str, request: &Request) -> RemoteResult {
        info!("{} {}/{} ...", request.method, host, request.path);
        match self.send(host, request).await {
            Ok(payload) => RemoteResult::payload(host, payload),
            Err(err) => {
                warn!(host, error = %err, "request failed");
                RemoteResult::error(host, err)
            }
        }
    }

    #[instrument(level = "debug", skip(self, request), fields(method = %request.method, path = request.path))]
    async fn send(&self, host: &str, request: &Request) -> Result<Payload, RemoteError> {
        let url = request.endpoint(host)?;
        let response = self
            .http_client
            .request(request.method.clone(), url)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        let body = response.text().await.map_err(|err| self.transport_error(err))?;
        debug!(status = status.as_u16(), len = body.len(), "received response");

        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        match request.response {
            ResponseKind::Json => serde_json::from_str(&body)
                .map(Payload::Document)
                .map_err(|err| RemoteError::Decode {
                    reason: err.to_string(),
                    body,
                }),
            ResponseKind::Text => {
                let text = match body.trim() {
                    "" => "OK",
                    text => text,
                };
                Ok(Payload::Text(text.to_string()))
            }
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            return RemoteError::Transport(format!("request timed out after {:?}", self.timeout));
        }
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        RemoteError::Transport(message)
    }
}
