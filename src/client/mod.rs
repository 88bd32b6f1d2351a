// Client module
// Blocking HTTP client for the query service, used by `ask` and `chat`


use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::server::{HEALTH_PATH, HealthResponse, QUERY_PATH, QueryRequest, QueryResponse};

pub const CONNECTION_HINT: &str = "Cannot connect to backend. Make sure to run: travel-rag serve";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Backend returned HTTP {0}")]
    Status(u16),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Invalid backend URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Text shown to the user for this failure
    #[inline]
    pub fn user_message(&self) -> String {
        match self {
            Self::Connection(_) => CONNECTION_HINT.to_string(),
            Self::Status(status) => format!("Backend error: {}", status),
            other => format!("Error: {}", other),
        }
    }

    #[inline]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Result of the health check. Shown to the user, never blocks a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    #[inline]
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    base_url: Url,
    health_agent: ureq::Agent,
    query_agent: ureq::Agent,
    health_timeout: Duration,
    query_timeout: Duration,
}

impl ChatClient {
    #[inline]
    pub fn new(
        base_url: &str,
        health_timeout: Duration,
        query_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)?;

        Ok(Self {
            base_url,
            health_agent: agent_with_timeout(health_timeout),
            query_agent: agent_with_timeout(query_timeout),
            health_timeout,
            query_timeout,
        })
    }

    #[inline]
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(
            &config.backend_url,
            config.health_timeout(),
            config.query_timeout(),
        )
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Call `GET /api/health`
    #[inline]
    pub fn health(&self) -> Result<HealthResponse, ClientError> {
        let url = self.base_url.join(HEALTH_PATH)?;
        debug!("Checking backend health at {}", url);

        let body = self
            .health_agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| map_error(e, self.health_timeout))?;

        serde_json::from_str(&body).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    #[inline]
    pub fn connection_status(&self) -> ConnectionStatus {
        match self.health() {
            Ok(health) if health.status == "healthy" => ConnectionStatus::Connected,
            Ok(health) => {
                warn!("Backend reported status {}", health.status);
                ConnectionStatus::Disconnected
            }
            Err(e) => {
                debug!("Health check failed: {}", e);
                ConnectionStatus::Disconnected
            }
        }
    }

    /// Send `POST /api/query` and return the backend's answer
    #[inline]
    pub fn query(&self, question: &str) -> Result<QueryResponse, ClientError> {
        let url = self.base_url.join(QUERY_PATH)?;
        let request = QueryRequest {
            query: question.to_string(),
            k: None,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;

        debug!("Sending query to {}", url);

        let body = self
            .query_agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| map_error(e, self.query_timeout))?;

        serde_json::from_str(&body).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}

fn agent_with_timeout(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

fn map_error(error: ureq::Error, timeout: Duration) -> ClientError {
    match error {
        ureq::Error::StatusCode(status) => ClientError::Status(status),
        ureq::Error::Timeout(_) => ClientError::Timeout(timeout),
        ureq::Error::Io(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
            ClientError::Timeout(timeout)
        }
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound | ureq::Error::Io(_) => {
            ClientError::Connection(error.to_string())
        }
        other => ClientError::Transport(other.to_string()),
    }
}
