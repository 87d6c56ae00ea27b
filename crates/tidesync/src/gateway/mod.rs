use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::model::{Draft, Message, MessageId};
use crate::protocol::Batch;

pub mod http;
pub mod mock;

/// Typed failure returned by a gateway request. The engine only needs to
/// distinguish timeouts/network blips from server-reported application
/// errors; everything else is carried for diagnostics.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected http status {0}")]
    HttpStatus(StatusCode),
    #[error("server rejected request: {0}")]
    Server(String),
    #[error("not authorized: {0}")]
    Unauthorized(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid gateway configuration: {0}")]
    InvalidConfig(String),
}

impl GatewayError {
    /// Transient failures are retried (live lane) or surfaced as
    /// recoverable notices (history lane); they never halt the engine.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Timeout | GatewayError::Network(_))
    }
}

/// Request/response transport used by both synchronization lanes.
///
/// Implementations perform one request per call and never retry on their
/// own; retry policy belongs to the lanes.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Long-poll for every record strictly newer than `since`. A negative
    /// `since` asks for the most recent `|since|` messages instead, which is
    /// how the seeded high watermark bootstraps the timeline. The server
    /// may hold the request open up to `timeout` before answering.
    async fn poll(&self, since: MessageId, timeout: Duration) -> Result<Batch, GatewayError>;

    /// Fetch up to `count` records strictly older than `before`. A negative
    /// `count` requests the entire remaining backlog.
    async fn history(&self, before: MessageId, count: i64) -> Result<Batch, GatewayError>;

    /// Submit a composed message. The server normally answers with an empty
    /// body; when it echoes a record back, the caller feeds that record
    /// through the reconciler like any live batch.
    async fn post(&self, draft: &Draft) -> Result<Option<Message>, GatewayError>;

    /// Request server-side deletion. Returns the identifier the server
    /// confirmed as removed.
    async fn delete(&self, id: MessageId) -> Result<MessageId, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeout_and_network_are_transient() {
        assert!(GatewayError::Timeout.is_transient());
        assert!(GatewayError::Network("reset".into()).is_transient());
        assert!(!GatewayError::Server("nope".into()).is_transient());
        assert!(!GatewayError::Unauthorized("denied".into()).is_transient());
        assert!(!GatewayError::HttpStatus(StatusCode::BAD_GATEWAY).is_transient());
    }
}
