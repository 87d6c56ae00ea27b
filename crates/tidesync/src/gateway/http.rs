use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::trace;
use url::Url;

use super::{Gateway, GatewayError};
use crate::model::{Draft, Message, MessageId};
use crate::protocol::Batch;

/// Reqwest-backed gateway speaking the server's chat endpoints:
/// `chat-poll` (live and history, distinguished by query parameters),
/// `chat-send`, and `chat-delete/{id}`.
pub struct HttpGateway {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, GatewayError> {
        let mut base = base_url.as_ref().trim().to_string();
        if base.is_empty() {
            return Err(GatewayError::InvalidConfig(
                "server base url cannot be empty".into(),
            ));
        }
        if !base.starts_with("http://") && !base.starts_with("https://") {
            base = format!("http://{}", base);
        }
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|err| GatewayError::InvalidConfig(format!("invalid server url: {err}")))?;
        // No client-wide timeout: the long-poll deadline is per request and
        // deliberately generous.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| GatewayError::InvalidConfig(err.to_string()))?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base_url
            .join(path)
            .map_err(|err| GatewayError::InvalidConfig(format!("invalid endpoint {path}: {err}")))
    }
}

fn map_request_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Network(err.to_string())
    }
}

fn check_status(status: StatusCode) -> Result<(), GatewayError> {
    if status.is_success() {
        Ok(())
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(GatewayError::Unauthorized(format!("http status {status}")))
    } else {
        Err(GatewayError::HttpStatus(status))
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn poll(&self, since: MessageId, timeout: Duration) -> Result<Batch, GatewayError> {
        let endpoint = self.endpoint("chat-poll")?;
        trace!(since, "issuing live poll");
        let response = self
            .client
            .get(endpoint)
            .query(&[("name", since)])
            .timeout(timeout)
            .send()
            .await
            .map_err(map_request_error)?;
        check_status(response.status())?;
        response
            .json::<Batch>()
            .await
            .map_err(|err| GatewayError::InvalidResponse(err.to_string()))
    }

    async fn history(&self, before: MessageId, count: i64) -> Result<Batch, GatewayError> {
        let endpoint = self.endpoint("chat-poll")?;
        trace!(before, count, "requesting history page");
        let response = self
            .client
            .get(endpoint)
            .query(&[("before", before), ("n", count)])
            .send()
            .await
            .map_err(map_request_error)?;
        check_status(response.status())?;
        response
            .json::<Batch>()
            .await
            .map_err(|err| GatewayError::InvalidResponse(err.to_string()))
    }

    async fn post(&self, draft: &Draft) -> Result<Option<Message>, GatewayError> {
        let endpoint = self.endpoint("chat-send")?;
        let response = self
            .client
            .post(endpoint)
            .form(&[("msg", draft.body.as_str()), ("lmtime", draft.composed_at.as_str())])
            .send()
            .await
            .map_err(map_request_error)?;
        check_status(response.status())?;
        let text = response
            .text()
            .await
            .map_err(|err| GatewayError::InvalidResponse(err.to_string()))?;
        // An empty body is the normal success response. Anything else is a
        // single record the server wants rendered, typically an error entry.
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str::<Message>(&text)
            .map(Some)
            .map_err(|err| GatewayError::InvalidResponse(err.to_string()))
    }

    async fn delete(&self, id: MessageId) -> Result<MessageId, GatewayError> {
        let endpoint = self.endpoint(&format!("chat-delete/{id}"))?;
        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(map_request_error)?;
        check_status(response.status())?;
        response
            .json::<MessageId>()
            .await
            .map_err(|err| GatewayError::InvalidResponse(err.to_string()))
    }
}
