use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Gateway, GatewayError};
use crate::model::{Draft, Message, MessageId};
use crate::protocol::Batch;

/// Scripted gateway for tests. Responses are queued per endpoint and
/// consumed in order; every call is recorded so tests can assert on the
/// exact requests the engine issued.
///
/// An empty poll queue answers with [`GatewayError::Timeout`], which is the
/// steady-state outcome of a long poll with no new content.
#[derive(Default)]
pub struct MockGateway {
    polls: Mutex<VecDeque<Result<Batch, GatewayError>>>,
    histories: Mutex<VecDeque<Result<Batch, GatewayError>>>,
    posts: Mutex<VecDeque<Result<Option<Message>, GatewayError>>>,
    deletes: Mutex<VecDeque<Result<MessageId, GatewayError>>>,
    poll_calls: Mutex<Vec<MessageId>>,
    history_calls: Mutex<Vec<(MessageId, i64)>>,
    post_calls: Mutex<Vec<Draft>>,
    delete_calls: Mutex<Vec<MessageId>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_poll(&self, response: Result<Batch, GatewayError>) {
        self.polls.lock().push_back(response);
    }

    pub fn push_history(&self, response: Result<Batch, GatewayError>) {
        self.histories.lock().push_back(response);
    }

    pub fn push_post(&self, response: Result<Option<Message>, GatewayError>) {
        self.posts.lock().push_back(response);
    }

    pub fn push_delete(&self, response: Result<MessageId, GatewayError>) {
        self.deletes.lock().push_back(response);
    }

    /// `since` cursors of every live poll issued so far.
    pub fn poll_calls(&self) -> Vec<MessageId> {
        self.poll_calls.lock().clone()
    }

    /// `(before, count)` pairs of every history request issued so far.
    pub fn history_calls(&self) -> Vec<(MessageId, i64)> {
        self.history_calls.lock().clone()
    }

    pub fn post_calls(&self) -> Vec<Draft> {
        self.post_calls.lock().clone()
    }

    pub fn delete_calls(&self) -> Vec<MessageId> {
        self.delete_calls.lock().clone()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn poll(&self, since: MessageId, _timeout: Duration) -> Result<Batch, GatewayError> {
        self.poll_calls.lock().push(since);
        self.polls
            .lock()
            .pop_front()
            .unwrap_or(Err(GatewayError::Timeout))
    }

    async fn history(&self, before: MessageId, count: i64) -> Result<Batch, GatewayError> {
        self.history_calls.lock().push((before, count));
        self.histories
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Batch::default()))
    }

    async fn post(&self, draft: &Draft) -> Result<Option<Message>, GatewayError> {
        self.post_calls.lock().push(draft.clone());
        self.posts.lock().pop_front().unwrap_or(Ok(None))
    }

    async fn delete(&self, id: MessageId) -> Result<MessageId, GatewayError> {
        self.delete_calls.lock().push(id);
        self.deletes.lock().pop_front().unwrap_or(Ok(id))
    }
}
