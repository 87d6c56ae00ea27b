use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::busy::BusyCounter;
use crate::config::{Identity, SyncConfig};
use crate::gateway::{Gateway, GatewayError};
use crate::history::{HistoryDenied, HistoryLane};
use crate::model::{Draft, Message, MessageId, local_time_8601};
use crate::poll::{PollLane, PollState};
use crate::protocol::{Batch, FeedEvent, Origin, Position};
use crate::reconcile::Reconciler;
use crate::sink::FeedSink;
use crate::watermark::Watermarks;

const HALT_NOTICE: &str =
    "Shutting down the live poll due to a server-side error. Restart the client to reactivate it.";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("history is already exhausted")]
    HistoryExhausted,
    #[error("a history request is already in flight")]
    HistoryInFlight,
    #[error("no batch has been processed yet; the history cursor is unavailable")]
    HistoryNotPrimed,
    #[error("refusing to send an empty message")]
    EmptyDraft,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<HistoryDenied> for EngineError {
    fn from(denied: HistoryDenied) -> Self {
        match denied {
            HistoryDenied::Exhausted => EngineError::HistoryExhausted,
            HistoryDenied::InFlight => EngineError::HistoryInFlight,
        }
    }
}

/// Cursor and lane state, mutated only in synchronous sections while a
/// completed request is being applied. The lock is never held across an
/// await.
struct EngineState {
    reconciler: Reconciler,
    poll: PollLane,
    history: HistoryLane,
}

struct EngineInner {
    gateway: Arc<dyn Gateway>,
    sink: Arc<dyn FeedSink>,
    config: SyncConfig,
    identity: Identity,
    busy: BusyCounter,
    started: AtomicBool,
    /// Next identifier for locally synthesized notices; counts down from -1
    /// so notices can never collide with server-assigned ids.
    notice_seq: AtomicI64,
    state: Mutex<EngineState>,
}

/// The feed synchronization engine.
///
/// Two independent lanes share one gateway: the live-poll lane (driven by
/// [`FeedEngine::start`] / [`FeedEngine::tick`]) appends everything newer
/// than the high watermark, and the history lane
/// ([`FeedEngine::load_older`]) prepends pages older than the low
/// watermark. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct FeedEngine {
    inner: Arc<EngineInner>,
}

impl FeedEngine {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        sink: Arc<dyn FeedSink>,
        config: SyncConfig,
        identity: Identity,
    ) -> Self {
        let reconciler = Reconciler::new(config.initial_backlog);
        Self {
            inner: Arc::new(EngineInner {
                gateway,
                sink,
                config,
                identity,
                busy: BusyCounter::new(),
                started: AtomicBool::new(false),
                notice_seq: AtomicI64::new(-1),
                state: Mutex::new(EngineState {
                    reconciler,
                    poll: PollLane::new(),
                    history: HistoryLane::new(),
                }),
            }),
        }
    }

    /// Begin the periodic poll cycle. Idempotent; the spawned loop runs
    /// until the lane halts on a server-reported fatal error.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            debug!("engine already started");
            return;
        }
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.inner.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if engine.tick().await == PollState::Halted {
                    break;
                }
            }
            info!("live poll loop stopped");
        });
    }

    /// One guarded poll-lane turn. A no-op while a poll is already
    /// outstanding or after the lane has halted.
    ///
    /// The first turn is wrapped in the busy contract and tagged as the
    /// initial load; steady-state turns are not, since a long poll may
    /// legitimately stay open for minutes.
    pub async fn tick(&self) -> PollState {
        let inner = &self.inner;
        let (turn, since) = {
            let mut state = inner.state.lock();
            match state.poll.try_begin() {
                None => return state.poll.state(),
                Some(turn) => (turn, state.reconciler.watermarks().high()),
            }
        };
        let _busy = turn.first.then(|| inner.busy.begin());
        let origin = if turn.first {
            Origin::InitialLoad
        } else {
            Origin::Live
        };
        let result = inner.gateway.poll(since, inner.config.poll_timeout).await;
        let mut state = inner.state.lock();
        match result {
            Ok(batch) => {
                let outcome =
                    state
                        .reconciler
                        .apply(batch, origin, Position::Append, inner.sink.as_ref());
                if let Some(fatal) = outcome.fatal {
                    state.poll.halt();
                    drop(state);
                    warn!(id = ?fatal.id, "server-reported error; halting the live poll");
                    self.push_notice(HALT_NOTICE);
                    return PollState::Halted;
                }
                state.poll.finish();
                state.poll.state()
            }
            Err(err) => {
                // Timing out and retrying is the expected steady state of a
                // long poll, so failures here stay quiet and unbounded.
                debug!(error = %err, since, "live poll attempt failed; retrying on next tick");
                state.poll.finish();
                state.poll.state()
            }
        }
    }

    /// Fetch up to `count` messages older than the low watermark and
    /// prepend them. Zero means the default page size; a negative count
    /// requests the entire remaining backlog. Returns the number of records
    /// the server sent.
    ///
    /// Participates in the busy contract. Refused without a gateway request
    /// once history is exhausted, while a history request is outstanding,
    /// or before the first batch has established a cursor.
    pub async fn load_older(&self, count: i64) -> Result<usize, EngineError> {
        let inner = &self.inner;
        let (requested, before) = {
            let mut state = inner.state.lock();
            let Some(before) = state.reconciler.watermarks().low() else {
                return Err(EngineError::HistoryNotPrimed);
            };
            let requested = state.history.try_begin(count, inner.config.page_size)?;
            (requested, before)
        };
        let _busy = inner.busy.begin();
        let result = inner.gateway.history(before, requested).await;
        let mut state = inner.state.lock();
        match result {
            Ok(batch) => {
                let received = batch.len();
                let outcome = state.reconciler.apply(
                    batch,
                    Origin::History,
                    Position::Prepend,
                    inner.sink.as_ref(),
                );
                if outcome.fatal.is_some() {
                    // The error record was rendered by the reconciler. It
                    // does not halt the live lane and it says nothing about
                    // whether more history exists, so skip the termination
                    // rule.
                    state.history.abort();
                    return Ok(received);
                }
                if state.history.finish(requested, received) {
                    info!("all history has been loaded");
                }
                debug!(received, before, "history page loaded");
                Ok(received)
            }
            Err(err) => {
                state.history.abort();
                drop(state);
                warn!(error = %err, before, "history load failed");
                self.push_notice(format!("Failed to load older messages: {err}"));
                Err(EngineError::Gateway(err))
            }
        }
    }

    /// Submit a composed message. Participates in the busy contract. When
    /// the server echoes a record back it is reconciled like a live batch;
    /// failures are surfaced as a local notice.
    pub async fn post(&self, body: impl Into<String>) -> Result<(), EngineError> {
        let body = body.into().trim().to_string();
        if body.is_empty() {
            return Err(EngineError::EmptyDraft);
        }
        let draft = Draft::new(body);
        let _busy = self.inner.busy.begin();
        match self.inner.gateway.post(&draft).await {
            Ok(None) => Ok(()),
            Ok(Some(record)) => {
                let mut state = self.inner.state.lock();
                let outcome = state.reconciler.apply(
                    Batch::single(record),
                    Origin::Live,
                    Position::Append,
                    self.inner.sink.as_ref(),
                );
                if outcome.fatal.is_some() {
                    state.poll.halt();
                    drop(state);
                    self.push_notice(HALT_NOTICE);
                }
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "message submission failed");
                self.push_notice(format!("Failed to send message: {err}"));
                Err(EngineError::Gateway(err))
            }
        }
    }

    /// Remove a message from the local view only. Never contacts the
    /// server; sinks treat unknown identifiers as a no-op.
    pub fn delete_local(&self, id: MessageId) {
        self.inner.sink.on_event(FeedEvent::Remove { id });
    }

    /// Request server-side deletion when this identity is allowed to, then
    /// remove the local copy. When deletion is not permitted, or the server
    /// refuses it, this degrades to local-only removal instead of failing.
    pub async fn delete_remote(&self, id: MessageId) -> Result<(), EngineError> {
        let permitted = {
            let state = self.inner.state.lock();
            self.inner
                .identity
                .may_delete_remote(id, state.reconciler.author_of(id))
        };
        if !permitted {
            debug!(id, "not permitted to delete remotely; removing local copy only");
            self.delete_local(id);
            return Ok(());
        }
        let _busy = self.inner.busy.begin();
        match self.inner.gateway.delete(id).await {
            Ok(confirmed) => {
                self.delete_local(confirmed);
                Ok(())
            }
            Err(GatewayError::Unauthorized(reason)) => {
                // The login may have been revoked since the identity was
                // loaded; the server gets the final say.
                warn!(id, %reason, "server refused deletion");
                self.push_notice(format!(
                    "Not authorized to delete message {id}; removed the local copy only."
                ));
                self.delete_local(id);
                Ok(())
            }
            Err(err) => {
                warn!(id, error = %err, "deletion request failed");
                self.push_notice(format!("Failed to delete message {id}: {err}"));
                Err(EngineError::Gateway(err))
            }
        }
    }

    /// Current cursor state. Read-only view.
    pub fn watermarks(&self) -> Watermarks {
        self.inner.state.lock().reconciler.watermarks()
    }

    pub fn poll_state(&self) -> PollState {
        self.inner.state.lock().poll.state()
    }

    pub fn history_exhausted(&self) -> bool {
        self.inner.state.lock().history.is_exhausted()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.is_busy()
    }

    /// Observer channel mirroring the number of busy-contract requests in
    /// flight. UI code disables input while the value is nonzero.
    pub fn busy_watch(&self) -> watch::Receiver<usize> {
        self.inner.busy.subscribe()
    }

    /// Synthesize a local notice in the feed: a negative-id, authorless,
    /// error-flagged message delivered straight to the sink. Notices bypass
    /// the reconciler so they never disturb the watermarks.
    fn push_notice(&self, text: impl Into<String>) {
        let now = local_time_8601();
        let message = Message {
            id: Some(self.inner.notice_seq.fetch_sub(1, Ordering::SeqCst)),
            created_at: Some(now.clone()),
            composed_at: Some(now),
            body: text.into(),
            is_error: true,
            ..Message::default()
        };
        self.inner.sink.on_event(FeedEvent::Insert {
            message,
            position: Position::Append,
            origin: Origin::Live,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::MockGateway;
    use crate::sink::RecordingSink;

    fn engine_with(gateway: Arc<MockGateway>, sink: Arc<RecordingSink>) -> FeedEngine {
        FeedEngine::new(gateway, sink, SyncConfig::default(), Identity::new("me"))
    }

    #[test]
    fn notices_use_descending_negative_ids() {
        let sink = Arc::new(RecordingSink::new());
        let engine = engine_with(Arc::new(MockGateway::new()), Arc::clone(&sink));
        engine.push_notice("first");
        engine.push_notice("second");
        let ids: Vec<MessageId> = sink
            .events()
            .into_iter()
            .map(|event| match event {
                FeedEvent::Insert { message, .. } => {
                    assert!(message.is_error);
                    assert!(message.is_system());
                    message.id.expect("notice id")
                }
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec![-1, -2]);
    }

    #[tokio::test]
    async fn empty_draft_is_refused_without_a_request() {
        let gateway = Arc::new(MockGateway::new());
        let engine = engine_with(Arc::clone(&gateway), Arc::new(RecordingSink::new()));
        assert!(matches!(
            engine.post("   ").await,
            Err(EngineError::EmptyDraft)
        ));
        assert!(gateway.post_calls().is_empty());
    }

    #[tokio::test]
    async fn drafts_carry_a_local_composition_time() {
        let gateway = Arc::new(MockGateway::new());
        let engine = engine_with(Arc::clone(&gateway), Arc::new(RecordingSink::new()));
        engine.post("  hello  ").await.expect("post");
        let drafts = gateway.post_calls();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].body, "hello");
        assert_eq!(drafts[0].composed_at.len(), 19);
    }
}
