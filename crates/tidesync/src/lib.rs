//! Feed synchronization engine for a long-poll chat timeline.
//!
//! The engine keeps a locally rendered message timeline consistent with a
//! remote, append-mostly message log that is only reachable through
//! request/response polling. Two independent lanes talk to the server: a
//! repeating long-poll lane that fetches everything newer than the high
//! watermark, and an on-demand history lane that pages backwards from the
//! low watermark. Both hand their batches to a single [`Reconciler`] which
//! owns all shared cursor state and emits normalized events toward a
//! [`FeedSink`].
//!
//! The transport is abstracted behind [`Gateway`]; the crate ships a
//! reqwest-backed implementation plus a scripted mock for tests.

pub mod busy;
pub mod config;
pub mod engine;
pub mod gateway;
pub mod history;
pub mod model;
pub mod poll;
pub mod protocol;
pub mod reconcile;
pub mod sink;
pub mod watermark;

pub use busy::{BusyCounter, BusyGuard};
pub use config::{Identity, SyncConfig};
pub use engine::{EngineError, FeedEngine};
pub use gateway::http::HttpGateway;
pub use gateway::mock::MockGateway;
pub use gateway::{Gateway, GatewayError};
pub use history::HistoryDenied;
pub use model::{Draft, Message, MessageId};
pub use poll::PollState;
pub use protocol::{Batch, FeedEvent, Origin, Position};
pub use reconcile::{BatchOutcome, Reconciler};
pub use sink::{FeedSink, RecordingSink};
pub use watermark::Watermarks;
