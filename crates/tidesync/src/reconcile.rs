use std::collections::HashMap;

use tracing::{debug, warn};

use crate::model::{Message, MessageId};
use crate::protocol::{Batch, FeedEvent, Origin, Position};
use crate::sink::FeedSink;
use crate::watermark::Watermarks;

/// What one batch did to the local timeline.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub inserted: usize,
    pub removed: usize,
    pub duplicates: usize,
    /// Set when the batch carried a server-reported error record. The poll
    /// lane treats this as terminal; the history lane does not.
    pub fatal: Option<Message>,
}

/// Single authority turning raw batches into watermark updates and
/// normalized sink events.
///
/// All cursor state lives here and is mutated synchronously while a batch
/// is applied, never across a suspension point, so the two request lanes
/// cannot race each other on it. Alongside the watermarks the reconciler
/// keeps an index of delivered identifiers and their authors: the index
/// suppresses duplicate redelivery (a server that re-sends an id already
/// rendered would otherwise produce a duplicate visual entry) and answers
/// authorship lookups for remote-deletion authorization.
pub struct Reconciler {
    watermarks: Watermarks,
    delivered: HashMap<MessageId, Option<String>>,
}

impl Reconciler {
    pub fn new(initial_backlog: u32) -> Self {
        Self {
            watermarks: Watermarks::seed(initial_backlog),
            delivered: HashMap::new(),
        }
    }

    pub fn watermarks(&self) -> Watermarks {
        self.watermarks
    }

    /// Author of a previously delivered message, if it is still known.
    pub fn author_of(&self, id: MessageId) -> Option<&str> {
        self.delivered.get(&id)?.as_deref()
    }

    pub fn is_delivered(&self, id: MessageId) -> bool {
        self.delivered.contains_key(&id)
    }

    /// Apply one batch in server-supplied record order, updating watermarks
    /// and emitting events to the sink.
    pub fn apply(
        &mut self,
        batch: Batch,
        origin: Origin,
        position: Position,
        sink: &dyn FeedSink,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for record in batch.records {
            if let Some(target) = record.deletion_target {
                // Deletion markers carry no content identifier of their own
                // worth tracking; they never touch the watermarks.
                self.delivered.remove(&target);
                sink.on_event(FeedEvent::Remove { id: target });
                outcome.removed += 1;
                continue;
            }
            let Some(id) = record.id else {
                // No identifier: still rendered, but it cannot participate
                // in cursor or dedup bookkeeping.
                if record.is_error {
                    outcome.fatal = Some(record.clone());
                }
                sink.on_event(FeedEvent::Insert {
                    message: record,
                    position,
                    origin,
                });
                outcome.inserted += 1;
                continue;
            };
            if self.delivered.contains_key(&id) {
                warn!(id, "server redelivered a known message; skipping");
                outcome.duplicates += 1;
                continue;
            }
            self.watermarks.observe(id);
            self.delivered.insert(id, record.author.clone());
            if record.is_error {
                outcome.fatal = Some(record.clone());
            }
            sink.on_event(FeedEvent::Insert {
                message: record,
                position,
                origin,
            });
            outcome.inserted += 1;
        }
        debug!(
            ?origin,
            inserted = outcome.inserted,
            removed = outcome.removed,
            duplicates = outcome.duplicates,
            high = self.watermarks.high(),
            low = ?self.watermarks.low(),
            "batch reconciled"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;

    fn message(id: MessageId) -> Message {
        Message {
            id: Some(id),
            author: Some(format!("user{id}")),
            body: format!("message {id}"),
            ..Message::default()
        }
    }

    fn marker(target: MessageId) -> Message {
        Message {
            deletion_target: Some(target),
            ..Message::default()
        }
    }

    #[test]
    fn batch_updates_both_watermarks_in_record_order() {
        let mut reconciler = Reconciler::new(50);
        let sink = RecordingSink::new();
        let batch = Batch::new(vec![message(5), message(2), message(9)]);
        let outcome = reconciler.apply(batch, Origin::Live, Position::Append, &sink);
        assert_eq!(outcome.inserted, 3);
        assert_eq!(reconciler.watermarks().high(), 9);
        assert_eq!(reconciler.watermarks().low(), Some(2));
        let ids: Vec<MessageId> = sink
            .events()
            .into_iter()
            .map(|event| match event {
                FeedEvent::Insert { message, .. } => message.id.expect("server id"),
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec![5, 2, 9]);
    }

    #[test]
    fn deletion_marker_emits_remove_without_watermark_change() {
        let mut reconciler = Reconciler::new(50);
        let sink = RecordingSink::new();
        reconciler.apply(
            Batch::single(marker(42)),
            Origin::Live,
            Position::Append,
            &sink,
        );
        assert_eq!(reconciler.watermarks().high(), -50);
        assert_eq!(reconciler.watermarks().low(), None);
        assert_eq!(sink.events(), vec![FeedEvent::Remove { id: 42 }]);
    }

    #[test]
    fn one_remove_per_marker_even_for_unknown_targets() {
        let mut reconciler = Reconciler::new(50);
        let sink = RecordingSink::new();
        let batch = Batch::new(vec![marker(7), marker(7)]);
        let outcome = reconciler.apply(batch, Origin::History, Position::Prepend, &sink);
        assert_eq!(outcome.removed, 2);
        assert_eq!(
            sink.events(),
            vec![FeedEvent::Remove { id: 7 }, FeedEvent::Remove { id: 7 }]
        );
    }

    #[test]
    fn redelivered_identifier_is_suppressed() {
        let mut reconciler = Reconciler::new(50);
        let sink = RecordingSink::new();
        reconciler.apply(
            Batch::new(vec![message(48), message(49), message(50)]),
            Origin::Live,
            Position::Append,
            &sink,
        );
        sink.take();
        let outcome = reconciler.apply(
            Batch::new(vec![message(50), message(51)]),
            Origin::Live,
            Position::Append,
            &sink,
        );
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(sink.len(), 1);
        assert_eq!(reconciler.watermarks().high(), 51);
    }

    #[test]
    fn error_record_is_rendered_and_flagged_fatal() {
        let mut reconciler = Reconciler::new(50);
        let sink = RecordingSink::new();
        let mut record = message(60);
        record.is_error = true;
        let outcome = reconciler.apply(
            Batch::single(record),
            Origin::Live,
            Position::Append,
            &sink,
        );
        assert_eq!(outcome.fatal.as_ref().and_then(|m| m.id), Some(60));
        // The error record itself still reaches the sink.
        assert_eq!(outcome.inserted, 1);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn identifierless_record_renders_without_cursor_updates() {
        let mut reconciler = Reconciler::new(50);
        let sink = RecordingSink::new();
        let record = Message {
            body: "the server croaked".into(),
            is_error: true,
            ..Message::default()
        };
        let outcome = reconciler.apply(
            Batch::single(record),
            Origin::Live,
            Position::Append,
            &sink,
        );
        assert_eq!(outcome.inserted, 1);
        assert!(outcome.fatal.is_some());
        assert_eq!(sink.len(), 1);
        // The negative seed and undefined low cursor survive untouched, so
        // the next poll and history requests keep their real cursors.
        assert_eq!(reconciler.watermarks().high(), -50);
        assert_eq!(reconciler.watermarks().low(), None);
    }

    #[test]
    fn deletion_forgets_authorship() {
        let mut reconciler = Reconciler::new(50);
        let sink = RecordingSink::new();
        reconciler.apply(
            Batch::single(message(12)),
            Origin::Live,
            Position::Append,
            &sink,
        );
        assert_eq!(reconciler.author_of(12), Some("user12"));
        reconciler.apply(
            Batch::single(marker(12)),
            Origin::Live,
            Position::Append,
            &sink,
        );
        assert_eq!(reconciler.author_of(12), None);
        assert!(!reconciler.is_delivered(12));
    }
}
