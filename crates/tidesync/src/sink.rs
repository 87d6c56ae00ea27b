use parking_lot::Mutex;

use crate::protocol::FeedEvent;

/// Consumer of normalized feed events. Implementations decide visual
/// placement, scrolling, and notification behavior; none of that affects
/// synchronization correctness.
///
/// Events are delivered synchronously from the reconciler, in order, so
/// implementations should return quickly.
pub trait FeedSink: Send + Sync {
    fn on_event(&self, event: FeedEvent);
}

/// Sink that records every event it receives. Test support.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<FeedEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FeedEvent> {
        self.events.lock().clone()
    }

    /// Drains and returns everything recorded so far.
    pub fn take(&self) -> Vec<FeedEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl FeedSink for RecordingSink {
    fn on_event(&self, event: FeedEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MessageId;

    #[test]
    fn recording_sink_preserves_order() {
        let sink = RecordingSink::new();
        for id in [3, 1, 2] {
            sink.on_event(FeedEvent::Remove { id });
        }
        let ids: Vec<MessageId> = sink
            .take()
            .into_iter()
            .map(|event| match event {
                FeedEvent::Remove { id } => id,
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert!(sink.is_empty());
    }
}
