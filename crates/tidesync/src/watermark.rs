use crate::model::MessageId;

/// Highest and lowest message identifiers observed so far.
///
/// The high watermark starts at a negative seed meaning "load the most
/// recent N messages" rather than "everything since zero"; the low
/// watermark is undefined until the first batch has been processed. The
/// high mark only ever grows and the low mark only ever shrinks, and both
/// are updated exclusively by the reconciler before any event reaches the
/// sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermarks {
    high: MessageId,
    low: Option<MessageId>,
}

impl Watermarks {
    /// Seed for a fresh session: ask the server for the latest
    /// `initial_backlog` messages on the first poll.
    pub fn seed(initial_backlog: u32) -> Self {
        Self {
            high: -(i64::from(initial_backlog)),
            low: None,
        }
    }

    /// Fold one observed identifier into the cursors.
    pub fn observe(&mut self, id: MessageId) {
        if id > self.high {
            self.high = id;
        }
        if self.low.is_none_or(|low| id < low) {
            self.low = Some(id);
        }
    }

    pub fn high(&self) -> MessageId {
        self.high
    }

    pub fn low(&self) -> Option<MessageId> {
        self.low
    }
}
