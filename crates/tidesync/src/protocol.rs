use serde::{Deserialize, Serialize};

use crate::model::{Message, MessageId};

/// The set of records returned by one gateway request. Processed atomically
/// by the reconciler, in server-supplied order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    #[serde(rename = "msgs", default)]
    pub records: Vec<Message>,
}

impl Batch {
    pub fn new(records: Vec<Message>) -> Self {
        Self { records }
    }

    pub fn single(record: Message) -> Self {
        Self {
            records: vec![record],
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Which lane produced a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The first activation of the live-poll lane.
    InitialLoad,
    /// Steady-state live polling, and locally synthesized records.
    Live,
    /// Backward pagination.
    History,
}

/// Where the sink should place an inserted message relative to the
/// existing timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Append,
    Prepend,
}

/// Normalized event handed to the render sink. Events within a batch are
/// emitted in server-supplied record order.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Insert {
        message: Message,
        position: Position,
        origin: Origin,
    },
    /// Remove a previously delivered message. Sinks must treat an unknown
    /// identifier as a no-op, not an error.
    Remove { id: MessageId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_decodes_wire_shape() {
        let batch: Batch = serde_json::from_str(
            r#"{"msgs":[{"msgid":7,"xmsg":"hi"},{"mdel":3}]}"#,
        )
        .expect("decode batch");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.records[0].id, Some(7));
        assert_eq!(batch.records[1].deletion_target, Some(3));
    }

    #[test]
    fn empty_payload_yields_empty_batch() {
        let batch: Batch = serde_json::from_str(r#"{"msgs":[]}"#).expect("decode");
        assert!(batch.is_empty());
    }
}
