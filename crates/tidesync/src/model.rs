use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

/// Server-assigned message identifier. Strictly an ordering/cursor key;
/// identifiers are not guaranteed contiguous. Negative identifiers are
/// reserved for locally synthesized notices and never reach the server.
pub type MessageId = i64;

/// One record in a feed batch, using the server's wire field names.
///
/// A record is either a real message or, when `deletion_target` is set, an
/// instruction to remove a previously delivered message from the local view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Absent on deletion markers and on some server-synthesized error
    /// entries. A record without an identifier is still rendered but never
    /// moves the watermarks.
    #[serde(rename = "msgid", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Absent or empty for system notifications.
    #[serde(rename = "xfrom", default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Server-assigned receipt timestamp. Carried as an opaque display
    /// string; the engine never computes with it.
    #[serde(rename = "mtime", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Client-local composition timestamp, for per-author local-clock display.
    #[serde(rename = "lmtime", default, skip_serializing_if = "Option::is_none")]
    pub composed_at: Option<String>,
    /// Pre-rendered, server-sanitized body. Opaque to the engine.
    #[serde(rename = "xmsg", default)]
    pub body: String,
    #[serde(rename = "fname", default, skip_serializing_if = "Option::is_none")]
    pub attachment_name: Option<String>,
    #[serde(rename = "fsize", default, skip_serializing_if = "Option::is_none")]
    pub attachment_size: Option<u64>,
    #[serde(rename = "fmime", default, skip_serializing_if = "Option::is_none")]
    pub attachment_mime: Option<String>,
    /// Marks a message that represents a delivery/server error rather than
    /// real content. A live batch containing one of these halts the poller.
    #[serde(rename = "isError", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    /// When present the record is a deletion marker for this identifier.
    #[serde(rename = "mdel", default, skip_serializing_if = "Option::is_none")]
    pub deletion_target: Option<MessageId>,
}

impl Message {
    pub fn attachment(&self) -> Option<Attachment<'_>> {
        let name = self.attachment_name.as_deref()?;
        let byte_size = self.attachment_size.unwrap_or(0);
        if byte_size == 0 {
            return None;
        }
        Some(Attachment {
            name,
            byte_size,
            mime_type: self.attachment_mime.as_deref().unwrap_or("application/octet-stream"),
        })
    }

    /// System notifications carry no author.
    pub fn is_system(&self) -> bool {
        self.author.as_deref().is_none_or(str::is_empty)
    }
}

/// Borrowed view of a message's attachment metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment<'a> {
    pub name: &'a str,
    pub byte_size: u64,
    pub mime_type: &'a str,
}

/// A message composed locally, pending submission to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub body: String,
    /// Client-local composition time, ISO-8601 without zone suffix.
    pub composed_at: String,
}

impl Draft {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            composed_at: local_time_8601(),
        }
    }
}

/// Local wall-clock time formatted as `YYYY-MM-DDTHH:MM:SS`, matching the
/// format the server expects for the client-composition timestamp. Falls
/// back to UTC when the local offset cannot be determined.
pub fn local_time_8601() -> String {
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&format)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_uses_wire_field_names() {
        let raw = serde_json::json!({
            "msgid": 417,
            "xfrom": "drh",
            "mtime": "2021-10-08 15:04:44",
            "lmtime": "2021-10-08T11:04:41",
            "xmsg": "<p>hello</p>",
            "fname": "notes.txt",
            "fsize": 1204,
            "fmime": "text/plain"
        });
        let message: Message = serde_json::from_value(raw).expect("decode record");
        assert_eq!(message.id, Some(417));
        assert_eq!(message.author.as_deref(), Some("drh"));
        assert!(!message.is_error);
        assert!(message.deletion_target.is_none());
        let attachment = message.attachment().expect("attachment present");
        assert_eq!(attachment.name, "notes.txt");
        assert_eq!(attachment.byte_size, 1204);
        assert_eq!(attachment.mime_type, "text/plain");
    }

    #[test]
    fn deletion_marker_decodes_without_message_fields() {
        let message: Message =
            serde_json::from_value(serde_json::json!({ "mdel": 42 })).expect("decode marker");
        assert_eq!(message.deletion_target, Some(42));
        assert_eq!(message.id, None);
        assert!(message.body.is_empty());
    }

    #[test]
    fn zero_byte_attachment_is_ignored() {
        let message = Message {
            attachment_name: Some("empty".into()),
            attachment_size: Some(0),
            ..Message::default()
        };
        assert!(message.attachment().is_none());
    }

    #[test]
    fn missing_author_marks_system_notification() {
        assert!(Message::default().is_system());
        let message = Message {
            author: Some(String::new()),
            ..Message::default()
        };
        assert!(message.is_system());
    }

    #[test]
    fn local_time_has_expected_shape() {
        let stamp = local_time_8601();
        assert_eq!(stamp.len(), 19);
        assert_eq!(&stamp[10..11], "T");
    }
}
