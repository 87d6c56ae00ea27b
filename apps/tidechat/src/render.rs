//! Line-oriented render sink. Each feed event becomes one printed line;
//! placement, scrolling, and anything else visual stops here and never
//! feeds back into synchronization.

use crossterm::style::Stylize;
use tidesync::{FeedEvent, FeedSink, Message, Origin, Position};

pub struct TerminalSink;

impl TerminalSink {
    pub fn new() -> Self {
        Self
    }

    fn print_message(&self, message: &Message, position: Position, origin: Origin) {
        let stamp = message
            .created_at
            .as_deref()
            .or(message.composed_at.as_deref())
            .unwrap_or("");
        let body = plain_text(&message.body);
        let prefix = match (position, origin) {
            (Position::Prepend, _) | (_, Origin::History) => "(older) ",
            _ => "",
        };
        let line = if message.is_error {
            format!("{prefix}!! {body}").red().to_string()
        } else if message.is_system() {
            format!("{prefix}[{stamp}] -- {body}").dim().to_string()
        } else {
            let author = message.author.as_deref().unwrap_or("?");
            format!("{prefix}[{stamp}] <{author}> {body}")
        };
        println!("{line}");
        if let Some(attachment) = message.attachment() {
            let note = format!(
                "        ({} {} bytes, {})",
                attachment.name, attachment.byte_size, attachment.mime_type
            );
            println!("{}", note.dim());
        }
    }
}

impl FeedSink for TerminalSink {
    fn on_event(&self, event: FeedEvent) {
        match event {
            FeedEvent::Insert {
                message,
                position,
                origin,
            } => self.print_message(&message, position, origin),
            // The message may already be absent locally; that is fine.
            FeedEvent::Remove { id } => {
                println!("{}", format!("(message {id} deleted)").dim());
            }
        }
    }
}

/// Reduce the server's pre-rendered markup to plain terminal text: drop
/// tags, decode the handful of entities the server emits.
pub fn plain_text(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut in_tag = false;
    for ch in body.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            _ => out.push(ch),
        }
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}
