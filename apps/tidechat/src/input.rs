//! Stdin command loop. Plain lines become posts; slash commands drive
//! pagination and deletion.

use tidesync::{EngineError, FeedEngine, MessageId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Post(String),
    /// Load `n` older messages; 0 means the default page size.
    Older(i64),
    /// Load the entire remaining backlog.
    All,
    Delete(MessageId),
    Help,
    Quit,
}

/// Parse one input line. Returns `None` for blank lines and unrecognized
/// or malformed commands.
pub fn parse(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(Command::Post(line.to_string()));
    }
    let mut words = line.split_whitespace();
    let command = words.next()?;
    match command {
        "/older" => match words.next() {
            None => Some(Command::Older(0)),
            Some(count) => count.parse().ok().map(Command::Older),
        },
        "/all" => Some(Command::All),
        "/delete" => words.next()?.parse().ok().map(Command::Delete),
        "/help" => Some(Command::Help),
        "/quit" | "/q" => Some(Command::Quit),
        _ => None,
    }
}

const HELP: &str = "commands: /older [n]  /all  /delete <id>  /help  /quit \
                    -- anything else is sent as a message";

pub async fn run(engine: FeedEngine) -> anyhow::Result<()> {
    println!("{HELP}");
    let busy_rx = engine.busy_watch();
    announce_busy_transitions(engine.busy_watch());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = parse(&line) else {
            if line.trim().starts_with('/') {
                println!("unrecognized command; {HELP}");
            }
            continue;
        };
        // The busy contract: input is refused while a participating
        // request is outstanding.
        if *busy_rx.borrow() > 0 && !matches!(command, Command::Quit | Command::Help) {
            println!("(still working on the previous request)");
            continue;
        }
        match command {
            Command::Post(body) => {
                if let Err(err) = engine.post(body).await {
                    warn!(error = %err, "post rejected");
                }
            }
            Command::Older(count) => report_history(engine.load_older(count).await),
            Command::All => report_history(engine.load_older(-1).await),
            Command::Delete(id) => {
                if let Err(err) = engine.delete_remote(id).await {
                    warn!(error = %err, id, "deletion failed");
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }
    Ok(())
}

/// Print a line whenever the busy count crosses zero, so it is visible why
/// input is being refused and when it comes back.
fn announce_busy_transitions(mut busy_rx: tokio::sync::watch::Receiver<usize>) {
    tokio::spawn(async move {
        let mut was_busy = false;
        while busy_rx.changed().await.is_ok() {
            let busy = *busy_rx.borrow_and_update() > 0;
            if busy != was_busy {
                was_busy = busy;
                if busy {
                    println!("(working...)");
                } else {
                    println!("(ready)");
                }
            }
        }
    });
}

fn report_history(result: Result<usize, EngineError>) {
    match result {
        Ok(received) => println!("(loaded {received} older messages)"),
        Err(EngineError::HistoryExhausted) => println!("(all history has been loaded)"),
        Err(EngineError::HistoryInFlight) => println!("(a history request is already running)"),
        Err(EngineError::HistoryNotPrimed) => println!("(nothing loaded yet; try again shortly)"),
        // Gateway failures were already surfaced in the feed as a notice.
        Err(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_become_posts() {
        assert_eq!(parse("hello there"), Some(Command::Post("hello there".into())));
        assert_eq!(parse("   "), None);
    }

    #[test]
    fn older_accepts_an_optional_count() {
        assert_eq!(parse("/older"), Some(Command::Older(0)));
        assert_eq!(parse("/older 35"), Some(Command::Older(35)));
        assert_eq!(parse("/older many"), None);
    }

    #[test]
    fn delete_requires_an_id() {
        assert_eq!(parse("/delete 42"), Some(Command::Delete(42)));
        assert_eq!(parse("/delete"), None);
        assert_eq!(parse("/delete x"), None);
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert_eq!(parse("/frobnicate"), None);
        assert_eq!(parse("/quit"), Some(Command::Quit));
        assert_eq!(parse("/q"), Some(Command::Quit));
        assert_eq!(parse("/all"), Some(Command::All));
    }
}
