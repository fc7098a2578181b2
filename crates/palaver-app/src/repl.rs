//! Line-oriented front end: command parsing and text rendering.

use palaver_chat::ThreadSummary;
use palaver_core::types::{Message, ThreadId};

pub const HELP: &str = "\
Type a message and press Enter to send it.
An empty line sends the pending draft (e.g. a voice transcript).

  /new            start a new chat
  /threads        list chats
  /switch <n|id>  switch to chat number n, or by id prefix
  /history        show this chat, newest first
  /listen         capture one spoken message into the draft
  /stop           stop capturing
  /voice on|off   speak replies aloud, or not
  /help           show this help
  /quit           exit";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    SendDraft,
    New,
    Threads,
    Switch(String),
    History,
    Listen,
    Stop,
    Voice(bool),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command: /{0} (try /help)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parse one input line. Lines not starting with `/` are messages.
pub fn parse_line(line: &str) -> Result<Command, CommandError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Command::SendDraft);
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Command::Send(trimmed.to_string()));
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next().map(str::trim).unwrap_or_default();

    match name.as_str() {
        "new" => Ok(Command::New),
        "threads" | "chats" => Ok(Command::Threads),
        "switch" if arg.is_empty() => Err(CommandError::Usage("/switch <n|id>")),
        "switch" => Ok(Command::Switch(arg.to_string())),
        "history" => Ok(Command::History),
        "listen" => Ok(Command::Listen),
        "stop" => Ok(Command::Stop),
        "voice" => match arg.to_lowercase().as_str() {
            "on" => Ok(Command::Voice(true)),
            "off" => Ok(Command::Voice(false)),
            _ => Err(CommandError::Usage("/voice on|off")),
        },
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        _ => Err(CommandError::Unknown(name)),
    }
}

/// Resolve a `/switch` argument against the thread list.
///
/// Accepts a 1-based position, a full id, or an unambiguous id prefix.
/// All-digit arguments are always positions.
pub fn resolve_thread(arg: &str, threads: &[ThreadSummary]) -> Option<ThreadId> {
    let arg = arg.trim();
    if let Ok(n) = arg.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| threads.get(i)).map(|t| t.id);
    }
    if let Ok(id) = arg.parse::<ThreadId>() {
        return threads.iter().find(|t| t.id == id).map(|t| t.id);
    }
    let prefix = arg.to_lowercase();
    let mut matches = threads
        .iter()
        .filter(|t| t.id.to_string().starts_with(&prefix));
    match (matches.next(), matches.next()) {
        (Some(only), None) if !prefix.is_empty() => Some(only.id),
        _ => None,
    }
}

pub fn render_message(message: &Message) -> String {
    format!(
        "[{}] {}: {}",
        message.timestamp(),
        message.role().label(),
        message.content()
    )
}

pub fn render_messages(messages: &[Message]) -> String {
    if messages.is_empty() {
        return "(empty chat)".to_string();
    }
    messages
        .iter()
        .map(render_message)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Newest-first listing, as produced by the session's history view.
pub fn render_history(newest_first: &[Message]) -> String {
    if newest_first.is_empty() {
        return "No chat history".to_string();
    }
    render_messages(newest_first)
}

pub fn render_threads(threads: &[ThreadSummary]) -> String {
    threads
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let marker = if t.active { '*' } else { ' ' };
            let noun = if t.message_count == 1 { "message" } else { "messages" };
            let preview = t.preview.as_deref().unwrap_or("New chat");
            format!(
                "{} {}. {}  ({} {})  {}",
                marker,
                i + 1,
                t.id.short(),
                t.message_count,
                noun,
                preview
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::types::{Role, DEFAULT_TIME_FORMAT};

    fn summary(active: bool, count: usize, preview: Option<&str>) -> ThreadSummary {
        ThreadSummary {
            id: ThreadId::new(),
            message_count: count,
            preview: preview.map(str::to_string),
            active,
        }
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn test_plain_text_is_a_message() {
        assert_eq!(
            parse_line("what's the weather?"),
            Ok(Command::Send("what's the weather?".to_string()))
        );
    }

    #[test]
    fn test_empty_line_sends_draft() {
        assert_eq!(parse_line(""), Ok(Command::SendDraft));
        assert_eq!(parse_line("   "), Ok(Command::SendDraft));
    }

    #[test]
    fn test_commands() {
        assert_eq!(parse_line("/new"), Ok(Command::New));
        assert_eq!(parse_line("/threads"), Ok(Command::Threads));
        assert_eq!(parse_line("/history"), Ok(Command::History));
        assert_eq!(parse_line("/listen"), Ok(Command::Listen));
        assert_eq!(parse_line("/stop"), Ok(Command::Stop));
        assert_eq!(parse_line("/help"), Ok(Command::Help));
        assert_eq!(parse_line("/quit"), Ok(Command::Quit));
        assert_eq!(parse_line("  /QUIT  "), Ok(Command::Quit));
    }

    #[test]
    fn test_switch_requires_argument() {
        assert_eq!(parse_line("/switch 2"), Ok(Command::Switch("2".to_string())));
        assert_eq!(
            parse_line("/switch"),
            Err(CommandError::Usage("/switch <n|id>"))
        );
    }

    #[test]
    fn test_voice_toggle() {
        assert_eq!(parse_line("/voice on"), Ok(Command::Voice(true)));
        assert_eq!(parse_line("/voice OFF"), Ok(Command::Voice(false)));
        assert!(parse_line("/voice maybe").is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_line("/dance"),
            Err(CommandError::Unknown("dance".to_string()))
        );
    }

    // =========================================================================
    // Thread resolution
    // =========================================================================

    #[test]
    fn test_resolve_by_position() {
        let threads = vec![summary(true, 0, None), summary(false, 2, Some("hi"))];
        assert_eq!(resolve_thread("2", &threads), Some(threads[1].id));
        assert_eq!(resolve_thread("3", &threads), None);
        assert_eq!(resolve_thread("0", &threads), None);
    }

    #[test]
    fn test_resolve_by_full_id_and_prefix() {
        let mut threads = vec![summary(true, 0, None), summary(false, 0, None)];
        threads[0].id = "ab000000-0000-4000-8000-000000000001".parse().unwrap();
        threads[1].id = "abc00000-0000-4000-8000-000000000002".parse().unwrap();
        let target = threads[1].id;

        assert_eq!(resolve_thread(&target.to_string(), &threads), Some(target));
        assert_eq!(resolve_thread("abc0", &threads), Some(target));
        assert_eq!(resolve_thread("ABC0", &threads), Some(target));
        assert_eq!(resolve_thread("ab", &threads), None);
        assert_eq!(resolve_thread(&ThreadId::new().to_string(), &threads), None);
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    #[test]
    fn test_render_message_uses_labels() {
        let user = Message::user("hello", DEFAULT_TIME_FORMAT);
        let line = render_message(&user);
        assert!(line.ends_with("] You: hello"));
        assert!(line.starts_with(&format!("[{}]", user.timestamp())));

        let reply = Message::assistant("hi there", DEFAULT_TIME_FORMAT);
        assert!(render_message(&reply).ends_with("] AI: hi there"));
        assert_eq!(reply.role(), Role::Assistant);
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(render_history(&[]), "No chat history");
        assert_eq!(render_messages(&[]), "(empty chat)");
    }

    #[test]
    fn test_render_history_lines() {
        let history = vec![
            Message::assistant("second", DEFAULT_TIME_FORMAT),
            Message::user("first", DEFAULT_TIME_FORMAT),
        ];
        let text = render_history(&history);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("AI: second"));
        assert!(lines[1].ends_with("You: first"));
    }

    #[test]
    fn test_render_threads_marks_active() {
        let threads = vec![
            summary(false, 1, Some("hello")),
            summary(true, 0, None),
        ];
        let text = render_threads(&threads);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("  1. "));
        assert!(lines[0].contains("(1 message)"));
        assert!(lines[0].ends_with("hello"));
        assert!(lines[1].starts_with("* 2. "));
        assert!(lines[1].ends_with("New chat"));
    }
}
