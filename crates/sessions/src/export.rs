//! Plain-text transcript export.

use reflexion_core::session::{Sender, Session};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a session as a downloadable text transcript.
///
/// ```text
/// Reflexion Chat Session
/// Date: 2026-01-01 12:00:00
///
/// [2026-01-01 12:00:01] You:
/// question
///
/// [2026-01-01 12:00:09] Reflexion AI:
/// answer
/// ```
pub fn render_transcript(session: &Session) -> String {
    let mut out = format!(
        "Reflexion Chat Session\nDate: {}\n\n",
        session.created_at.format(TIMESTAMP_FORMAT)
    );

    for entry in &session.messages {
        let who = match entry.sender {
            Sender::User => "You",
            Sender::Ai => "Reflexion AI",
        };
        out.push_str(&format!(
            "[{}] {}:\n{}\n\n",
            entry.timestamp.format(TIMESTAMP_FORMAT),
            who,
            entry.text
        ));
    }

    out
}

/// Suggested download file name for a session export.
pub fn transcript_filename(session_id: &str) -> String {
    let safe: String = session_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("reflexion-chat-{safe}.txt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflexion_core::session::ChatEntry;

    #[test]
    fn renders_header_and_entries() {
        let mut session = Session::new("s1");
        session.messages.push(ChatEntry::user("What is Rust?"));
        session.messages.push(ChatEntry::ai("A systems language.", 2));

        let text = render_transcript(&session);
        assert!(text.starts_with("Reflexion Chat Session\nDate: "));
        assert!(text.contains("] You:\nWhat is Rust?\n\n"));
        assert!(text.contains("] Reflexion AI:\nA systems language.\n\n"));
        assert!(text.find("You:").unwrap() < text.find("Reflexion AI:").unwrap());
    }

    #[test]
    fn empty_session_has_only_header() {
        let text = render_transcript(&Session::new("empty"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn filename_is_sanitized() {
        assert_eq!(transcript_filename("abc-1"), "reflexion-chat-abc-1.txt");
        assert_eq!(transcript_filename("../x y"), "reflexion-chat-___x_y.txt");
    }
}
