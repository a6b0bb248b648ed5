use std::io::{self, BufRead, Write};

use crate::db::HistoryStore;
use crate::doc_processor::UploadedDocument;
use crate::llm::{ChatMessage, Responder, Role};
use crate::session::{looks_like_email, ChatSession, Phase};

use super::{Command, HELP};

const HISTORY_LIMIT: usize = 10;

fn label(role: Role) -> &'static str {
    match role {
        Role::User => "you",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

fn render_turn(out: &mut impl Write, turn: &ChatMessage) -> io::Result<()> {
    writeln!(out, "[{}]", label(turn.role))?;
    for line in turn.content.lines() {
        writeln!(out, "  {}", line)?;
    }
    writeln!(out)
}

/// Drives a session from line-oriented input until EOF or `/quit`.
///
/// Each turn appended since the last prompt is rendered in order.
pub async fn run<R, I, O>(
    session: &mut ChatSession<R>,
    history: &HistoryStore,
    input: I,
    mut out: O,
) -> io::Result<()>
where
    R: Responder,
    I: BufRead,
    O: Write,
{
    for turn in session.turns() {
        render_turn(&mut out, turn)?;
    }
    let mut shown = session.turns().len();

    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;

        match Command::parse(&line) {
            Command::Quit => break,
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Invalid(message) => writeln!(out, "⚠️ {}", message)?,
            Command::Attach(path) => match UploadedDocument::from_path(&path) {
                Ok(document) => {
                    writeln!(out, "{}", document.summary())?;
                    session.attach(document);
                }
                Err(e) => writeln!(out, "⚠️ Could not attach {}: {}", path.display(), e)?,
            },
            Command::Detach => match session.detach() {
                Some(document) => writeln!(out, "Removed {}", document.name)?,
                None => writeln!(out, "No document attached")?,
            },
            Command::Email(address) => {
                if session.phase() == Phase::AwaitingIdentity {
                    if looks_like_email(&address) {
                        session.submit(&address).await;
                    } else {
                        writeln!(out, "⚠️ Please enter a valid email address")?;
                    }
                } else {
                    session.set_identity(&address);
                    if !address.contains('@') {
                        writeln!(out, "⚠️ Please enter a valid email address")?;
                    }
                    writeln!(out, "Chat history will be saved for {}", address)?;
                }
            }
            Command::History => match session.identity() {
                None => writeln!(out, "Enter your email with /email to see saved chats")?,
                Some(identity) => match history.recent(identity, HISTORY_LIMIT).await {
                    Ok(records) if records.is_empty() => writeln!(out, "No saved chats yet")?,
                    Ok(records) => {
                        for record in records {
                            let file = record
                                .file_name
                                .map(|f| format!(" [{}]", f))
                                .unwrap_or_default();
                            writeln!(out, "{}{} {}", record.created_at, file, record.query)?;
                        }
                    }
                    Err(e) => writeln!(out, "⚠️ History unavailable: {}", e)?,
                },
            },
            Command::Reset => {
                session.reset();
                shown = 0;
            }
            Command::Ask(text) => {
                session.submit(&text).await;
            }
        }

        // Turns only ever grow between resets.
        for turn in &session.turns()[shown..] {
            render_turn(&mut out, turn)?;
        }
        shown = session.turns().len();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::SqliteHistory;
    use crate::session::{SessionOptions, EMAIL_PROMPT};
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Responder for Echo {
        async fn generate(
            &self,
            messages: &[ChatMessage],
            document: Option<&UploadedDocument>,
            _identity: Option<&str>,
        ) -> String {
            let question = &messages.last().unwrap().content;
            match document {
                Some(doc) => format!("echo {} with {}", question, doc.name),
                None => format!("echo {}", question),
            }
        }
    }

    async fn transcript(session: &mut ChatSession<Echo>, history: &HistoryStore, script: &str) -> String {
        let mut out = Vec::new();
        run(session, history, script.as_bytes(), &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_questions_are_answered_in_order() {
        let options = SessionOptions {
            welcome_text: "Welcome".into(),
            ..SessionOptions::default()
        };
        let mut session = ChatSession::new(Echo, options);
        let output = transcript(&mut session, &HistoryStore::disconnected(), "What is equity?\n/quit\nignored\n").await;

        let welcome = output.find("  Welcome").unwrap();
        let question = output.find("  What is equity?").unwrap();
        let answer = output.find("  echo What is equity?").unwrap();
        assert!(welcome < question && question < answer);
        assert!(!output.contains("ignored"));
    }

    #[tokio::test]
    async fn test_attach_and_detach() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.txt");
        std::fs::write(&path, "Cash 100").unwrap();
        let script = format!("/attach {}\nBalanced?\n/detach\n/attach {}\n", path.display(), dir.path().join("x.png").display());

        let mut session = ChatSession::new(Echo, SessionOptions::default());
        let output = transcript(&mut session, &HistoryStore::disconnected(), &script).await;

        assert!(output.contains("Name: ledger.txt"));
        assert!(output.contains("echo Balanced? with ledger.txt"));
        assert!(output.contains("Removed ledger.txt"));
        assert!(output.contains("Unsupported file type: .png"));
        assert!(session.document().is_none());
    }

    #[tokio::test]
    async fn test_gated_session_prompts_then_replays() {
        let options = SessionOptions {
            identity_gate: true,
            ..SessionOptions::default()
        };
        let mut session = ChatSession::new(Echo, options);
        let output = transcript(&mut session, &HistoryStore::disconnected(), "hello\n/email a@b.com\n").await;

        assert!(output.contains(EMAIL_PROMPT));
        assert!(output.contains("echo hello"));
        assert_eq!(session.identity(), Some("a@b.com"));
    }

    #[tokio::test]
    async fn test_gated_email_command_rejects_non_address() {
        let options = SessionOptions {
            identity_gate: true,
            ..SessionOptions::default()
        };
        let mut session = ChatSession::new(Echo, options);
        let output = transcript(&mut session, &HistoryStore::disconnected(), "/email bob\nme@x.com\n").await;

        assert!(output.contains("Please enter a valid email address"));
        assert!(!output.contains("echo"));
        assert!(session.pending_question().is_none());
        assert_eq!(session.identity(), Some("me@x.com"));
    }

    #[tokio::test]
    async fn test_history_lists_saved_chats() {
        let local = SqliteHistory::open_in_memory().unwrap();
        let history = HistoryStore::from_sqlite(local);
        assert!(history.save("a@b.com", "What is accrual?", "• ...", Some("gl.pdf")).await);

        let mut session = ChatSession::new(Echo, SessionOptions::default());
        let output = transcript(&mut session, &history, "/history\n/email a@b.com\n/history\n").await;

        assert!(output.contains("Enter your email with /email"));
        assert!(output.contains("[gl.pdf] What is accrual?"));
    }

    #[tokio::test]
    async fn test_reset_redraws_welcome() {
        let options = SessionOptions {
            welcome_text: "Fresh start".into(),
            ..SessionOptions::default()
        };
        let mut session = ChatSession::new(Echo, options);
        let output = transcript(&mut session, &HistoryStore::disconnected(), "Q1\n/reset\n").await;

        assert_eq!(output.matches("  Fresh start").count(), 2);
        assert_eq!(session.turns().len(), 1);
    }
}
