pub mod chat;

use std::path::PathBuf;

pub const HELP: &str = "Commands:
  <text>            ask a question (or enter your email when asked)
  /attach <path>    attach a .pdf, .txt, .doc or .docx file
  /detach           remove the attached file
  /email <address>  save chat history under this email
  /history          show your saved chats
  /reset            start a new conversation
  /help             show this help
  /quit             exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Attach(PathBuf),
    Detach,
    Email(String),
    History,
    Reset,
    Help,
    Quit,
    /// Unknown slash command or missing argument.
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Ask(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match (name.to_lowercase().as_str(), arg) {
            ("attach", "") => Command::Invalid("usage: /attach <path>".into()),
            ("attach", path) => Command::Attach(PathBuf::from(path)),
            ("detach", _) => Command::Detach,
            ("email", "") => Command::Invalid("usage: /email <address>".into()),
            ("email", address) => Command::Email(address.to_string()),
            ("history", _) => Command::History,
            ("reset", _) => Command::Reset,
            ("help", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            (other, _) => Command::Invalid(format!("unknown command: /{}", other)),
        }
    }
}
