pub mod commands;
pub mod config;
pub mod db;
pub mod doc_processor;
pub mod formatter;
pub mod llm;
pub mod session;
pub mod telemetry;

pub use config::{AppConfig, ConfigError};
pub use db::{HistoryStore, HistoryTarget};
pub use doc_processor::UploadedDocument;
pub use llm::{ChatMessage, LlmClient, ProviderConfig, ProviderKind, Responder};
pub use session::{ChatSession, SessionOptions, TurnOutcome};
