use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use ai_accountant_lib::commands::chat;
use ai_accountant_lib::{AppConfig, ChatSession, HistoryStore, HistoryTarget, LlmClient};

#[derive(Parser)]
#[command(name = "ai-accountant")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Backend to use: gemini, openai or grok (overrides LLM_PROVIDER)
    #[arg(short, long)]
    provider: Option<String>,

    /// Model identifier (overrides LLM_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// Save chat history under this email
    #[arg(short, long)]
    email: Option<String>,

    /// Ask for an email before answering questions
    #[arg(long)]
    identity_gate: bool,

    /// Rewrite answers as one bullet per sentence
    #[arg(long)]
    bullets: bool,

    /// Welcome message shown at the top of the conversation
    #[arg(long)]
    welcome: Option<String>,

    /// SQLite file for chat history when Supabase is not configured
    #[arg(long)]
    history_db: Option<PathBuf>,

    /// Load environment variables from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
        }
        // A missing .env is fine; the process environment may carry everything.
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let provider = cli.provider.clone();
    let mut config = AppConfig::from_lookup(|name| match (name, &provider) {
        ("LLM_PROVIDER", Some(kind)) => Some(kind.clone()),
        _ => std::env::var(name).ok(),
    })
    .context("invalid configuration")?;
    ai_accountant_lib::telemetry::init_tracing(&config.log);

    if let Some(model) = cli.model {
        config.provider.model = Some(model);
    }
    if cli.identity_gate {
        config.session.identity_gate = true;
    }
    if cli.bullets {
        config.session.bullet_responses = true;
    }
    if let Some(welcome) = cli.welcome {
        config.session.welcome_text = welcome;
    }
    if config.history.is_none() {
        config.history = cli.history_db.map(HistoryTarget::Sqlite);
    }

    let history = Arc::new(HistoryStore::connect(config.history.as_ref()).await);
    let status = history.status();
    if let Some(error) = status.error {
        eprintln!("Warning: Database connection failed - {}", error);
    }

    let client = LlmClient::new(&config.provider, Some(Arc::clone(&history)))
        .context("failed to initialize LLM client")?;

    tracing::info!(
        provider = %config.provider.kind,
        identity_gate = config.session.identity_gate,
        history = status.connected,
        "starting chat session"
    );

    let mut session = ChatSession::new(client, config.session);
    if let Some(email) = cli.email.or(config.user_email) {
        session.set_identity(&email);
    }

    let stdin = io::stdin();
    chat::run(&mut session, &history, stdin.lock(), io::stdout()).await?;

    Ok(())
}
