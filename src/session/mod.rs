//! Per-session turn handling.
//!
//! [`ChatSession`] owns the conversation, the (optionally verified) identity
//! and the attached document, and drives one [`Responder`] call per turn.

use crate::doc_processor::UploadedDocument;
use crate::formatter;
use crate::llm::{ChatMessage, Responder};

pub const DEFAULT_WELCOME: &str = "👋 Welcome! I'm your AI Accountant. I can help you with:
* Accounting principles and concepts
* Financial statements analysis
* Bookkeeping questions
* Tax-related queries
* Business financial planning
* Audit-related topics

Please upload relevant documents or ask your accounting questions!";

pub const ACCOUNTING_GUIDANCE: &str = "You are an AI Accountant. Only answer questions related to accounting, \
finance, taxation, auditing, or business financial matters. If the question is not related to \
these topics, politely decline to answer and remind the user of your accounting focus.";

pub const EMAIL_PROMPT: &str =
    "📧 Please enter your email address so your chat history can be saved. I'll answer your question right after.";

pub const EMAIL_ACK: &str = "✅ Thanks! Your email has been saved. Ask me any accounting question.";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Require an email before answering questions.
    pub identity_gate: bool,
    pub welcome_text: String,
    pub system_prompt: String,
    /// Re-flow answers into one bullet per sentence.
    pub bullet_responses: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            identity_gate: false,
            welcome_text: DEFAULT_WELCOME.to_string(),
            system_prompt: ACCOUNTING_GUIDANCE.to_string(),
            bullet_responses: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingIdentity,
    Ready,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Blank input; nothing recorded.
    Ignored,
    /// Input held as the pending question; the user was asked for an email.
    IdentityRequested,
    /// Email accepted with no question waiting.
    IdentityVerified,
    /// An assistant answer was appended.
    Answered(String),
}

/// Mutable state of one chat session.
#[derive(Debug, Clone)]
pub struct SessionState {
    turns: Vec<ChatMessage>,
    identity: Option<String>,
    pending: Option<String>,
    document: Option<UploadedDocument>,
}

impl SessionState {
    fn new(welcome: &str) -> Self {
        Self {
            turns: vec![ChatMessage::assistant(welcome)],
            identity: None,
            pending: None,
            document: None,
        }
    }
}

pub fn looks_like_email(input: &str) -> bool {
    input.contains('@') && input.contains('.')
}

pub struct ChatSession<R: Responder> {
    responder: R,
    options: SessionOptions,
    state: SessionState,
}

impl<R: Responder> ChatSession<R> {
    pub fn new(responder: R, options: SessionOptions) -> Self {
        let state = SessionState::new(&options.welcome_text);
        Self {
            responder,
            options,
            state,
        }
    }

    pub fn turns(&self) -> &[ChatMessage] {
        &self.state.turns
    }

    pub fn identity(&self) -> Option<&str> {
        self.state.identity.as_deref()
    }

    pub fn pending_question(&self) -> Option<&str> {
        self.state.pending.as_deref()
    }

    pub fn document(&self) -> Option<&UploadedDocument> {
        self.state.document.as_ref()
    }

    pub fn phase(&self) -> Phase {
        if self.options.identity_gate && self.state.identity.is_none() {
            Phase::AwaitingIdentity
        } else {
            Phase::Ready
        }
    }

    /// Records a free-text identity without gating.
    pub fn set_identity(&mut self, identity: &str) {
        let identity = identity.trim();
        if identity.is_empty() {
            self.state.identity = None;
            return;
        }
        if !identity.contains('@') {
            tracing::warn!(identity, "identity does not look like an email address");
        }
        self.state.identity = Some(identity.to_string());
    }

    pub fn attach(&mut self, document: UploadedDocument) {
        tracing::info!(file = %document.name, size = document.size, "document attached");
        self.state.document = Some(document);
    }

    pub fn detach(&mut self) -> Option<UploadedDocument> {
        self.state.document.take()
    }

    /// Restarts the conversation. A verified identity survives the restart.
    pub fn reset(&mut self) {
        let identity = self.state.identity.take();
        self.state = SessionState::new(&self.options.welcome_text);
        self.state.identity = identity;
    }

    pub async fn submit(&mut self, input: &str) -> TurnOutcome {
        let input = input.trim();
        if input.is_empty() {
            return TurnOutcome::Ignored;
        }

        match self.phase() {
            Phase::Ready => TurnOutcome::Answered(self.answer(input).await),
            Phase::AwaitingIdentity if looks_like_email(input) => {
                self.state.turns.push(ChatMessage::user(input));
                self.state.identity = Some(input.to_string());
                tracing::info!(identity = input, "identity verified");

                match self.state.pending.take() {
                    Some(question) => TurnOutcome::Answered(self.respond_to(&question).await),
                    None => {
                        self.state.turns.push(ChatMessage::assistant(EMAIL_ACK));
                        TurnOutcome::IdentityVerified
                    }
                }
            }
            Phase::AwaitingIdentity => {
                self.state.turns.push(ChatMessage::user(input));
                self.state.pending = Some(input.to_string());
                self.state.turns.push(ChatMessage::assistant(EMAIL_PROMPT));
                TurnOutcome::IdentityRequested
            }
        }
    }

    async fn answer(&mut self, question: &str) -> String {
        self.state.turns.push(ChatMessage::user(question));
        self.respond_to(question).await
    }

    async fn respond_to(&mut self, question: &str) -> String {
        let outgoing = [
            ChatMessage::system(self.options.system_prompt.as_str()),
            ChatMessage::user(question),
        ];

        let raw = self
            .responder
            .generate(
                &outgoing,
                self.state.document.as_ref(),
                self.state.identity.as_deref(),
            )
            .await;

        let mut reply = formatter::normalize(&raw);
        if self.options.bullet_responses {
            reply = formatter::format_bullets(&reply);
        }

        self.state.turns.push(ChatMessage::assistant(reply.as_str()));
        reply
    }
}
