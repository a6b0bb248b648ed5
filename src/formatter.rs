//! Post-processing of model output before it is shown.

/// Phrase the model uses when it declines an off-topic question.
///
/// This is a heuristic over the model's own wording, not a classifier; a
/// backend that phrases its refusal differently slips through.
pub const OFF_TOPIC_MARKER: &str = "not related to accounting";

pub const TOPICS_MESSAGE: &str = "I can only assist with accounting and finance related questions.
Please ask me about:
• Accounting principles
• Financial statements
• Bookkeeping
• Taxation
• Business finances
• Auditing";

const BULLET_MARKERS: &[char] = &['•', '-', '*'];

pub fn is_off_topic(text: &str) -> bool {
    text.to_lowercase().contains(OFF_TOPIC_MARKER)
}

/// Applies the topic gate: an off-topic refusal is replaced by [`TOPICS_MESSAGE`].
pub fn normalize(raw: &str) -> String {
    if is_off_topic(raw) {
        TOPICS_MESSAGE.to_string()
    } else {
        raw.to_string()
    }
}

/// Rewrites prose as one `•` bullet per sentence, unless it is already bulleted.
pub fn format_bullets(text: &str) -> String {
    let already_bulleted = text
        .trim()
        .lines()
        .any(|line| line.trim_start().starts_with(BULLET_MARKERS));
    if already_bulleted {
        return text.to_string();
    }

    text.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("• {}.", s))
        .collect::<Vec<_>>()
        .join("\n")
}
