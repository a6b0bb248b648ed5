use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One saved question/answer exchange. Rows are insert-only.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatRecord {
    pub user_email: String,
    pub query: String,
    pub response: String,
    pub file_name: Option<String>,
    pub created_at: String,
}

impl ChatRecord {
    /// Builds a record stamped with the current UTC time.
    pub fn new(identity: &str, query: &str, response: &str, file_name: Option<&str>) -> Self {
        Self {
            user_email: identity.to_string(),
            query: query.to_string(),
            response: response.to_string(),
            file_name: file_name.map(str::to_string),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}
