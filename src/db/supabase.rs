use reqwest::Client;

use super::models::ChatRecord;
use super::HistoryError;

const TABLE: &str = "chat_history";

/// `chat_history` table behind a Supabase (PostgREST) endpoint.
#[derive(Debug, Clone)]
pub struct SupabaseHistory {
    client: Client,
    url: String,
    key: String,
}

impl SupabaseHistory {
    pub fn new(url: &str, key: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.url, TABLE)
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.table_url())
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, HistoryError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let message = resp.text().await.unwrap_or_default();
        Err(HistoryError::Rest { status, message })
    }

    /// `select * limit 1` against the table.
    pub async fn probe(&self) -> Result<(), HistoryError> {
        let resp = self
            .request(reqwest::Method::GET)
            .query(&[("select", "*"), ("limit", "1")])
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn insert(&self, record: &ChatRecord) -> Result<(), HistoryError> {
        let resp = self
            .request(reqwest::Method::POST)
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn recent(&self, identity: &str, limit: usize) -> Result<Vec<ChatRecord>, HistoryError> {
        let resp = self
            .request(reqwest::Method::GET)
            .query(&[
                ("select", "*".to_string()),
                ("user_email", format!("eq.{}", identity)),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;
        let records = Self::check(resp).await?.json::<Vec<ChatRecord>>().await?;
        Ok(records)
    }
}
