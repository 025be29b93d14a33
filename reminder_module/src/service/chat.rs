use std::time::Duration;

use serde_json::Value;
use tracing::warn;

pub const DEFAULT_GENERATIVE_MODEL: &str = "gemini-1.5-flash";
const GENERATIVE_TIMEOUT_SECS: u64 = 30;

pub(super) fn default_generative_url(model: &str) -> String {
    format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
        model
    )
}

/// Forwards chat requests to the generative-text API untouched.
#[derive(Debug, Clone)]
pub struct ChatRelay {
    api_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl ChatRelay {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(GENERATIVE_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            api_url: api_url.into(),
            api_key,
            http,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Errors are short reasons safe to hand back to the caller.
    pub async fn forward(&self, body: &Value) -> Result<Value, &'static str> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err("chat is not configured");
        };
        let response = self
            .http
            .post(&self.api_url)
            .query(&[("key", api_key)])
            .json(body)
            .send()
            .await
            .map_err(|err| {
                warn!("generative API request failed: {}", err);
                "upstream request failed"
            })?;
        let status = response.status();
        if !status.is_success() {
            warn!("generative API returned {}", status);
            return Err("upstream returned an error");
        }
        response.json::<Value>().await.map_err(|err| {
            warn!("generative API returned invalid JSON: {}", err);
            "upstream returned invalid JSON"
        })
    }
}
