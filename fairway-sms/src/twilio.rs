//! Twilio delivery channel
//!
//! Posts to the Messages resource of the Twilio REST API:
//! `POST {api_base}/2010-04-01/Accounts/{sid}/Messages.json`
//! with form fields `To`, `From`, `Body` and basic auth.

use async_trait::async_trait;
use fairway_common::config::SmsCredentials;
use fairway_common::notify::SmsChannel;
use fairway_common::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Twilio REST API base
pub const DEFAULT_API_BASE: &str = "https://api.twilio.com";

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<i64>,
    message: Option<String>,
}

pub struct TwilioChannel {
    http_client: Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    api_base: String,
}

impl TwilioChannel {
    pub fn new(credentials: &SmsCredentials, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Delivery(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            account_sid: credentials.account_sid.clone(),
            auth_token: credentials.auth_token.clone(),
            from_number: credentials.from_number.clone(),
            api_base: credentials
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

#[async_trait]
impl SmsChannel for TwilioChannel {
    async fn send(&self, to: &str, body: &str) -> Result<()> {
        let response = self
            .http_client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("request to {} failed: {}", to, e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            let sid = serde_json::from_str::<MessageResource>(&text)
                .ok()
                .and_then(|m| m.sid)
                .unwrap_or_default();
            debug!("Twilio accepted message to {} (sid {})", to, sid);
            return Ok(());
        }

        let detail = serde_json::from_str::<ApiErrorBody>(&text)
            .ok()
            .map(|e| {
                format!(
                    "code {}: {}",
                    e.code.unwrap_or_default(),
                    e.message.unwrap_or_default()
                )
            })
            .unwrap_or(text);

        Err(Error::Delivery(format!(
            "Twilio rejected message to {} (status {}): {}",
            to, status, detail
        )))
    }

    fn name(&self) -> &'static str {
        "twilio"
    }
}
