//! Twilio messaging client: POST /2010-04-01/Accounts/{sid}/Messages.json with basic auth.

use crate::config::MessagingSettings;
use crate::error::DeliveryError;
use crate::messaging::{MessageSender, OutboundMessage};
use async_trait::async_trait;
use serde::Deserialize;

const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Channel scheme prefixed to WhatsApp addresses.
pub const WHATSAPP_SCHEME: &str = "whatsapp:";

/// Prefix a bare number with the WhatsApp scheme. Already-scoped addresses are returned unchanged.
pub fn whatsapp_address(number: &str) -> String {
    let n = number.trim();
    if n.starts_with(WHATSAPP_SCHEME) {
        n.to_string()
    } else {
        format!("{}{}", WHATSAPP_SCHEME, n)
    }
}

/// Message resource returned by the create call (subset).
#[derive(Debug, Deserialize)]
pub struct MessageResource {
    pub sid: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<i64>,
    message: String,
}

/// Client for Twilio's Messages API, bound to one account and one sender number.
#[derive(Clone)]
pub struct TwilioClient {
    account_sid: String,
    auth_token: String,
    from: String,
    api_base: String,
    client: reqwest::Client,
}

impl TwilioClient {
    pub fn new(settings: &MessagingSettings) -> Result<Self, DeliveryError> {
        let api_base = settings
            .api_base
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| TWILIO_API_BASE.to_string());
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            account_sid: settings.credentials.account_sid.clone(),
            auth_token: settings.credentials.auth_token.clone(),
            from: whatsapp_address(&settings.credentials.phone_number),
            api_base,
            client,
        })
    }

    /// The `From` address used for every message ("whatsapp:+…").
    pub fn from_address(&self) -> &str {
        &self.from
    }

    /// Create one message. Returns the created resource on 2xx.
    pub async fn create_message(&self, to: &str, body: &str) -> Result<MessageResource, DeliveryError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        );
        let form = [("From", self.from.as_str()), ("To", to), ("Body", body)];
        let res = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorBody>(&text) {
                Ok(ApiErrorBody {
                    code: Some(code),
                    message,
                }) => format!("{} (code {})", message, code),
                Ok(ApiErrorBody { message, .. }) => message,
                Err(_) => text,
            };
            return Err(DeliveryError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let created: MessageResource = res.json().await?;
        Ok(created)
    }
}

#[async_trait]
impl MessageSender for TwilioClient {
    fn name(&self) -> &str {
        "twilio"
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let created = self.create_message(&message.recipient, &message.body).await?;
        log::debug!(
            "twilio: created message {} ({})",
            created.sid,
            created.status.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }
}
