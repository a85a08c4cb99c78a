//! Webhook wire format: inbound payload parsing and the inline XML reply document.

use crate::error::WebhookError;
use crate::messaging::InboundMessage;

/// Decoded webhook parameters, in the order they arrived.
///
/// Form bodies (the provider default) and JSON objects are both accepted; for JSON, the
/// top-level scalar fields become parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookPayload {
    params: Vec<(String, String)>,
}

impl WebhookPayload {
    pub fn parse(content_type: Option<&str>, body: &[u8]) -> Result<Self, WebhookError> {
        if is_json(content_type) {
            Self::parse_json(body)
        } else {
            Ok(Self::parse_form(body))
        }
    }

    pub fn parse_form(body: &[u8]) -> Self {
        Self {
            params: url::form_urlencoded::parse(body).into_owned().collect(),
        }
    }

    pub fn parse_json(body: &[u8]) -> Result<Self, WebhookError> {
        let value: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| WebhookError::Unparseable(e.to_string()))?;
        let serde_json::Value::Object(map) = value else {
            return Err(WebhookError::Unparseable(
                "expected a JSON object".to_string(),
            ));
        };
        let params = map
            .into_iter()
            .filter_map(|(k, v)| {
                let v = match v {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                Some((k, v))
            })
            .collect();
        Ok(Self { params })
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Extract sender and text. Absent or blank `Body`/`From` is a malformed request.
    pub fn to_inbound(&self) -> Result<InboundMessage, WebhookError> {
        let body = self
            .get("Body")
            .filter(|b| !b.trim().is_empty())
            .ok_or(WebhookError::MissingField("Body"))?;
        let from = self
            .get("From")
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or(WebhookError::MissingField("From"))?;
        Ok(InboundMessage::new(from, body))
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
        .unwrap_or(false)
}

/// Escape the five XML special characters.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Inline reply document: `<Response><Message>reply</Message></Response>`.
pub fn message_response(reply: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        escape_xml(reply)
    )
}
