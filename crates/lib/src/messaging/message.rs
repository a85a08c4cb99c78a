//! Messages flowing through the bridge. Both live for a single webhook call.

/// A message received from the webhook: who sent it and what they wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Provider-scoped address, e.g. "whatsapp:+15551234567".
    pub sender: String,
    pub body: String,
}

/// A message to push through the send API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient: String,
    pub body: String,
}

impl InboundMessage {
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
        }
    }

    /// Reply addressed to the sender. The only way the bridge builds an [`OutboundMessage`].
    pub fn reply(&self, body: impl Into<String>) -> OutboundMessage {
        OutboundMessage {
            recipient: self.sender.clone(),
            body: body.into(),
        }
    }
}
