//! Send capability used by the bridge for out-of-band replies.

use crate::error::DeliveryError;
use crate::messaging::OutboundMessage;
use async_trait::async_trait;

/// Pushes one text message to a recipient. Implementations must not retry.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Provider name for logs (e.g. "twilio").
    fn name(&self) -> &str;

    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}
