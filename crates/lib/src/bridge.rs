//! Bridge handler: one inbound message in, one generated reply out.
//!
//! Steps are strictly sequential: generate, then (out-of-band) send. When generation
//! fails, an apology is sent best-effort and the failure is still reported to the caller.
//! Nothing is retried and nothing is kept between calls.

use crate::config::ReplyMode;
use crate::error::BridgeError;
use crate::generation::TextGenerator;
use crate::messaging::{InboundMessage, MessageSender};
use std::sync::Arc;

/// Where the reply goes. Inline mode has no sender at all.
#[derive(Clone)]
pub enum Delivery {
    /// Reply is returned to the webhook layer and embedded in the HTTP response.
    Inline,
    /// Reply is pushed through the given sender.
    OutOfBand(Arc<dyn MessageSender>),
}

impl Delivery {
    pub fn mode(&self) -> ReplyMode {
        match self {
            Delivery::Inline => ReplyMode::Inline,
            Delivery::OutOfBand(_) => ReplyMode::OutOfBand,
        }
    }
}

/// Result of a successfully bridged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// Inline mode: the generated text, to be embedded in the response.
    Inline { reply: String },
    /// Out-of-band mode: the generated text was accepted by the send API.
    Delivered,
}

/// Stateless handler shared across requests.
#[derive(Clone)]
pub struct Bridge {
    generator: Arc<dyn TextGenerator>,
    delivery: Delivery,
    fallback_message: String,
}

impl Bridge {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        delivery: Delivery,
        fallback_message: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            delivery,
            fallback_message: fallback_message.into(),
        }
    }

    pub fn mode(&self) -> ReplyMode {
        self.delivery.mode()
    }

    pub fn provider(&self) -> &str {
        self.generator.name()
    }

    /// Generate a reply for `inbound` and deliver it according to the reply mode.
    pub async fn handle(&self, inbound: &InboundMessage) -> Result<BridgeOutcome, BridgeError> {
        log::info!(
            "bridge: message from {} ({} chars)",
            inbound.sender,
            inbound.body.chars().count()
        );

        let generated = match self.generator.generate(&inbound.body).await {
            Ok(text) => text,
            Err(e) => {
                log::error!("bridge: {} generation failed: {}", self.generator.name(), e);
                let fallback_sent = self.send_fallback(inbound).await;
                return Err(BridgeError::Generation {
                    source: e,
                    fallback_sent,
                });
            }
        };

        match &self.delivery {
            Delivery::Inline => Ok(BridgeOutcome::Inline { reply: generated }),
            Delivery::OutOfBand(sender) => {
                let reply = inbound.reply(generated);
                if let Err(e) = sender.send(&reply).await {
                    log::error!("bridge: {} send to {} failed: {}", sender.name(), reply.recipient, e);
                    return Err(e.into());
                }
                log::info!("bridge: reply sent to {}", reply.recipient);
                Ok(BridgeOutcome::Delivered)
            }
        }
    }

    /// Best-effort apology after a generation failure. Failures are logged, never returned.
    async fn send_fallback(&self, inbound: &InboundMessage) -> bool {
        let Delivery::OutOfBand(sender) = &self.delivery else {
            return false;
        };
        match sender.send(&inbound.reply(self.fallback_message.as_str())).await {
            Ok(()) => {
                log::info!("bridge: fallback message sent to {}", inbound.sender);
                true
            }
            Err(e) => {
                log::warn!("bridge: fallback send to {} failed: {}", inbound.sender, e);
                false
            }
        }
    }
}
