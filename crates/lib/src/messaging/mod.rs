//! Messaging provider side: message types and the send capability.
//!
//! The bridge only needs to push a text to one address; [`MessageSender`] is that seam,
//! and [`TwilioClient`] is the production implementation.

mod message;
mod sender;
mod twilio;

pub use message::{InboundMessage, OutboundMessage};
pub use sender::MessageSender;
pub use twilio::{whatsapp_address, MessageResource, TwilioClient, WHATSAPP_SCHEME};
