//! Webhook HTTP server: receives provider callbacks and answers through the bridge.

mod protocol;
mod server;
mod signature;

pub use protocol::{escape_xml, message_response, WebhookPayload};
pub use server::{build_bridge, router, run_server, WebhookState, LIVENESS_MESSAGE};
pub use signature::{SignatureVerifier, SIGNATURE_HEADER};
