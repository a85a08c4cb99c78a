//! WhatsApp reply bridge: receives provider webhooks, asks a text-generation provider
//! for a reply, and answers inline or through the provider's send API.

pub mod bridge;
pub mod config;
pub mod error;
pub mod generation;
pub mod messaging;
pub mod webhook;
