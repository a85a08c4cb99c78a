//! Webhook HTTP server (single port).

use crate::bridge::{Bridge, BridgeOutcome, Delivery};
use crate::config::{ReplyMode, Settings};
use crate::error::WebhookError;
use crate::generation::build_generator;
use crate::messaging::TwilioClient;
use crate::webhook::protocol::{message_response, WebhookPayload};
use crate::webhook::signature::{SignatureVerifier, SIGNATURE_HEADER};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Body of the liveness reply on non-POST hits to the webhook path.
pub const LIVENESS_MESSAGE: &str = "WhatsApp bridge is running";

/// Shared state for the webhook routes. Holds no per-request data.
#[derive(Clone)]
pub struct WebhookState {
    pub bridge: Arc<Bridge>,
    /// When Some, every POST must carry a valid X-Twilio-Signature.
    pub verifier: Option<Arc<SignatureVerifier>>,
}

impl WebhookState {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self {
            bridge,
            verifier: None,
        }
    }

    pub fn with_verifier(mut self, verifier: SignatureVerifier) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }
}

/// Build the bridge from validated settings: provider client, and the Twilio client in out-of-band mode.
pub fn build_bridge(settings: &Settings) -> Result<Bridge> {
    let generator = build_generator(&settings.generation).context("building generation provider")?;
    let delivery = match settings.webhook.reply_mode {
        ReplyMode::Inline => Delivery::Inline,
        ReplyMode::OutOfBand => {
            let twilio = TwilioClient::new(&settings.messaging).context("building twilio client")?;
            log::info!("out-of-band replies from {}", twilio.from_address());
            Delivery::OutOfBand(Arc::new(twilio))
        }
    };
    Ok(Bridge::new(
        generator,
        delivery,
        settings.webhook.fallback_message.clone(),
    ))
}

/// Routes: POST `path` (webhook), any other method on `path` (liveness), GET / (health).
pub fn router(state: WebhookState, path: &str) -> Router {
    let mut app = Router::new().route(path, post(whatsapp_webhook).fallback(liveness));
    if path != "/" {
        app = app.route("/", get(health_http));
    }
    app.with_state(state)
}

/// Bind and serve until SIGINT/SIGTERM.
pub async fn run_server(settings: Settings) -> Result<()> {
    let bridge = Arc::new(build_bridge(&settings)?);
    let mut state = WebhookState::new(bridge);
    if settings.webhook.verify_signature {
        let url = settings
            .webhook
            .public_url
            .clone()
            .context("webhook.publicUrl is required for signature verification")?;
        state = state.with_verifier(SignatureVerifier::new(
            settings.messaging.credentials.auth_token.clone(),
            url,
        ));
        log::info!("webhook signature verification enabled");
    }

    let app = router(state, &settings.webhook.path);

    let bind_addr = format!("{}:{}", settings.server.bind.trim(), settings.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!(
        "webhook listening on {} (POST {}, {} replies)",
        bind_addr,
        settings.webhook.path,
        settings.webhook.reply_mode.as_str()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("webhook server exited")?;
    log::info!("webhook server stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining in-flight requests");
}

/// POST {path}: parse the provider payload, check the signature, run the bridge.
async fn whatsapp_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match process_webhook(&state, &headers, &body).await {
        Ok(res) => res,
        Err(e) => {
            if !matches!(e, WebhookError::Processing(_)) {
                log::warn!("webhook: rejected request: {}", e);
            }
            e.into_response()
        }
    }
}

async fn process_webhook(
    state: &WebhookState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, WebhookError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let payload = WebhookPayload::parse(content_type, body)?;

    if let Some(ref verifier) = state.verifier {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if !verifier.verify(payload.params(), signature) {
            return Err(WebhookError::BadSignature);
        }
    }

    let inbound = payload.to_inbound()?;
    match state.bridge.handle(&inbound).await? {
        BridgeOutcome::Delivered => Ok((StatusCode::OK, "OK").into_response()),
        BridgeOutcome::Inline { reply } => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/xml")],
            message_response(&reply),
        )
            .into_response()),
    }
}

/// Non-POST on the webhook path: liveness JSON.
async fn liveness() -> Json<serde_json::Value> {
    Json(json!({ "message": LIVENESS_MESSAGE }))
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<WebhookState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "mode": state.bridge.mode().as_str(),
        "provider": state.bridge.provider(),
    }))
}
