//! Webhook end-to-end over HTTP with in-process fake provider and sender.

use async_trait::async_trait;
use bridge::bridge::{Bridge, Delivery};
use bridge::error::{DeliveryError, GenerationError};
use bridge::generation::TextGenerator;
use bridge::messaging::{MessageSender, OutboundMessage};
use bridge::webhook::{self, SignatureVerifier, WebhookState, SIGNATURE_HEADER};
use std::sync::{Arc, Mutex};

const FALLBACK: &str = "Sorry, I'm having trouble processing your request. Please try again later.";
const SENDER: &str = "whatsapp:+15551234567";

struct FakeGenerator {
    reply: Result<&'static str, &'static str>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    fn new(reply: Result<&'static str, &'static str>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply
            .map(str::to_string)
            .map_err(|e| GenerationError::Api(e.to_string()))
    }
}

#[derive(Default)]
struct FakeSender {
    fail: bool,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl FakeSender {
    fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for FakeSender {
    fn name(&self) -> &str {
        "fake"
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(message.clone());
        if self.fail {
            Err(DeliveryError::Api {
                status: 500,
                message: "upstream down".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Serve `state` on an ephemeral port; returns the webhook URL.
async fn spawn(state: WebhookState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    let app = webhook::router(state, "/whatsapp");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}/whatsapp", addr)
}

fn out_of_band(gen: Arc<FakeGenerator>, sender: Arc<FakeSender>) -> WebhookState {
    WebhookState::new(Arc::new(Bridge::new(
        gen,
        Delivery::OutOfBand(sender),
        FALLBACK,
    )))
}

#[tokio::test]
async fn round_trip_out_of_band() {
    let gen = FakeGenerator::new(Ok("Hi there!"));
    let sender = Arc::new(FakeSender::default());
    let url = spawn(out_of_band(gen.clone(), sender.clone())).await;

    let res = reqwest::Client::new()
        .post(&url)
        .form(&[("Body", "Hello"), ("From", SENDER)])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "OK");
    assert_eq!(gen.prompts(), vec!["Hello".to_string()]);
    assert_eq!(
        sender.sent(),
        vec![OutboundMessage {
            recipient: SENDER.to_string(),
            body: "Hi there!".to_string(),
        }]
    );
}

#[tokio::test]
async fn json_payload_is_accepted() {
    let gen = FakeGenerator::new(Ok("Hi there!"));
    let sender = Arc::new(FakeSender::default());
    let url = spawn(out_of_band(gen.clone(), sender.clone())).await;

    let res = reqwest::Client::new()
        .post(&url)
        .json(&serde_json::json!({ "Body": "Hello", "From": SENDER }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(sender.sent()[0].recipient, SENDER);
}

#[tokio::test]
async fn generation_failure_sends_apology_and_returns_500() {
    let gen = FakeGenerator::new(Err("quota exceeded"));
    let sender = Arc::new(FakeSender::default());
    let url = spawn(out_of_band(gen, sender.clone())).await;

    let res = reqwest::Client::new()
        .post(&url)
        .form(&[("Body", "Hello"), ("From", SENDER)])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 500);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Processing failed");
    assert!(body["details"].as_str().unwrap().contains("quota exceeded"));

    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body, FALLBACK);
    assert_eq!(sent[0].recipient, SENDER);
}

#[tokio::test]
async fn failing_fallback_still_returns_500() {
    let gen = FakeGenerator::new(Err("network down"));
    let sender = Arc::new(FakeSender {
        fail: true,
        ..Default::default()
    });
    let url = spawn(out_of_band(gen, sender.clone())).await;

    let res = reqwest::Client::new()
        .post(&url)
        .form(&[("Body", "Hello"), ("From", SENDER)])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 500);
    assert_eq!(sender.sent().len(), 1);
}

#[tokio::test]
async fn send_failure_returns_500_without_fallback() {
    let gen = FakeGenerator::new(Ok("Hi there!"));
    let sender = Arc::new(FakeSender {
        fail: true,
        ..Default::default()
    });
    let url = spawn(out_of_band(gen, sender.clone())).await;

    let res = reqwest::Client::new()
        .post(&url)
        .form(&[("Body", "Hello"), ("From", SENDER)])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 500);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["details"].as_str().unwrap().contains("upstream down"));
    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body, "Hi there!");
}

#[tokio::test]
async fn missing_body_is_rejected_before_generation() {
    let gen = FakeGenerator::new(Ok("unused"));
    let sender = Arc::new(FakeSender::default());
    let url = spawn(out_of_band(gen.clone(), sender.clone())).await;
    let client = reqwest::Client::new();

    for form in [
        vec![("From", SENDER)],
        vec![("Body", ""), ("From", SENDER)],
        vec![("Body", "Hello")],
    ] {
        let res = client.post(&url).form(&form).send().await.unwrap();
        assert_eq!(res.status(), 400);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["error"], "Malformed request");
    }

    assert!(gen.prompts().is_empty());
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn inline_mode_embeds_reply_and_sends_nothing() {
    let gen = FakeGenerator::new(Ok("pong & more"));
    let state = WebhookState::new(Arc::new(Bridge::new(gen.clone(), Delivery::Inline, FALLBACK)));
    let url = spawn(state).await;

    let res = reqwest::Client::new()
        .post(&url)
        .form(&[("Body", "ping"), ("From", SENDER)])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "text/xml");
    let xml = res.text().await.unwrap();
    assert!(xml.contains("<Message>pong &amp; more</Message>"), "{}", xml);
    assert_eq!(gen.prompts(), vec!["ping".to_string()]);
}

#[tokio::test]
async fn inline_generation_failure_is_500() {
    let gen = FakeGenerator::new(Err("boom"));
    let state = WebhookState::new(Arc::new(Bridge::new(gen, Delivery::Inline, FALLBACK)));
    let url = spawn(state).await;

    let res = reqwest::Client::new()
        .post(&url)
        .form(&[("Body", "ping"), ("From", SENDER)])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 500);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Processing failed");
}

#[tokio::test]
async fn same_request_twice_is_processed_twice() {
    let gen = FakeGenerator::new(Ok("Hi there!"));
    let sender = Arc::new(FakeSender::default());
    let url = spawn(out_of_band(gen.clone(), sender.clone())).await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let res = client
            .post(&url)
            .form(&[("Body", "Hello"), ("From", SENDER)])
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
    }

    assert_eq!(gen.prompts().len(), 2);
    assert_eq!(sender.sent().len(), 2);
}

#[tokio::test]
async fn signature_is_enforced_when_configured() {
    let gen = FakeGenerator::new(Ok("Hi there!"));
    let sender = Arc::new(FakeSender::default());
    let public_url = "https://bridge.example.com/whatsapp";
    let verifier = SignatureVerifier::new("auth-token", public_url);
    let state = out_of_band(gen.clone(), sender.clone()).with_verifier(verifier.clone());
    let url = spawn(state).await;
    let client = reqwest::Client::new();
    let form = [("Body", "Hello"), ("From", SENDER)];

    let res = client.post(&url).form(&form).send().await.unwrap();
    assert_eq!(res.status(), 403);

    let res = client
        .post(&url)
        .header(SIGNATURE_HEADER, "bm90LXRoZS1zaWduYXR1cmU=")
        .form(&form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
    assert!(gen.prompts().is_empty());

    let params: Vec<(String, String)> = form
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let res = client
        .post(&url)
        .header(SIGNATURE_HEADER, verifier.sign(&params))
        .form(&form)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(sender.sent().len(), 1);
}

#[tokio::test]
async fn non_post_on_webhook_path_is_liveness() {
    let gen = FakeGenerator::new(Ok("unused"));
    let sender = Arc::new(FakeSender::default());
    let url = spawn(out_of_band(gen.clone(), sender)).await;

    let res = reqwest::Client::new().get(&url).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], webhook::LIVENESS_MESSAGE);
    assert!(gen.prompts().is_empty());
}
