//! X-Twilio-Signature verification.
//!
//! signature = base64(HMAC-SHA1(auth_token, url + concat(sorted key + value)))

use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_HEADER: &str = "X-Twilio-Signature";

/// Verifies webhook signatures for one public URL.
#[derive(Clone)]
pub struct SignatureVerifier {
    auth_token: String,
    url: String,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    /// `url` must be the exact URL configured at the provider, including any query string.
    pub fn new(auth_token: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            url: url.into(),
        }
    }

    fn mac(&self, params: &[(String, String)]) -> Option<HmacSha1> {
        let mut mac = HmacSha1::new_from_slice(self.auth_token.as_bytes()).ok()?;
        mac.update(self.url.as_bytes());
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort();
        for (k, v) in sorted {
            mac.update(k.as_bytes());
            mac.update(v.as_bytes());
        }
        Some(mac)
    }

    /// Signature the provider would send for `params`.
    pub fn sign(&self, params: &[(String, String)]) -> String {
        self.mac(params)
            .map(|m| base64::engine::general_purpose::STANDARD.encode(m.finalize().into_bytes()))
            .unwrap_or_default()
    }

    /// Constant-time check of a received signature header.
    pub fn verify(&self, params: &[(String, String)], signature: Option<&str>) -> bool {
        let Some(signature) = signature.map(str::trim).filter(|s| !s.is_empty()) else {
            log::warn!("webhook: missing {}", SIGNATURE_HEADER);
            return false;
        };
        let Ok(provided) = base64::engine::general_purpose::STANDARD.decode(signature) else {
            log::warn!("webhook: {} is not base64", SIGNATURE_HEADER);
            return false;
        };
        let Some(mac) = self.mac(params) else {
            return false;
        };
        mac.verify_slice(&provided).is_ok()
    }
}
