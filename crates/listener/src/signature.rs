//! Webhook authentication.
//!
//! GitHub signs the raw body with HMAC-SHA256 and sends `sha256=<hex>` in
//! `X-Hub-Signature-256`. Gitee either sends the shared secret verbatim in
//! `X-Gitee-Token` or, when no token header is present, an HMAC-SHA256 hex
//! digest of the body in `X-Gitee-Signature`.
//!
//! Every check runs over the exact bytes received. The body handed back is
//! those same bytes, except for form-encoded GitHub deliveries where it is the
//! decoded `payload` field.

use axum::body::Bytes;
use axum::http::{header, HeaderMap};
use hmac::{Hmac, Mac};
use pipeline::{ForgeSource, ForgebotError};
use sha2::{Digest, Sha256};

use crate::source::{
    header_str, GITEE_SIGNATURE_HEADER, GITEE_TOKEN_HEADER, GITHUB_SIGNATURE_HEADER,
};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_PREFIX: &str = "sha256=";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const FORM_PAYLOAD_FIELD: &str = "payload";

/// Verifies inbound webhook requests against one shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    mac: HmacSha256,
    secret_digest: [u8; 32],
}

impl WebhookVerifier {
    /// Creates a verifier for `secret`. An empty secret is a configuration
    /// error.
    pub fn new(secret: &str) -> Result<Self, ForgebotError> {
        if secret.is_empty() {
            return Err(ForgebotError::configuration("webhook secret must not be empty"));
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| ForgebotError::configuration(format!("invalid webhook secret: {e}")))?;
        Ok(Self {
            mac,
            secret_digest: Sha256::digest(secret.as_bytes()).into(),
        })
    }

    /// Authenticates a request from `source` and returns the event body.
    pub fn verify(
        &self,
        source: ForgeSource,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Bytes, ForgebotError> {
        match source {
            ForgeSource::GitHub => self.verify_github(headers, body),
            ForgeSource::Gitee => self.verify_gitee(headers, body),
        }
    }

    /// HMAC-SHA256 of `body` under the configured secret.
    pub fn compute_signature(&self, body: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }

    /// Constant-time check of `signature` against the MAC of `body`.
    pub fn verify_signature(&self, body: &[u8], signature: &[u8]) -> bool {
        let mut mac = self.mac.clone();
        mac.update(body);
        mac.verify_slice(signature).is_ok()
    }

    fn verify_github(&self, headers: &HeaderMap, body: Bytes) -> Result<Bytes, ForgebotError> {
        let header = header_str(headers, GITHUB_SIGNATURE_HEADER).ok_or_else(|| {
            ForgebotError::authentication(format!("missing {GITHUB_SIGNATURE_HEADER} header"))
        })?;
        let signature = parse_signature_header(header).ok_or_else(|| {
            ForgebotError::authentication(format!("malformed {GITHUB_SIGNATURE_HEADER} header"))
        })?;
        if !self.verify_signature(&body, &signature) {
            return Err(ForgebotError::authentication("payload signature mismatch"));
        }

        if is_form_encoded(headers) {
            return form_payload(&body);
        }
        Ok(body)
    }

    fn verify_gitee(&self, headers: &HeaderMap, body: Bytes) -> Result<Bytes, ForgebotError> {
        if let Some(token) = header_str(headers, GITEE_TOKEN_HEADER) {
            // Compare digests, not the raw strings, so timing does not leak
            // a matching prefix.
            let digest: [u8; 32] = Sha256::digest(token.as_bytes()).into();
            if digest != self.secret_digest {
                return Err(ForgebotError::authentication("gitee token mismatch"));
            }
            return Ok(body);
        }

        let header = header_str(headers, GITEE_SIGNATURE_HEADER)
            .ok_or_else(|| ForgebotError::authentication("no gitee token or signature found"))?;
        let signature = hex::decode(header.strip_prefix(SIGNATURE_PREFIX).unwrap_or(header))
            .map_err(|_| {
                ForgebotError::authentication(format!("malformed {GITEE_SIGNATURE_HEADER} header"))
            })?;
        if !self.verify_signature(&body, &signature) {
            return Err(ForgebotError::authentication("gitee signature mismatch"));
        }
        Ok(body)
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

/// Formats a MAC the way GitHub sends it: `sha256=<lowercase hex>`.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("{SIGNATURE_PREFIX}{}", hex::encode(signature))
}

/// Parses a `sha256=<hex>` header value into raw MAC bytes.
pub fn parse_signature_header(value: &str) -> Option<Vec<u8>> {
    let hex_digest = value.trim().strip_prefix(SIGNATURE_PREFIX)?;
    hex::decode(hex_digest).ok()
}

fn is_form_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

fn form_payload(body: &[u8]) -> Result<Bytes, ForgebotError> {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == FORM_PAYLOAD_FIELD)
        .map(|(_, value)| Bytes::from(value.into_owned()))
        .ok_or_else(|| {
            ForgebotError::decode(format!("form body has no `{FORM_PAYLOAD_FIELD}` field"))
        })
}
