#![cfg(feature = "http-mailbox")]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::info;

use qmail_crypto::PublicKey;

use crate::directory::{DirectoryClient, DirectoryError};
use crate::identity::Identity;
use crate::mailbox::{Mailbox, MailboxError};
use crate::types::{AccountRegistration, MailItem, OutgoingMail};

/// Client for the QMail backend, which serves both the key directory and the
/// mailbox.
///
/// Identities are always pushed as single, percent-encoded path segments, so
/// an address containing `/`, `?` or `#` cannot address another resource.
#[derive(Clone)]
pub struct HttpMailboxClient {
    base_url: Url,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct KeyResponse {
    public_key: String,
}

#[derive(Deserialize)]
struct RegisterResponse {
    email: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    detail: serde_json::Value,
}

impl HttpMailboxClient {
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, MailboxError> {
        let base_url = Url::parse(base_url.as_ref())
            .map_err(|e| MailboxError::Http(format!("invalid base url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(MailboxError::Http(format!("invalid base url: {base_url}")));
        }
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| MailboxError::Http(e.to_string()))?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// `base_url` with `segments` appended, each encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Create an account and publish its public key.
    ///
    /// Returns the address the service assigned.
    pub async fn register_account(&self, request: &AccountRegistration) -> Result<Identity, MailboxError> {
        let resp = self
            .client
            .post(self.endpoint(&["register"]))
            .json(request)
            .send()
            .await
            .map_err(|e| MailboxError::Http(e.to_string()))?;

        match resp.status() {
            status if status.is_success() => {
                let body: RegisterResponse = resp
                    .json()
                    .await
                    .map_err(|e| MailboxError::BadResponse(e.to_string()))?;
                let identity = Identity::parse(&body.email)
                    .map_err(|e| MailboxError::BadResponse(format!("assigned address: {e}")))?;
                info!(identity = %identity, "account registered");
                Ok(identity)
            }
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                let text = resp.text().await.unwrap_or_default();
                Err(MailboxError::Rejected(error_detail(&text)))
            }
            other => Err(MailboxError::BadResponse(format!(
                "status={} body={:?}",
                other,
                resp.text().await.ok()
            ))),
        }
    }

    async fn list(&self, kind: &str, identity: &Identity) -> Result<Vec<MailItem>, MailboxError> {
        let resp = self
            .client
            .get(self.endpoint(&[kind, identity.as_str()]))
            .send()
            .await
            .map_err(|e| MailboxError::Http(e.to_string()))?;

        match resp.status() {
            StatusCode::OK => {
                let mut items: Vec<MailItem> = resp
                    .json()
                    .await
                    .map_err(|e| MailboxError::BadResponse(e.to_string()))?;
                items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                Ok(items)
            }
            other => Err(MailboxError::BadResponse(format!(
                "status={} body={:?}",
                other,
                resp.text().await.ok()
            ))),
        }
    }
}

/// The service's `detail` field, or the raw body when it has none.
fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(ErrorResponse {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorResponse { detail }) => detail.to_string(),
        Err(_) => body.to_string(),
    }
}

#[async_trait]
impl DirectoryClient for HttpMailboxClient {
    async fn resolve_public_key(&self, identity: &Identity) -> Result<PublicKey, DirectoryError> {
        let resp = self
            .client
            .get(self.endpoint(&["users", identity.as_str(), "key"]))
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

        match resp.status() {
            StatusCode::OK => {
                let body: KeyResponse = resp
                    .json()
                    .await
                    .map_err(|e| DirectoryError::Unavailable(format!("bad response: {e}")))?;
                PublicKey::from_text(&body.public_key).map_err(|source| DirectoryError::InvalidKey {
                    identity: identity.clone(),
                    source,
                })
            }
            StatusCode::NOT_FOUND => Err(DirectoryError::NotFound(identity.clone())),
            other => Err(DirectoryError::Unavailable(format!(
                "status={} body={:?}",
                other,
                resp.text().await.ok()
            ))),
        }
    }
}

#[async_trait]
impl Mailbox for HttpMailboxClient {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), MailboxError> {
        let resp = self
            .client
            .post(self.endpoint(&["send-email"]))
            .json(mail)
            .send()
            .await
            .map_err(|e| MailboxError::Http(e.to_string()))?;

        match resp.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(MailboxError::RecipientNotFound(mail.recipient_email.clone())),
            other => Err(MailboxError::BadResponse(format!(
                "status={} body={:?}",
                other,
                resp.text().await.ok()
            ))),
        }
    }

    async fn inbox(&self, identity: &Identity) -> Result<Vec<MailItem>, MailboxError> {
        self.list("inbox", identity).await
    }

    async fn sent(&self, identity: &Identity) -> Result<Vec<MailItem>, MailboxError> {
        self.list("sent", identity).await
    }
}
