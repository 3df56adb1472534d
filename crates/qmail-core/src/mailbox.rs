//! Mailbox service boundary.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::identity::Identity;
use crate::types::{MailItem, OutgoingMail};

/// Most items a single listing returns.
pub const LISTING_LIMIT: usize = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailboxError {
    #[error("recipient {0} not found")]
    RecipientNotFound(Identity),

    /// The service refused the request, e.g. an address already taken.
    #[error("rejected by server: {0}")]
    Rejected(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("bad response: {0}")]
    BadResponse(String),
}

#[async_trait]
pub trait Mailbox: Send + Sync {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), MailboxError>;

    /// Items addressed to `identity`, newest first.
    async fn inbox(&self, identity: &Identity) -> Result<Vec<MailItem>, MailboxError>;

    /// Items sent by `identity`, newest first.
    async fn sent(&self, identity: &Identity) -> Result<Vec<MailItem>, MailboxError>;
}

/// Mailbox held in memory, for tests and local demos.
#[derive(Default, Clone)]
pub struct InMemoryMailbox {
    items: Arc<RwLock<Vec<MailItem>>>,
}

impl InMemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    async fn listing(&self, keep: impl Fn(&MailItem) -> bool) -> Vec<MailItem> {
        let mut items: Vec<MailItem> = self.items.read().await.iter().filter(|item| keep(item)).cloned().collect();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        items.truncate(LISTING_LIMIT);
        items
    }
}

#[async_trait]
impl Mailbox for InMemoryMailbox {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), MailboxError> {
        self.items.write().await.push(MailItem::delivered_now(mail.clone()));
        Ok(())
    }

    async fn inbox(&self, identity: &Identity) -> Result<Vec<MailItem>, MailboxError> {
        Ok(self.listing(|item| &item.recipient_email == identity).await)
    }

    async fn sent(&self, identity: &Identity) -> Result<Vec<MailItem>, MailboxError> {
        Ok(self.listing(|item| &item.sender_email == identity).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(from: &str, to: &str, body: &str) -> OutgoingMail {
        OutgoingMail {
            sender_email: Identity::parse(from).unwrap(),
            recipient_email: Identity::parse(to).unwrap(),
            encrypted_body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn test_inbox_and_sent_are_newest_first() {
        let mailbox = InMemoryMailbox::new();
        mailbox.deliver(&mail("a@x", "b@x", "first")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        mailbox.deliver(&mail("a@x", "b@x", "second")).await.unwrap();
        mailbox.deliver(&mail("b@x", "a@x", "reply")).await.unwrap();

        let b = Identity::parse("b@x").unwrap();
        let inbox = mailbox.inbox(&b).await.unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].encrypted_body, "second");
        assert_eq!(inbox[1].encrypted_body, "first");

        let sent = mailbox.sent(&b).await.unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].encrypted_body, "reply");
    }

    #[tokio::test]
    async fn test_listing_is_capped() {
        let mailbox = InMemoryMailbox::new();
        for i in 0..(LISTING_LIMIT + 5) {
            mailbox.deliver(&mail("a@x", "b@x", &i.to_string())).await.unwrap();
        }
        let b = Identity::parse("b@x").unwrap();
        assert_eq!(mailbox.inbox(&b).await.unwrap().len(), LISTING_LIMIT);
    }
}
