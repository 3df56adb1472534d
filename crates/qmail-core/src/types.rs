use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::identity::Identity;

/// A sealed message on its way to the mailbox service.
///
/// `encrypted_body` is the text form of an encoded envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMail {
    pub sender_email: Identity,
    pub recipient_email: Identity,
    pub encrypted_body: String,
}

/// A message as listed by the mailbox service.
///
/// The service stamps `timestamp` in UTC on delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailItem {
    pub sender_email: Identity,
    pub recipient_email: Identity,
    pub encrypted_body: String,
    pub timestamp: NaiveDateTime,
}

impl MailItem {
    pub fn delivered_now(outgoing: OutgoingMail) -> Self {
        Self {
            sender_email: outgoing.sender_email,
            recipient_email: outgoing.recipient_email,
            encrypted_body: outgoing.encrypted_body,
            timestamp: Utc::now().naive_utc(),
        }
    }
}

/// New account request for the mailbox service.
///
/// The service creates `username@<its domain>` and publishes `public_key`
/// as that address's directory entry. No `Debug`: the password must not end
/// up in logs.
#[derive(Clone, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct AccountRegistration {
    pub username: String,
    pub password: String,
    /// Text form of the freshly generated public key.
    pub public_key: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    pub address: String,
    #[serde(rename = "recoveryEmail")]
    pub recovery_email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mail_item_accepts_service_json() {
        let json = r#"{
            "_id": "65a0c0ffee",
            "sender_email": "alice@qmail.co.in",
            "recipient_email": "bob@qmail.co.in",
            "encrypted_body": "UU1FVg==",
            "timestamp": "2024-01-12T08:30:00.123456"
        }"#;
        let item: MailItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.sender_email.as_str(), "alice@qmail.co.in");
        assert_eq!(item.timestamp.to_string(), "2024-01-12 08:30:00.123456");
    }

    #[test]
    fn test_account_registration_uses_service_field_names() {
        let request = AccountRegistration {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
            public_key: "X25519-HKDF-SHA256:AAAA".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            phone_number: "000".to_string(),
            address: "1 Rabbit Hole".to_string(),
            recovery_email: "alice@elsewhere.example".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["public_key"], "X25519-HKDF-SHA256:AAAA");
        assert_eq!(value["firstName"], "Alice");
        assert_eq!(value["phoneNumber"], "000");
        assert_eq!(value["recoveryEmail"], "alice@elsewhere.example");
    }
}
