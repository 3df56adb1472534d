//! qmail - command-line client for QMail
//!
//! This crate provides a command-line interface for:
//! - Generating and storing key pairs
//! - Sealing and opening envelopes offline
//! - Sending and reading mail through the QMail backend

pub mod cli;
pub mod config;
pub mod output;

pub use cli::Cli;
pub use config::{CliOverrides, Config};
pub use output::{JsonResponse, OutputFormat, OutputFormatter, SuccessMessage};

use qmail_core::{ClientError, DirectoryError, KeyStoreError, MailboxError, ReadError};
use qmail_crypto::CipherError;

/// Exit codes for CLI operations
///
/// Exit codes provide machine-readable status for scripting and automation:
/// - 0: Success - operation completed successfully
/// - 1: General error - unspecified error occurred
/// - 4: Connection failed - the backend could not be reached
/// - 5: Invalid input - bad arguments or data provided
/// - 6: Key not found - no local key, or no published key for a recipient
/// - 7: Already exists - a key is already stored for the identity
/// - 8: Cannot decrypt - the envelope could not be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Operation completed successfully (exit code 0)
    Success = 0,
    /// General error (exit code 1)
    GeneralError = 1,
    /// Connection failed (exit code 4)
    ConnectionFailed = 4,
    /// Invalid input provided (exit code 5)
    InvalidInput = 5,
    /// Key not found (exit code 6)
    KeyNotFound = 6,
    /// Key already exists (exit code 7)
    AlreadyExists = 7,
    /// Envelope could not be opened (exit code 8)
    CannotDecrypt = 8,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    /// Get the exit code name as a string
    pub fn name(&self) -> &'static str {
        match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::GeneralError => "GENERAL_ERROR",
            ExitCode::ConnectionFailed => "CONNECTION_FAILED",
            ExitCode::InvalidInput => "INVALID_INPUT",
            ExitCode::KeyNotFound => "KEY_NOT_FOUND",
            ExitCode::AlreadyExists => "ALREADY_EXISTS",
            ExitCode::CannotDecrypt => "CANNOT_DECRYPT",
        }
    }

    /// Get a human-readable description of the exit code
    pub fn description(&self) -> &'static str {
        match self {
            ExitCode::Success => "Operation completed successfully",
            ExitCode::GeneralError => "An unspecified error occurred",
            ExitCode::ConnectionFailed => "Could not reach the QMail server",
            ExitCode::InvalidInput => "Invalid arguments or data provided",
            ExitCode::KeyNotFound => "No key found for the identity",
            ExitCode::AlreadyExists => "A key already exists for the identity",
            ExitCode::CannotDecrypt => "The message could not be decrypted",
        }
    }

    /// Exit code for a failed cipher operation on user-supplied data.
    pub fn for_cipher_error(err: &CipherError) -> Self {
        match err {
            CipherError::UnsupportedAlgorithm { .. }
            | CipherError::InvalidPublicKey
            | CipherError::InvalidPrivateKey
            | CipherError::MessageTooLarge { .. } => ExitCode::InvalidInput,
            CipherError::MalformedEnvelope(_)
            | CipherError::AlgorithmMismatch { .. }
            | CipherError::DecryptionFailure => ExitCode::CannotDecrypt,
            CipherError::EncryptionFailed => ExitCode::GeneralError,
        }
    }

    pub fn for_key_store_error(err: &KeyStoreError) -> Self {
        match err {
            KeyStoreError::NotFound(_) => ExitCode::KeyNotFound,
            KeyStoreError::AlreadyExists(_) => ExitCode::AlreadyExists,
            KeyStoreError::Corrupted { .. } | KeyStoreError::OperationFailed(_) => ExitCode::GeneralError,
        }
    }

    pub fn for_client_error(err: &ClientError) -> Self {
        match err {
            ClientError::AlreadyRegistered(_) => ExitCode::AlreadyExists,
            ClientError::Cipher(e) => Self::for_cipher_error(e),
            ClientError::KeyStore(e) => Self::for_key_store_error(e),
            ClientError::Directory(DirectoryError::NotFound(_)) => ExitCode::KeyNotFound,
            ClientError::Directory(DirectoryError::InvalidKey { .. }) => ExitCode::GeneralError,
            ClientError::Directory(DirectoryError::Unavailable(_)) => ExitCode::ConnectionFailed,
            ClientError::Mailbox(e) => Self::for_mailbox_error(e),
        }
    }

    pub fn for_mailbox_error(err: &MailboxError) -> Self {
        match err {
            MailboxError::RecipientNotFound(_) | MailboxError::Rejected(_) => ExitCode::InvalidInput,
            MailboxError::Http(_) => ExitCode::ConnectionFailed,
            MailboxError::BadResponse(_) => ExitCode::GeneralError,
        }
    }

    pub fn for_read_error(err: &ReadError) -> Self {
        match err {
            ReadError::KeyNotFound(_) => ExitCode::KeyNotFound,
            ReadError::NotRecipient(_) => ExitCode::InvalidInput,
            ReadError::KeyStore(e) => Self::for_key_store_error(e),
            ReadError::Cipher(_) => ExitCode::CannotDecrypt,
        }
    }
}
