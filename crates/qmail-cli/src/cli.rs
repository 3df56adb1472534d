//! CLI command definitions and argument parsing

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context as _};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use qmail_core::file_store::FileKeyStore;
use qmail_core::http_mailbox::HttpMailboxClient;
use qmail_core::sqlite_store::SqliteKeyStore;
use qmail_core::{
    register_key, AccountRegistration, Identity, KeyStore, MailClient, ReadError, RegisterMode,
};
use qmail_crypto::{AlgorithmId, MessageCipher, PublicKey, StandardKem};

use crate::config::Config;
use crate::output::{Folder, KeyInfo, MailEntry, OutputFormat, OutputFormatter, SuccessMessage};
use crate::ExitCode;

/// qmail - post-quantum mail client
#[derive(Parser, Debug)]
#[command(name = "qmail")]
#[command(version, about = "QMail client - key management and end-to-end encrypted mail")]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file path
    #[arg(long, global = true, env = "QMAIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server URL (overrides config)
    #[arg(long, global = true, env = "QMAIL_SERVER")]
    pub server: Option<String>,

    /// Key store location (overrides config)
    #[arg(long, global = true)]
    pub keystore: Option<PathBuf>,
}

impl Cli {
    /// Execute the CLI command with a pre-loaded configuration
    pub async fn execute_with_config(self, config: Config) -> anyhow::Result<ExitCode> {
        let out = OutputFormatter::new(self.output, self.verbose);
        let ctx = CommandContext::new(config);

        match self.command {
            Commands::Keygen(args) => args.execute(&ctx, &out).await,
            Commands::Register(args) => args.execute(&ctx, &out).await,
            Commands::Seal(args) => args.execute(&ctx, &out),
            Commands::Open(args) => args.execute(&ctx, &out).await,
            Commands::Send(args) => args.execute(&ctx, &out).await,
            Commands::Inbox(args) => args.execute(&ctx, &out).await,
            Commands::Sent(args) => args.execute(&ctx, &out).await,
            Commands::Config(args) => args.execute(&ctx, &out, self.config.as_deref()),
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a key pair and store the private key
    Keygen(KeygenArgs),
    /// Create an account on the QMail server and publish a new public key
    Register(RegisterArgs),
    /// Seal a message to a public key
    Seal(SealArgs),
    /// Open a sealed message with a stored private key
    Open(OpenArgs),
    /// Send a message through the QMail server
    Send(SendArgs),
    /// List and decrypt received messages
    Inbox(InboxArgs),
    /// List sent messages
    Sent(SentArgs),
    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Resolved configuration shared by all commands.
pub struct CommandContext {
    config: Config,
}

impl CommandContext {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The explicit identity, or the configured default.
    fn identity(&self, explicit: Option<&str>) -> anyhow::Result<Identity> {
        let raw = explicit
            .or(self.config.identity.default.as_deref())
            .ok_or_else(|| anyhow!("no identity given and no [identity] default configured"))?;
        Ok(Identity::parse(raw)?)
    }

    fn algorithm(&self, explicit: Option<&str>) -> anyhow::Result<AlgorithmId> {
        match explicit {
            Some(name) => Ok(name.parse()?),
            None => Ok(self.config.crypto.default_algorithm()?),
        }
    }

    fn cipher(&self) -> anyhow::Result<MessageCipher<StandardKem>> {
        let allowed = self.config.crypto.allowed_algorithms()?;
        Ok(MessageCipher::new(StandardKem::with_algorithms(&allowed)))
    }

    fn key_store(&self) -> anyhow::Result<Arc<dyn KeyStore>> {
        let keystore = &self.config.keystore;
        let path = keystore
            .resolved_path()
            .ok_or_else(|| anyhow!("could not determine a key store location"))?;
        debug!(backend = %keystore.backend, path = %path.display(), "opening key store");

        match keystore.backend.as_str() {
            "sqlite" => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
                Ok(Arc::new(SqliteKeyStore::new(&path)?))
            }
            _ => Ok(Arc::new(FileKeyStore::new(path))),
        }
    }

    fn http(&self) -> anyhow::Result<Arc<HttpMailboxClient>> {
        let server = &self.config.server;
        Ok(Arc::new(HttpMailboxClient::new(
            &server.base_url,
            Duration::from_secs(server.timeout_seconds),
        )?))
    }

    fn client(&self) -> anyhow::Result<MailClient> {
        let http = self.http()?;
        Ok(MailClient::new(self.key_store()?, http.clone(), http, self.cipher()?))
    }
}

/// Read message input from a file, or stdin when no file is given.
fn read_input(path: Option<&Path>) -> anyhow::Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path).with_context(|| format!("reading {}", path.display())),
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf).context("reading stdin")?;
            Ok(buf)
        }
    }
}

/// Arguments for the keygen command
#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Identity (mail address) to generate a key for
    #[arg(long)]
    pub identity: Option<String>,

    /// Key algorithm (defaults to crypto.default_algorithm)
    #[arg(long)]
    pub algorithm: Option<String>,

    /// Replace an existing key. Mail sealed to the old key becomes unreadable.
    #[arg(long)]
    pub force: bool,
}

impl KeygenArgs {
    pub async fn execute(self, ctx: &CommandContext, out: &OutputFormatter) -> anyhow::Result<ExitCode> {
        let identity = match ctx.identity(self.identity.as_deref()) {
            Ok(identity) => identity,
            Err(e) => return Ok(out.fail(&e.to_string(), ExitCode::InvalidInput)),
        };
        let algorithm = match ctx.algorithm(self.algorithm.as_deref()) {
            Ok(algorithm) => algorithm,
            Err(e) => return Ok(out.fail(&e.to_string(), ExitCode::InvalidInput)),
        };
        let mode = if self.force {
            RegisterMode::Replace
        } else {
            RegisterMode::CreateNew
        };

        out.progress(&format!("generating {algorithm} key pair for {identity}"));
        let keys = ctx.key_store()?;
        let cipher = ctx.cipher()?;
        let public = match register_key(keys.as_ref(), cipher.kem(), &identity, algorithm, mode).await {
            Ok(public) => public,
            Err(e) => return Ok(out.fail(&e.to_string(), ExitCode::for_client_error(&e))),
        };

        if self.force {
            out.warning("any key previously stored for this identity was replaced");
        }
        if !out.is_quiet() {
            println!(
                "{}",
                out.format_key(&KeyInfo {
                    identity: identity.to_string(),
                    algorithm: algorithm.name().to_string(),
                    fingerprint: public.fingerprint(),
                    public_key: public.to_text(),
                })
            );
        }
        Ok(ExitCode::Success)
    }
}

/// Arguments for the register command
#[derive(Parser)]
pub struct RegisterArgs {
    /// Account name; the address becomes <username>@<identity.domain>
    #[arg(long)]
    pub username: String,

    /// Account password
    #[arg(long, env = "QMAIL_PASSWORD", hide_env_values = true)]
    pub password: String,

    #[arg(long, default_value = "")]
    pub first_name: String,

    #[arg(long, default_value = "")]
    pub last_name: String,

    #[arg(long, default_value = "")]
    pub phone: String,

    /// Postal address
    #[arg(long, default_value = "")]
    pub address: String,

    #[arg(long, default_value = "")]
    pub recovery_email: String,

    /// Key algorithm (defaults to crypto.default_algorithm)
    #[arg(long)]
    pub algorithm: Option<String>,
}

impl std::fmt::Debug for RegisterArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterArgs")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl RegisterArgs {
    pub async fn execute(self, ctx: &CommandContext, out: &OutputFormatter) -> anyhow::Result<ExitCode> {
        let identity = match Identity::from_username(&self.username, &ctx.config().identity.domain) {
            Ok(identity) => identity,
            Err(e) => return Ok(out.fail(&e.to_string(), ExitCode::InvalidInput)),
        };
        let algorithm = match ctx.algorithm(self.algorithm.as_deref()) {
            Ok(algorithm) => algorithm,
            Err(e) => return Ok(out.fail(&e.to_string(), ExitCode::InvalidInput)),
        };
        let http = ctx.http()?;
        let keys = ctx.key_store()?;
        let cipher = ctx.cipher()?;

        out.progress(&format!("generating {algorithm} key pair for {identity}"));
        let public = match register_key(
            keys.as_ref(),
            cipher.kem(),
            &identity,
            algorithm,
            RegisterMode::CreateNew,
        )
        .await
        {
            Ok(public) => public,
            Err(e) => return Ok(out.fail(&e.to_string(), ExitCode::for_client_error(&e))),
        };

        let request = AccountRegistration {
            username: self.username.trim().to_string(),
            password: self.password,
            public_key: public.to_text(),
            first_name: self.first_name,
            last_name: self.last_name,
            phone_number: self.phone,
            address: self.address,
            recovery_email: self.recovery_email,
        };

        out.progress(&format!("registering {identity} with {}", http.base_url()));
        let assigned = match http.register_account(&request).await {
            Ok(assigned) => assigned,
            Err(e) => {
                // Without an account nobody can look up this key.
                match keys.delete(&identity).await {
                    Ok(_) => debug!(identity = %identity, "removed key of failed registration"),
                    Err(cleanup) => {
                        warn!(identity = %identity, error = %cleanup, "could not remove key of failed registration")
                    }
                }
                return Ok(out.fail(&e.to_string(), ExitCode::for_mailbox_error(&e)));
            }
        };

        if assigned != identity {
            out.warning(&format!(
                "server assigned {assigned}; the private key is stored under {identity}"
            ));
        }
        if !out.is_quiet() {
            println!(
                "{}",
                out.format_key(&KeyInfo {
                    identity: assigned.to_string(),
                    algorithm: algorithm.name().to_string(),
                    fingerprint: public.fingerprint(),
                    public_key: public.to_text(),
                })
            );
        }
        Ok(ExitCode::Success)
    }
}

/// Arguments for the seal command
#[derive(Parser, Debug)]
pub struct SealArgs {
    /// Recipient public key in text form (ALGORITHM:base64)
    #[arg(long)]
    pub public_key: String,

    /// Algorithm to seal under (defaults to the key's own)
    #[arg(long)]
    pub algorithm: Option<String>,

    /// Read the message from a file instead of stdin
    #[arg(long)]
    pub input: Option<PathBuf>,
}

impl SealArgs {
    pub fn execute(self, ctx: &CommandContext, out: &OutputFormatter) -> anyhow::Result<ExitCode> {
        let recipient = match PublicKey::from_text(&self.public_key) {
            Ok(key) => key,
            Err(e) => return Ok(out.fail(&e.to_string(), ExitCode::for_cipher_error(&e))),
        };
        let algorithm = match &self.algorithm {
            Some(name) => match name.parse::<AlgorithmId>() {
                Ok(algorithm) => algorithm,
                Err(e) => return Ok(out.fail(&e.to_string(), ExitCode::InvalidInput)),
            },
            None => recipient.algorithm(),
        };

        let plaintext = read_input(self.input.as_deref())?;
        let sealed = match ctx.cipher()?.seal_encoded(&recipient, algorithm, &plaintext) {
            Ok(sealed) => sealed,
            // Sealing to a mismatched key is a usage error, not a decrypt failure.
            Err(e) => return Ok(out.fail(&e.to_string(), ExitCode::InvalidInput)),
        };

        match out.format() {
            OutputFormat::Json => println!("{}", out.format_success(&SealOutput { envelope: sealed }, "seal")),
            OutputFormat::Table => println!("{sealed}"),
            OutputFormat::Quiet => {}
        }
        Ok(ExitCode::Success)
    }
}

#[derive(serde::Serialize)]
struct SealOutput {
    envelope: String,
}

/// Arguments for the open command
#[derive(Parser, Debug)]
pub struct OpenArgs {
    /// Identity whose stored key opens the message
    #[arg(long)]
    pub identity: Option<String>,

    /// Read the envelope from a file instead of stdin
    #[arg(long)]
    pub input: Option<PathBuf>,
}

impl OpenArgs {
    pub async fn execute(self, ctx: &CommandContext, out: &OutputFormatter) -> anyhow::Result<ExitCode> {
        let identity = match ctx.identity(self.identity.as_deref()) {
            Ok(identity) => identity,
            Err(e) => return Ok(out.fail(&e.to_string(), ExitCode::InvalidInput)),
        };

        let stored = match ctx.key_store()?.load(&identity).await {
            Ok(stored) => stored,
            Err(e) => {
                let e = ReadError::from(e);
                return Ok(out.fail(e.user_message(), ExitCode::for_read_error(&e)));
            }
        };

        let wire = read_input(self.input.as_deref())?;
        let wire = String::from_utf8_lossy(&wire);
        let plaintext = match ctx.cipher()?.open_encoded(&stored.key, wire.trim()) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                debug!(identity = %identity, error = %e, "open failed");
                let e = ReadError::from(e);
                return Ok(out.fail(e.user_message(), ExitCode::for_read_error(&e)));
            }
        };

        match out.format() {
            OutputFormat::Json => println!(
                "{}",
                out.format_success(
                    &OpenOutput {
                        message: String::from_utf8_lossy(&plaintext).into_owned(),
                    },
                    "open"
                )
            ),
            OutputFormat::Table => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&plaintext)?;
                stdout.flush()?;
            }
            OutputFormat::Quiet => {}
        }
        Ok(ExitCode::Success)
    }
}

#[derive(serde::Serialize)]
struct OpenOutput {
    message: String,
}

/// Arguments for the send command
#[derive(Parser, Debug)]
pub struct SendArgs {
    /// Sending identity
    #[arg(long)]
    pub from: Option<String>,

    /// Recipient identity
    #[arg(long)]
    pub to: String,

    /// Message text (reads stdin or --input when omitted)
    #[arg(long, short)]
    pub message: Option<String>,

    /// Read the message from a file
    #[arg(long, conflicts_with = "message")]
    pub input: Option<PathBuf>,
}

impl SendArgs {
    pub async fn execute(self, ctx: &CommandContext, out: &OutputFormatter) -> anyhow::Result<ExitCode> {
        let (sender, recipient) = match (ctx.identity(self.from.as_deref()), Identity::parse(&self.to)) {
            (Ok(sender), Ok(recipient)) => (sender, recipient),
            (Err(e), _) => return Ok(out.fail(&e.to_string(), ExitCode::InvalidInput)),
            (_, Err(e)) => return Ok(out.fail(&e.to_string(), ExitCode::InvalidInput)),
        };
        let body = match self.message {
            Some(text) => text.into_bytes(),
            None => read_input(self.input.as_deref())?,
        };

        out.progress(&format!("sending to {recipient}"));
        match ctx.client()?.compose(&sender, &recipient, &body).await {
            Ok(_) => {
                info!(sender = %sender, recipient = %recipient, "message sent");
                out.success(&format!("Encrypted message sent to {recipient}"));
                if out.format() == OutputFormat::Json {
                    println!(
                        "{}",
                        out.format_success(&SuccessMessage::new(format!("sent to {recipient}")), "send")
                    );
                }
                Ok(ExitCode::Success)
            }
            Err(e) => Ok(out.fail(&e.to_string(), ExitCode::for_client_error(&e))),
        }
    }
}

/// Arguments for the inbox command
#[derive(Parser, Debug)]
pub struct InboxArgs {
    /// Identity whose inbox to read
    #[arg(long)]
    pub identity: Option<String>,
}

impl InboxArgs {
    pub async fn execute(self, ctx: &CommandContext, out: &OutputFormatter) -> anyhow::Result<ExitCode> {
        show_folder(ctx, out, self.identity.as_deref(), Folder::Inbox).await
    }
}

/// Arguments for the sent command
#[derive(Parser, Debug)]
pub struct SentArgs {
    /// Identity whose sent mail to list
    #[arg(long)]
    pub identity: Option<String>,
}

impl SentArgs {
    pub async fn execute(self, ctx: &CommandContext, out: &OutputFormatter) -> anyhow::Result<ExitCode> {
        show_folder(ctx, out, self.identity.as_deref(), Folder::Sent).await
    }
}

/// List a folder, opening each item that this device holds the key for.
///
/// Sent items are sealed to their recipients, so they list with an error
/// line instead of a body.
async fn show_folder(
    ctx: &CommandContext,
    out: &OutputFormatter,
    explicit: Option<&str>,
    folder: Folder,
) -> anyhow::Result<ExitCode> {
    let identity = match ctx.identity(explicit) {
        Ok(identity) => identity,
        Err(e) => return Ok(out.fail(&e.to_string(), ExitCode::InvalidInput)),
    };

    let client = ctx.client()?;
    let listed = match folder {
        Folder::Inbox => client.inbox(&identity).await,
        Folder::Sent => client.sent(&identity).await,
    };
    let items = match listed {
        Ok(items) => items,
        Err(e) => return Ok(out.fail(&e.to_string(), ExitCode::for_client_error(&e))),
    };

    let mut entries = Vec::with_capacity(items.len());
    for item in &items {
        let (message, error, error_code) = match client.read(&identity, item).await {
            Ok(plaintext) => (Some(String::from_utf8_lossy(&plaintext).into_owned()), None, None),
            Err(e) => (
                None,
                Some(e.user_message().to_string()),
                Some(ExitCode::for_read_error(&e).name()),
            ),
        };
        let correspondent = match folder {
            Folder::Inbox => &item.sender_email,
            Folder::Sent => &item.recipient_email,
        };
        entries.push(MailEntry {
            correspondent: correspondent.to_string(),
            timestamp: item.timestamp,
            message,
            error,
            error_code,
        });
    }

    if !out.is_quiet() {
        println!("{}", out.format_mail(folder, &entries));
    }
    Ok(ExitCode::Success)
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Write a commented sample configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigArgs {
    pub fn execute(
        self,
        ctx: &CommandContext,
        out: &OutputFormatter,
        custom_path: Option<&Path>,
    ) -> anyhow::Result<ExitCode> {
        match self.command {
            ConfigCommand::Show => {
                match out.format() {
                    OutputFormat::Json => println!("{}", out.format_success(ctx.config(), "config show")),
                    OutputFormat::Table => print!("{}", toml::to_string_pretty(ctx.config())?),
                    OutputFormat::Quiet => {}
                }
                Ok(ExitCode::Success)
            }
            ConfigCommand::Init { force } => {
                let path = custom_path
                    .map(Path::to_path_buf)
                    .or_else(Config::default_path)
                    .ok_or_else(|| anyhow!("could not determine a config location"))?;
                if path.exists() && !force {
                    return Ok(out.fail(
                        &format!("{} already exists (use --force to overwrite)", path.display()),
                        ExitCode::AlreadyExists,
                    ));
                }
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, Config::sample_toml())
                    .with_context(|| format!("writing {}", path.display()))?;
                out.success(&format!("Wrote {}", path.display()));
                Ok(ExitCode::Success)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn quiet() -> OutputFormatter {
        OutputFormatter::new(OutputFormat::Quiet, false)
    }

    fn context_in(temp_dir: &TempDir, base_url: &str) -> CommandContext {
        let mut config = Config::default();
        config.keystore.path = Some(temp_dir.path().join("keys"));
        config.server.base_url = base_url.to_string();
        CommandContext::new(config)
    }

    fn register_args(username: &str) -> RegisterArgs {
        RegisterArgs {
            username: username.to_string(),
            password: "s3cret".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            phone: String::new(),
            address: String::new(),
            recovery_email: String::new(),
            algorithm: Some("X25519-HKDF-SHA256".to_string()),
        }
    }

    /// Answer one HTTP request with `status` and a JSON `body`. The handle
    /// yields the raw request.
    async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&request) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).into_owned()
        });
        (base_url, handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        body.len() >= length
    }

    fn request_json(request: &str) -> serde_json::Value {
        serde_json::from_str(request.split_once("\r\n\r\n").unwrap().1).unwrap()
    }

    #[test]
    fn test_parse_keygen() {
        let cli = Cli::try_parse_from([
            "qmail",
            "keygen",
            "--identity",
            "alice@qmail.co.in",
            "--algorithm",
            "X25519-HKDF-SHA256",
            "--force",
        ])
        .unwrap();
        match cli.command {
            Commands::Keygen(args) => {
                assert_eq!(args.identity.as_deref(), Some("alice@qmail.co.in"));
                assert_eq!(args.algorithm.as_deref(), Some("X25519-HKDF-SHA256"));
                assert!(args.force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from(["qmail", "inbox", "--output", "json", "--debug"]).unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(cli.debug);
        assert!(matches!(cli.command, Commands::Inbox(_)));
    }

    #[test]
    fn test_parse_sent() {
        let cli = Cli::try_parse_from(["qmail", "sent", "--identity", "alice@qmail.co.in"]).unwrap();
        match cli.command {
            Commands::Sent(args) => assert_eq!(args.identity.as_deref(), Some("alice@qmail.co.in")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_register_hides_password() {
        let cli = Cli::try_parse_from([
            "qmail",
            "register",
            "--username",
            "alice",
            "--password",
            "s3cret",
            "--first-name",
            "Alice",
        ])
        .unwrap();
        match cli.command {
            Commands::Register(args) => {
                assert_eq!(args.username, "alice");
                assert_eq!(args.password, "s3cret");
                assert_eq!(args.first_name, "Alice");
                assert_eq!(args.last_name, "");
                assert!(!format!("{args:?}").contains("s3cret"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_send_message_conflicts_with_input() {
        let result = Cli::try_parse_from([
            "qmail", "send", "--to", "bob@x", "--message", "hi", "--input", "body.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_context_identity_falls_back_to_default() {
        let mut config = Config::default();
        let ctx = CommandContext::new(config.clone());
        assert!(ctx.identity(None).is_err());

        config.identity.default = Some("Alice@QMail.co.in".to_string());
        let ctx = CommandContext::new(config);
        assert_eq!(ctx.identity(None).unwrap().as_str(), "alice@qmail.co.in");
        assert_eq!(
            ctx.identity(Some("bob@qmail.co.in")).unwrap().as_str(),
            "bob@qmail.co.in"
        );
    }

    #[test]
    fn test_context_cipher_honours_allowed_algorithms() {
        let mut config = Config::default();
        config.crypto.allowed_algorithms = vec!["X25519-HKDF-SHA256".to_string()];
        config.crypto.default_algorithm = "X25519-HKDF-SHA256".to_string();
        let ctx = CommandContext::new(config);

        let cipher = ctx.cipher().unwrap();
        assert_eq!(cipher.kem().enabled(), &[AlgorithmId::X25519HkdfSha256]);
    }

    #[tokio::test]
    async fn test_keygen_then_open_round_trip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.keystore.path = Some(temp_dir.path().join("keys"));
        let ctx = CommandContext::new(config);
        let out = OutputFormatter::new(OutputFormat::Quiet, false);

        let keygen = KeygenArgs {
            identity: Some("alice@qmail.co.in".to_string()),
            algorithm: Some("X25519-HKDF-SHA256".to_string()),
            force: false,
        };
        assert_eq!(keygen.execute(&ctx, &out).await.unwrap(), ExitCode::Success);

        let again = KeygenArgs {
            identity: Some("alice@qmail.co.in".to_string()),
            algorithm: None,
            force: false,
        };
        assert_eq!(again.execute(&ctx, &out).await.unwrap(), ExitCode::AlreadyExists);

        let open = OpenArgs {
            identity: Some("nobody@qmail.co.in".to_string()),
            input: None,
        };
        assert_eq!(open.execute(&ctx, &out).await.unwrap(), ExitCode::KeyNotFound);
    }

    #[tokio::test]
    async fn test_keygen_needs_no_server() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context_in(&temp_dir, "not a url");
        assert!(ctx.client().is_err());

        let keygen = KeygenArgs {
            identity: Some("alice@qmail.co.in".to_string()),
            algorithm: Some("ML-KEM-768".to_string()),
            force: false,
        };
        assert_eq!(keygen.execute(&ctx, &quiet()).await.unwrap(), ExitCode::Success);

        let alice = Identity::parse("alice@qmail.co.in").unwrap();
        assert!(ctx.key_store().unwrap().contains(&alice).await.unwrap());
    }

    #[tokio::test]
    async fn test_register_publishes_key_under_configured_domain() {
        let temp_dir = TempDir::new().unwrap();
        let (base_url, server) = serve_once(
            "201 Created",
            r#"{"message":"User registered successfully","email":"alice@mail.example"}"#.to_string(),
        )
        .await;
        let mut ctx = context_in(&temp_dir, &base_url);
        ctx.config.identity.domain = "mail.example".to_string();

        let code = register_args(" Alice ").execute(&ctx, &quiet()).await.unwrap();
        assert_eq!(code, ExitCode::Success);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /register "));
        let body = request_json(&request);
        assert_eq!(body["username"], "Alice");
        assert_eq!(body["password"], "s3cret");
        assert_eq!(body["firstName"], "Alice");
        assert_eq!(body["lastName"], "Liddell");

        // The published key opens with the private key stored locally.
        let published = PublicKey::from_text(body["public_key"].as_str().unwrap()).unwrap();
        let alice = Identity::parse("alice@mail.example").unwrap();
        let stored = ctx.key_store().unwrap().load(&alice).await.unwrap();
        let cipher = ctx.cipher().unwrap();
        let sealed = cipher.seal(&published, published.algorithm(), b"welcome").unwrap();
        assert_eq!(cipher.open(&stored.key, &sealed).unwrap(), b"welcome");
    }

    #[tokio::test]
    async fn test_rejected_registration_leaves_no_key() {
        let temp_dir = TempDir::new().unwrap();
        let (base_url, server) = serve_once(
            "400 Bad Request",
            r#"{"detail":"Email already registered"}"#.to_string(),
        )
        .await;
        let ctx = context_in(&temp_dir, &base_url);

        let code = register_args("alice").execute(&ctx, &quiet()).await.unwrap();
        assert_eq!(code, ExitCode::InvalidInput);
        server.await.unwrap();

        let alice = Identity::parse("alice@qmail.co.in").unwrap();
        assert!(!ctx.key_store().unwrap().contains(&alice).await.unwrap());
    }

    #[tokio::test]
    async fn test_register_refuses_identity_with_local_key() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context_in(&temp_dir, "http://127.0.0.1:8000");
        let keygen = KeygenArgs {
            identity: Some("alice@qmail.co.in".to_string()),
            algorithm: None,
            force: false,
        };
        assert_eq!(keygen.execute(&ctx, &quiet()).await.unwrap(), ExitCode::Success);

        // Refused before any request is made.
        let code = register_args("alice").execute(&ctx, &quiet()).await.unwrap();
        assert_eq!(code, ExitCode::AlreadyExists);
    }

    #[tokio::test]
    async fn test_sent_lists_items_it_cannot_open() {
        let temp_dir = TempDir::new().unwrap();
        let (base_url, server) = serve_once(
            "200 OK",
            r#"[{"sender_email":"alice@qmail.co.in","recipient_email":"bob@qmail.co.in","encrypted_body":"QMEV","timestamp":"2024-01-01T00:00:00"}]"#
                .to_string(),
        )
        .await;
        let ctx = context_in(&temp_dir, &base_url);

        let sent = SentArgs {
            identity: Some("alice@qmail.co.in".to_string()),
        };
        assert_eq!(sent.execute(&ctx, &quiet()).await.unwrap(), ExitCode::Success);
        assert!(server.await.unwrap().starts_with("GET /sent/alice@qmail.co.in "));
    }
}
