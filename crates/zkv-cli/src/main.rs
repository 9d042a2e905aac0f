//! zkv: zkvault client-side encryption CLI
//!
//! Commands:
//!   key generate | derive        - create an account key file
//!   file encrypt | decrypt       - chunked file encryption to/from a JSON artefact
//!   file inspect                 - print the clear metadata of an encrypted file
//!   hybrid keygen | seal | open  - classical + ML-KEM-768 envelopes
//!   item encrypt | decrypt       - field-level password item encryption
//!   config show                  - display current configuration
//!
//! Keys are stored as base64 text files. Every encrypted artefact is JSON with
//! base64 byte fields, the same shape a document store would hold.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use zkv_core::config::LogFormat;
use zkv_core::encoding::{self, b64};
use zkv_core::types::{EncryptedFile, EncryptedPasswordItem, FileProgress, HybridEncryptionResult, PasswordItem};
use zkv_core::ZkvConfig;
use zkv_crypto::kdf::SALT_SIZE;
use zkv_crypto::{
    decrypt_password_item, derive_account_key, encrypt_password_item, generate_salt, AccountKey,
    ClassicalKey, DecryptFileOptions, EncryptFileOptions, FileEncryptor, HybridComposer,
    HybridPrivateKey, HybridRecipient,
};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "zkv",
    version,
    about = "zkvault client-side encryption",
    long_about = "zkv: encrypt files and vault items locally so no server ever sees plaintext"
)]
struct Cli {
    /// Path to zkv.toml configuration file
    #[arg(long, short = 'c', env = "ZKV_CONFIG", default_value = "zkv.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Account key management
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Chunked file encryption
    File {
        #[command(subcommand)]
        action: FileAction,
    },

    /// Hybrid classical + post-quantum envelopes
    Hybrid {
        #[command(subcommand)]
        action: HybridAction,
    },

    /// Password item encryption
    Item {
        #[command(subcommand)]
        action: ItemAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum KeyAction {
    /// Write a random 256-bit account key
    Generate {
        /// Output key file
        #[arg(long, short = 'o')]
        out: PathBuf,
    },

    /// Derive an account key from a passphrase with Argon2id
    ///
    /// The passphrase is read from ZKV_PASSPHRASE or prompted for.
    Derive {
        /// Output key file
        #[arg(long, short = 'o')]
        out: PathBuf,
        /// Base64 salt from an earlier derivation (default: fresh random salt)
        #[arg(long)]
        salt: Option<String>,
        #[arg(long, env = "ZKV_PASSPHRASE", hide_env_values = true)]
        passphrase: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum FileAction {
    /// Encrypt a local file into a JSON artefact
    Encrypt {
        input: PathBuf,
        /// Account key file
        #[arg(long, short = 'k', env = "ZKV_KEY_FILE")]
        key: PathBuf,
        /// Item id the file key is derived for
        #[arg(long)]
        item_id: String,
        /// Output path (default: <input>.zkv.json)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Chunk size in bytes (default: sized from the file length)
        #[arg(long)]
        chunk_size: Option<usize>,
        #[arg(long, default_value = "application/octet-stream")]
        mime_type: String,
        /// Associated data bound into every chunk
        #[arg(long)]
        context: Option<String>,
    },

    /// Decrypt a JSON artefact back to the original bytes
    Decrypt {
        input: PathBuf,
        #[arg(long, short = 'k', env = "ZKV_KEY_FILE")]
        key: PathBuf,
        #[arg(long)]
        item_id: String,
        #[arg(long, short = 'o')]
        out: PathBuf,
        #[arg(long)]
        context: Option<String>,
        /// Skip per-chunk and whole-file digest checks
        #[arg(long)]
        no_verify: bool,
    },

    /// Print the clear metadata of an encrypted file (no key needed)
    Inspect { input: PathBuf },
}

#[derive(Subcommand, Debug)]
enum HybridAction {
    /// Generate a hybrid key pair
    Keygen {
        /// Directory receiving recipient.json and private.json
        #[arg(long, short = 'o', default_value = ".")]
        out_dir: PathBuf,
    },

    /// Seal a file to a recipient
    Seal {
        input: PathBuf,
        /// Recipient key file (recipient.json)
        #[arg(long, short = 'r')]
        recipient: PathBuf,
        #[arg(long, short = 'o')]
        out: PathBuf,
        #[arg(long)]
        context: Option<String>,
    },

    /// Open an envelope with the private key
    Open {
        input: PathBuf,
        /// Private key file (private.json)
        #[arg(long, short = 'k')]
        key: PathBuf,
        #[arg(long, short = 'o')]
        out: PathBuf,
        #[arg(long)]
        context: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ItemAction {
    /// Encrypt a password item JSON document
    Encrypt {
        input: PathBuf,
        #[arg(long, short = 'k', env = "ZKV_KEY_FILE")]
        key: PathBuf,
        #[arg(long, short = 'o')]
        out: PathBuf,
        #[arg(long)]
        context: Option<String>,
    },

    /// Decrypt an encrypted item; prints to stdout unless --out is given
    Decrypt {
        input: PathBuf,
        #[arg(long, short = 'k', env = "ZKV_KEY_FILE")]
        key: PathBuf,
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        #[arg(long)]
        context: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ZkvConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;
    init_logging(&config.log.level, &config.log.format);

    match cli.command {
        Commands::Key { action: KeyAction::Generate { out } } => cmd_key_generate(&out).await,
        Commands::Key { action: KeyAction::Derive { out, salt, passphrase } } => {
            cmd_key_derive(&config, &out, salt.as_deref(), passphrase).await
        }
        Commands::File {
            action: FileAction::Encrypt { input, key, item_id, out, chunk_size, mime_type, context },
        } => {
            let out = out.unwrap_or_else(|| with_suffix(&input, ".zkv.json"));
            cmd_file_encrypt(&config, &input, &key, item_id, &out, chunk_size, mime_type, context).await
        }
        Commands::File {
            action: FileAction::Decrypt { input, key, item_id, out, context, no_verify },
        } => cmd_file_decrypt(&config, &input, &key, item_id, &out, context, !no_verify).await,
        Commands::File { action: FileAction::Inspect { input } } => cmd_file_inspect(&input).await,
        Commands::Hybrid { action: HybridAction::Keygen { out_dir } } => {
            cmd_hybrid_keygen(&config, &out_dir).await
        }
        Commands::Hybrid { action: HybridAction::Seal { input, recipient, out, context } } => {
            cmd_hybrid_seal(&config, &input, &recipient, &out, context.as_deref()).await
        }
        Commands::Hybrid { action: HybridAction::Open { input, key, out, context } } => {
            cmd_hybrid_open(&config, &input, &key, &out, context.as_deref()).await
        }
        Commands::Item { action: ItemAction::Encrypt { input, key, out, context } } => {
            cmd_item_encrypt(&input, &key, &out, context.as_deref()).await
        }
        Commands::Item { action: ItemAction::Decrypt { input, key, out, context } } => {
            cmd_item_decrypt(&input, &key, out.as_deref(), context.as_deref()).await
        }
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
    }
}

// ── Logging ───────────────────────────────────────────────────────────────────

/// Logs go to stderr so decrypted output on stdout stays clean.
fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Key files ─────────────────────────────────────────────────────────────────

/// Hybrid recipient key file: safe to share.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecipientKeyFile {
    kem_algorithm: String,
    #[serde(with = "b64")]
    kem_public_key: Vec<u8>,
    #[serde(with = "b64")]
    classical_key: Vec<u8>,
}

/// Hybrid private key file: keep secret.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrivateKeyFile {
    kem_algorithm: String,
    #[serde(with = "b64")]
    kem_secret_key: Vec<u8>,
    #[serde(with = "b64")]
    classical_key: Vec<u8>,
}

async fn write_secret(path: &Path, contents: &[u8]) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .with_context(|| format!("restricting permissions on {}", path.display()))?;
    }
    Ok(())
}

async fn write_account_key(path: &Path, key: &AccountKey) -> Result<()> {
    let mut line = encoding::encode(key.as_bytes());
    line.push('\n');
    write_secret(path, line.as_bytes()).await
}

async fn read_account_key(path: &Path) -> Result<AccountKey> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading key file: {}", path.display()))?;
    let bytes = encoding::decode(content.trim())
        .with_context(|| format!("decoding key file: {}", path.display()))?;
    AccountKey::from_slice(&bytes).with_context(|| format!("key file: {}", path.display()))
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&content).with_context(|| format!("parsing {}", path.display()))
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let rendered = serde_json::to_vec_pretty(value).context("serializing JSON")?;
    tokio::fs::write(path, rendered)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn context_bytes(context: Option<&str>) -> &[u8] {
    context.map(str::as_bytes).unwrap_or_default()
}

// ── Progress display ─────────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
        )
        .context("progress template")?
        .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

// ── `zkv key` ─────────────────────────────────────────────────────────────────

async fn cmd_key_generate(out: &Path) -> Result<()> {
    let key = AccountKey::generate();
    write_account_key(out, &key).await?;
    info!(path = %out.display(), "account key generated");
    println!("account key written to {}", out.display());
    Ok(())
}

async fn cmd_key_derive(
    config: &ZkvConfig,
    out: &Path,
    salt: Option<&str>,
    passphrase: Option<String>,
) -> Result<()> {
    let salt: [u8; SALT_SIZE] = match salt {
        Some(s) => {
            let bytes = encoding::decode(s).context("decoding --salt")?;
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| anyhow::anyhow!("salt must be {SALT_SIZE} bytes, got {}", bytes.len()))?
        }
        None => generate_salt(),
    };

    let passphrase = match passphrase {
        Some(p) => SecretString::from(p),
        None => SecretString::from(
            rpassword::prompt_password("Passphrase: ").context("reading passphrase")?,
        ),
    };

    let params = config.kdf.clone();
    let key = tokio::task::spawn_blocking(move || derive_account_key(&passphrase, &salt, &params))
        .await
        .context("key derivation task failed")??;

    write_account_key(out, &key).await?;
    info!(path = %out.display(), mem_cost_kib = config.kdf.mem_cost_kib, "account key derived");
    println!("account key written to {}", out.display());
    println!("salt: {}", encoding::encode(&salt));
    Ok(())
}

// ── `zkv file` ────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
async fn cmd_file_encrypt(
    config: &ZkvConfig,
    input: &Path,
    key_path: &Path,
    item_id: String,
    out: &Path,
    chunk_size: Option<usize>,
    mime_type: String,
    context: Option<String>,
) -> Result<()> {
    let data = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let key = read_account_key(key_path).await?;
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let encryptor = FileEncryptor::new(config.clone())?;

    let pb = make_progress_bar(data.len() as u64, "encrypt")?;
    let bar = pb.clone();
    let file = tokio::task::spawn_blocking(move || {
        let progress = |p: FileProgress| {
            bar.set_position(p.processed);
            bar.set_message(format!("chunk {}/{}", p.current_chunk, p.total_chunks));
        };
        encryptor.encrypt_file(
            &data,
            &filename,
            &mime_type,
            &key,
            &item_id,
            EncryptFileOptions {
                chunk_size,
                progress: Some(&progress),
                context: context.as_deref().map(str::as_bytes),
            },
        )
    })
    .await
    .context("encryption task failed")??;
    pb.finish_with_message("done");

    write_json(out, &file).await?;
    info!(
        path = %out.display(),
        bytes = file.metadata.original_size,
        chunks = file.metadata.chunk_count,
        "file artefact written"
    );
    println!(
        "encrypted {} ({}) in {} chunks -> {}",
        file.metadata.filename,
        fmt_bytes(file.metadata.original_size),
        file.metadata.chunk_count,
        out.display()
    );
    Ok(())
}

async fn cmd_file_decrypt(
    config: &ZkvConfig,
    input: &Path,
    key_path: &Path,
    item_id: String,
    out: &Path,
    context: Option<String>,
    verify_integrity: bool,
) -> Result<()> {
    let file: EncryptedFile = read_json(input).await?;
    let key = read_account_key(key_path).await?;
    let encryptor = FileEncryptor::new(config.clone())?;

    let pb = make_progress_bar(file.metadata.original_size, "decrypt")?;
    let bar = pb.clone();
    let data = tokio::task::spawn_blocking(move || {
        let progress = |p: FileProgress| {
            bar.set_position(p.processed);
            bar.set_message(format!("chunk {}/{}", p.current_chunk, p.total_chunks));
        };
        encryptor.decrypt_file(
            &file,
            &key,
            &item_id,
            DecryptFileOptions {
                progress: Some(&progress),
                context: context.as_deref().map(str::as_bytes),
                verify_integrity,
            },
        )
    })
    .await
    .context("decryption task failed")??;
    pb.finish_with_message("done");

    tokio::fs::write(out, &data)
        .await
        .with_context(|| format!("writing {}", out.display()))?;
    info!(path = %out.display(), bytes = data.len(), verified = verify_integrity, "file restored");
    println!("decrypted {} -> {}", fmt_bytes(data.len() as u64), out.display());
    Ok(())
}

async fn cmd_file_inspect(input: &Path) -> Result<()> {
    let file: EncryptedFile = read_json(input).await?;
    let meta = &file.metadata;
    println!("filename:      {}", meta.filename);
    println!("mime type:     {}", meta.mime_type);
    println!("size:          {} ({} bytes)", fmt_bytes(meta.original_size), meta.original_size);
    println!("chunks:        {} x {}", meta.chunk_count, fmt_bytes(meta.chunk_size));
    println!("hash:          {} {}", meta.hash_algorithm.as_str(), meta.file_hash);
    println!("encrypted at:  {} ms", meta.encrypted_at);
    println!("version:       {}", meta.version);

    let stored: u64 = file.chunks.iter().map(|c| c.metadata.encrypted_size).sum();
    println!("stored chunks: {} ({})", file.chunks.len(), fmt_bytes(stored));
    Ok(())
}

// ── `zkv hybrid` ──────────────────────────────────────────────────────────────

async fn cmd_hybrid_keygen(config: &ZkvConfig, out_dir: &Path) -> Result<()> {
    let composer = HybridComposer::new(config)?;
    let pair = composer.generate_key_pair()?;
    let kem = pair.kem_key_pair();

    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let recipient = RecipientKeyFile {
        kem_algorithm: config.kem.algorithm.clone(),
        kem_public_key: kem.public_key.clone(),
        classical_key: pair.classical_key().as_bytes().to_vec(),
    };
    let private = PrivateKeyFile {
        kem_algorithm: config.kem.algorithm.clone(),
        kem_secret_key: kem.secret_key.to_vec(),
        classical_key: pair.classical_key().as_bytes().to_vec(),
    };

    let recipient_path = out_dir.join("recipient.json");
    let private_path = out_dir.join("private.json");
    write_json(&recipient_path, &recipient).await?;
    let rendered = serde_json::to_vec_pretty(&private).context("serializing private key")?;
    write_secret(&private_path, &rendered).await?;
    info!(dir = %out_dir.display(), algorithm = %composer.algorithm(), "hybrid key pair generated");

    println!("{} key pair:", composer.algorithm());
    println!("  recipient: {}", recipient_path.display());
    println!("  private:   {}", private_path.display());
    Ok(())
}

async fn cmd_hybrid_seal(
    config: &ZkvConfig,
    input: &Path,
    recipient_path: &Path,
    out: &Path,
    context: Option<&str>,
) -> Result<()> {
    let composer = HybridComposer::new(config)?;
    let file: RecipientKeyFile = read_json(recipient_path).await?;
    if file.kem_algorithm != config.kem.algorithm {
        warn!(recipient = %recipient_path.display(), kem = %file.kem_algorithm, "recipient KEM mismatch");
        anyhow::bail!(
            "recipient key is {}, configured KEM is {}",
            file.kem_algorithm,
            config.kem.algorithm
        );
    }
    let recipient = HybridRecipient::new(file.kem_public_key, ClassicalKey::from_slice(&file.classical_key)?);

    let plaintext = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;
    let envelope = composer.encrypt(&plaintext, &recipient, context_bytes(context))?;

    write_json(out, &envelope).await?;
    info!(path = %out.display(), bytes = plaintext.len(), algorithm = %envelope.algorithm, "envelope sealed");
    println!("sealed {} -> {}", fmt_bytes(plaintext.len() as u64), out.display());
    Ok(())
}

async fn cmd_hybrid_open(
    config: &ZkvConfig,
    input: &Path,
    key_path: &Path,
    out: &Path,
    context: Option<&str>,
) -> Result<()> {
    let composer = HybridComposer::new(config)?;
    let file: PrivateKeyFile = read_json(key_path).await?;
    let private = HybridPrivateKey::new(file.kem_secret_key, ClassicalKey::from_slice(&file.classical_key)?);

    let envelope: HybridEncryptionResult = read_json(input).await?;
    let plaintext = composer.decrypt(&envelope, &private, context_bytes(context))?;

    tokio::fs::write(out, &plaintext)
        .await
        .with_context(|| format!("writing {}", out.display()))?;
    info!(path = %out.display(), bytes = plaintext.len(), "envelope opened");
    println!("opened {} -> {}", fmt_bytes(plaintext.len() as u64), out.display());
    Ok(())
}

// ── `zkv item` ────────────────────────────────────────────────────────────────

async fn cmd_item_encrypt(input: &Path, key_path: &Path, out: &Path, context: Option<&str>) -> Result<()> {
    let item: PasswordItem = read_json(input).await?;
    let key = read_account_key(key_path).await?;
    let encrypted = encrypt_password_item(&item, &key, context_bytes(context))?;
    write_json(out, &encrypted).await?;
    info!(item_id = %encrypted.metadata.id, path = %out.display(), "item encrypted");
    println!("encrypted item {} -> {}", encrypted.metadata.id, out.display());
    Ok(())
}

async fn cmd_item_decrypt(
    input: &Path,
    key_path: &Path,
    out: Option<&Path>,
    context: Option<&str>,
) -> Result<()> {
    let encrypted: EncryptedPasswordItem = read_json(input).await?;
    let key = read_account_key(key_path).await?;
    let item = decrypt_password_item(&encrypted, &key, context_bytes(context))?;
    info!(item_id = %item.id, "item decrypted");
    match out {
        Some(path) => {
            let rendered = serde_json::to_vec_pretty(&item).context("serializing item")?;
            write_secret(path, &rendered).await?;
            println!("decrypted item {} -> {}", item.id, path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&item).context("serializing item")?),
    }
    Ok(())
}

// ── `zkv config show` ─────────────────────────────────────────────────────────

fn cmd_config_show(config: &ZkvConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = config.to_toml_string().context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
