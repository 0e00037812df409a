//! megacrypt: local front-end to the MEGA-style client crypto engine
//!
//! Commands:
//!   encrypt <input> <output>        - encrypt a file under a fresh key, print its node key
//!   decrypt <input> <output>        - decrypt and verify a file against its node key
//!                                     (packed, split, or unwrapped from a node record)
//!   plan <length>                   - show the chunk layout for a stream length
//!   rsa --private-key <b64>         - recover the components of a wrapped RSA key
//!   config show                     - display the effective configuration

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use megacrypt_chunks::ChunkPlan;
use megacrypt_core::config::MegaConfig;
use megacrypt_core::types::NodeRecord;
use megacrypt_crypto::{
    b64, recover_components, DecryptStream, EncryptStream, FileKey, Iv, MasterKey, MetaMac,
    NodeKey, IV_SIZE, KEY_SIZE, META_MAC_SIZE,
};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "megacrypt",
    version,
    about = "MEGA-style client-side file encryption",
    long_about = "megacrypt: encrypt and verify files with chunked CTR + chained MAC, inspect chunk plans, recover RSA keys"
)]
struct Cli {
    /// Path to megacrypt.toml configuration file
    #[arg(long, short = 'c', env = "MEGACRYPT_CONFIG", default_value = "megacrypt.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a local file under a freshly generated file key and IV
    Encrypt {
        /// Plaintext input file
        input: PathBuf,
        /// Ciphertext output file
        output: PathBuf,
    },

    /// Decrypt a local file and verify its meta-MAC
    ///
    /// The key is either the packed node key (--node-key), its three parts
    /// (--key, --iv, --meta-mac), or the wrapped key of a node record
    /// (--node-record) unwrapped with the master key. On a MAC mismatch the
    /// output is removed.
    Decrypt {
        /// Ciphertext input file
        input: PathBuf,
        /// Plaintext output file
        output: PathBuf,
        /// Packed 32-byte node key, URL-safe base64
        #[arg(long, conflicts_with_all = ["key", "iv", "meta_mac"])]
        node_key: Option<String>,
        /// 16-byte file key, URL-safe base64
        #[arg(long, requires_all = ["iv", "meta_mac"])]
        key: Option<String>,
        /// 8-byte IV, URL-safe base64
        #[arg(long)]
        iv: Option<String>,
        /// 8-byte meta-MAC, URL-safe base64
        #[arg(long)]
        meta_mac: Option<String>,
        /// JSON node record whose `k` holds the wrapped node key
        #[arg(long, conflicts_with_all = ["node_key", "key", "iv", "meta_mac"])]
        node_record: Option<PathBuf>,
        /// Account master key for --node-record, URL-safe base64 (overrides keys.master_key)
        #[arg(long, env = "MEGACRYPT_MASTER_KEY")]
        master_key: Option<String>,
    },

    /// Print the chunk boundaries for a stream of the given length
    Plan {
        /// Stream length in bytes
        length: u64,
        /// Emit the chunk spans as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recover a wrapped RSA private key and print its component sizes
    Rsa {
        /// Wrapped private key, URL-safe base64
        #[arg(long)]
        private_key: String,
        /// Account master key, URL-safe base64 (overrides keys.master_key)
        #[arg(long, env = "MEGACRYPT_MASTER_KEY")]
        master_key: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
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
    let config = MegaConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;
    init_logging(&config.log.level, &config.log.format);

    match cli.command {
        Commands::Encrypt { input, output } => cmd_encrypt(&config, &input, &output).await,
        Commands::Decrypt {
            input,
            output,
            node_key,
            key,
            iv,
            meta_mac,
            node_record,
            master_key,
        } => {
            let (node_key, expected_len) = match node_record {
                Some(path) => {
                    let master = resolve_master_key(&config, master_key.as_deref())?;
                    let record = load_node_record(&path)?;
                    (node_key_from_record(&record, &master)?, Some(record.size))
                }
                None => (
                    resolve_node_key(
                        node_key.as_deref(),
                        key.as_deref(),
                        iv.as_deref(),
                        meta_mac.as_deref(),
                    )?,
                    None,
                ),
            };
            cmd_decrypt(&config, &input, &output, node_key, expected_len).await
        }
        Commands::Plan { length, json } => cmd_plan(length, json),
        Commands::Rsa {
            private_key,
            master_key,
        } => cmd_rsa(&config, &private_key, master_key.as_deref()),
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
    }
}

fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so key output on stdout stays clean
    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn resolve_master_key(config: &MegaConfig, flag: Option<&str>) -> Result<MasterKey> {
    let encoded = flag
        .or(config.keys.master_key.as_deref())
        .context("no master key: pass --master-key or set keys.master_key in the config")?;
    MasterKey::from_base64(encoded).context("parsing master key")
}

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{prefix:.bold} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

// ── `megacrypt encrypt` ───────────────────────────────────────────────────────

async fn cmd_encrypt(config: &MegaConfig, input: &Path, output: &Path) -> Result<()> {
    let source = tokio::fs::File::open(input)
        .await
        .with_context(|| format!("opening input: {}", input.display()))?;
    let length = source
        .metadata()
        .await
        .with_context(|| format!("reading metadata: {}", input.display()))?
        .len();
    let mut sink = tokio::fs::File::create(output)
        .await
        .with_context(|| format!("creating output: {}", output.display()))?;

    let pb = make_progress_bar(length, "encrypt");
    let mut stream = EncryptStream::new(source, length);
    let mut buf = vec![0u8; config.stream.read_buffer_size];
    loop {
        let n = stream
            .read_async(&mut buf)
            .await
            .with_context(|| format!("encrypting {}", input.display()))?;
        if n == 0 {
            break;
        }
        sink.write_all(&buf[..n])
            .await
            .with_context(|| format!("writing output: {}", output.display()))?;
        pb.inc(n as u64);
    }
    sink.flush().await.context("flushing output")?;
    pb.finish_and_clear();

    let summary = stream
        .finish()
        .with_context(|| format!("{} changed size while encrypting", input.display()))?;
    tracing::info!(bytes = length, output = %output.display(), "encrypted");

    println!("encrypted:  {} -> {}", input.display(), output.display());
    println!("  bytes:    {length}");
    println!("  chunks:   {}", ChunkPlan::new(length).chunk_count());
    println!("  key:      {}", b64::encode(summary.file_key.as_bytes()));
    println!("  iv:       {}", b64::encode(summary.iv.as_bytes()));
    println!("  meta-mac: {}", b64::encode(summary.meta_mac.as_bytes()));
    println!("  node key: {}", summary.node_key().to_base64());
    Ok(())
}

// ── `megacrypt decrypt` ───────────────────────────────────────────────────────

fn resolve_node_key(
    node_key: Option<&str>,
    key: Option<&str>,
    iv: Option<&str>,
    meta_mac: Option<&str>,
) -> Result<NodeKey> {
    if let Some(encoded) = node_key {
        return NodeKey::from_base64(encoded).context("parsing --node-key");
    }

    match (key, iv, meta_mac) {
        (Some(key), Some(iv), Some(meta_mac)) => Ok(NodeKey {
            file_key: FileKey::from_bytes(
                b64::decode_array::<KEY_SIZE>(key).context("parsing --key")?,
            ),
            iv: Iv::from_bytes(b64::decode_array::<IV_SIZE>(iv).context("parsing --iv")?),
            meta_mac: MetaMac::from_bytes(
                b64::decode_array::<META_MAC_SIZE>(meta_mac).context("parsing --meta-mac")?,
            ),
        }),
        _ => bail!("decrypt needs either --node-key or all of --key, --iv and --meta-mac"),
    }
}

fn load_node_record(path: &Path) -> Result<NodeRecord> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading node record: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parsing node record: {}", path.display()))
}

/// Unwrap the node key carried in a file record's `k` field.
fn node_key_from_record(record: &NodeRecord, master: &MasterKey) -> Result<NodeKey> {
    if !record.is_file() {
        bail!("node {} is a {:?}, not a file", record.id, record.node_type);
    }
    let encoded = record
        .serialized_key()
        .with_context(|| format!("node {} carries no key", record.id))?;
    let wrapped =
        b64::decode(encoded).with_context(|| format!("parsing key of node {}", record.id))?;
    NodeKey::unwrap(&wrapped, master)
        .with_context(|| format!("unwrapping key of node {}", record.id))
}

async fn cmd_decrypt(
    config: &MegaConfig,
    input: &Path,
    output: &Path,
    node_key: NodeKey,
    expected_len: Option<u64>,
) -> Result<()> {
    let source = tokio::fs::File::open(input)
        .await
        .with_context(|| format!("opening input: {}", input.display()))?;
    let length = source
        .metadata()
        .await
        .with_context(|| format!("reading metadata: {}", input.display()))?
        .len();
    if let Some(expected) = expected_len.filter(|&expected| expected != length) {
        bail!(
            "{} is {length} bytes but the node record says {expected}",
            input.display()
        );
    }

    let sink = tokio::fs::File::create(output)
        .await
        .with_context(|| format!("creating output: {}", output.display()))?;

    let result = decrypt_to(config, source, length, sink, output, node_key).await;
    if result.is_err() {
        // Unverified plaintext must not be left behind
        if let Err(e) = tokio::fs::remove_file(output).await {
            tracing::warn!("could not remove {}: {e}", output.display());
        }
    }
    result?;

    tracing::info!(bytes = length, output = %output.display(), "decrypted and verified");
    println!("decrypted:  {} -> {}", input.display(), output.display());
    println!("  bytes:    {length}");
    println!("  meta-mac: verified");
    Ok(())
}

async fn decrypt_to(
    config: &MegaConfig,
    source: tokio::fs::File,
    length: u64,
    mut sink: tokio::fs::File,
    output: &Path,
    node_key: NodeKey,
) -> Result<()> {
    let pb = make_progress_bar(length, "decrypt");
    let mut stream = DecryptStream::from_node_key(source, length, node_key)
        .with_buffer_size(config.stream.decrypt_buffer_size);
    let mut buf = vec![0u8; config.stream.read_buffer_size];
    loop {
        let n = stream.read_async(&mut buf).await.context("decrypting")?;
        if n == 0 {
            break;
        }
        sink.write_all(&buf[..n])
            .await
            .with_context(|| format!("writing output: {}", output.display()))?;
        pb.inc(n as u64);
    }
    sink.flush().await.context("flushing output")?;
    pb.finish_and_clear();

    stream
        .finish()
        .context("integrity check failed: ciphertext or key does not match")?;
    Ok(())
}

// ── `megacrypt plan` ──────────────────────────────────────────────────────────

fn cmd_plan(length: u64, json: bool) -> Result<()> {
    let plan = ChunkPlan::new(length);
    let spans = plan.spans();

    if json {
        let rendered = serde_json::to_string_pretty(&spans).context("serializing chunk spans")?;
        println!("{rendered}");
        return Ok(());
    }

    println!("length:     {length}");
    println!("chunks:     {}", plan.chunk_count());
    println!("boundaries: {}", plan.boundaries().len());
    println!();
    println!("{:>6}  {:>14}  {:>10}", "chunk", "offset", "length");
    for (index, span) in spans.iter().enumerate() {
        println!("{index:>6}  {:>14}  {:>10}", span.offset, span.length);
    }
    Ok(())
}

// ── `megacrypt rsa` ───────────────────────────────────────────────────────────

fn cmd_rsa(config: &MegaConfig, private_key: &str, master_key: Option<&str>) -> Result<()> {
    let master = resolve_master_key(config, master_key)?;

    let wrapped = b64::decode(private_key).context("parsing --private-key")?;
    let components =
        recover_components(&wrapped, &master).context("recovering RSA private key")?;

    println!("RSA private key recovered");
    println!("  modulus: {} bits", components.modulus().bits());
    println!("  p:       {} bits", components.p.bits());
    println!("  q:       {} bits", components.q.bits());
    println!("  d:       {} bits", components.d.bits());
    println!("  u:       {} bits", components.u.bits());
    Ok(())
}

// ── `megacrypt config show` ───────────────────────────────────────────────────

fn cmd_config_show(config: &MegaConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!(
            "# Configuration: defaults (no file at {})",
            config_path.display()
        );
    }
    println!();

    let mut shown = config.clone();
    if shown.keys.master_key.is_some() {
        shown.keys.master_key = Some("[REDACTED]".into());
    }
    let rendered = toml::to_string_pretty(&shown).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
