//! eshare CLI
//!
//! Local eshare deployment. Shares and registered keys live in a SQLite
//! database and encrypted blobs as files, all under one data directory;
//! wallets are dev keys passed on the command line.
//!
//! ```text
//! eshare wallet new
//! eshare register --wallet-key <hex>
//! eshare send --wallet-key <hex> --to <address> [--to-name <name>] FILES...
//! eshare info <share-id>
//! eshare claim <share-id> --wallet-key <hex> --out <dir>
//! eshare purge
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, eyre, WrapErr};
use color_eyre::Result;
use uuid::Uuid;

use eshare_core::crypto::{derivation_message, derive_keypair};
use eshare_core::protocol::claim_message;
use eshare_core::storage::SqliteStore;
use eshare_core::{
    ClaimRequest, CreateShare, EncryptionMode, ShareConfig, ShareService, SharedFile,
    WalletSigner,
};

type StoreService = ShareService<SqliteStore, SqliteStore, SqliteStore>;

/// Written and removed in the output directory before a share is claimed
const WRITE_CHECK_FILE: &str = ".eshare-write-check";

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "eshare", version, about = "Encrypted file sharing to wallet addresses")]
struct Args {
    /// Directory holding shares, keys and blobs
    #[arg(long, global = true, env = "ESHARE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Base URL for share links
    #[arg(long, global = true, default_value = eshare_core::config::DEFAULT_APP_URL, env = "ESHARE_APP_URL")]
    app_url: String,

    /// Share lifetime in days
    #[arg(long, global = true, default_value_t = 7, env = "SHARE_TTL_DAYS")]
    share_ttl_days: i64,

    /// Largest encrypted blob accepted, in bytes
    #[arg(long, global = true, default_value_t = eshare_core::config::DEFAULT_MAX_BLOB_BYTES, env = "MAX_BLOB_BYTES")]
    max_blob_bytes: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dev wallet helpers
    Wallet {
        #[command(subcommand)]
        command: WalletCommand,
    },

    /// Register the derived encryption key for a wallet
    Register {
        /// Wallet private key (hex)
        #[arg(long, env = "ESHARE_WALLET_KEY")]
        wallet_key: String,
    },

    /// Send files to a wallet address
    Send {
        /// Sender wallet private key (hex)
        #[arg(long, env = "ESHARE_WALLET_KEY")]
        wallet_key: String,

        /// Recipient wallet address
        #[arg(long)]
        to: String,

        /// Recipient display name
        #[arg(long)]
        to_name: Option<String>,

        /// Sender display name
        #[arg(long)]
        from_name: Option<String>,

        /// Files to send
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the public view of a share
    Info {
        /// Share ID
        share_id: Uuid,
    },

    /// Claim a share and write its files
    Claim {
        /// Share ID
        share_id: Uuid,

        /// Recipient wallet private key (hex)
        #[arg(long, env = "ESHARE_WALLET_KEY")]
        wallet_key: String,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Delete expired shares and their blobs
    Purge,
}

#[derive(Subcommand, Debug)]
enum WalletCommand {
    /// Print a fresh wallet key and its address
    New,
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eshare=info,eshare_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Command::Wallet {
        command: WalletCommand::New,
    } = &args.command
    {
        let wallet = WalletSigner::generate();
        println!("address: {}", wallet.address());
        println!("key:     {}", wallet.secret_hex());
        return Ok(());
    }

    let service = open_service(&args).await?;

    match args.command {
        Command::Wallet { .. } => Ok(()),
        Command::Register { wallet_key } => register(&service, &wallet_key).await,
        Command::Send {
            wallet_key,
            to,
            to_name,
            from_name,
            files,
        } => send(&service, &wallet_key, to, to_name, from_name, &files).await,
        Command::Info { share_id } => {
            let info = service.share_info(&share_id).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
        Command::Claim {
            share_id,
            wallet_key,
            out,
        } => claim(&service, share_id, &wallet_key, &out).await,
        Command::Purge => {
            let purged = service.purge_expired().await?;
            println!("Purged {} expired share(s)", purged);
            Ok(())
        }
    }
}

async fn open_service(args: &Args) -> Result<StoreService> {
    let share_ttl_secs = args
        .share_ttl_days
        .checked_mul(24 * 3600)
        .ok_or_else(|| eyre!("--share-ttl-days {} is out of range", args.share_ttl_days))?;

    let data_dir = match &args.data_dir {
        Some(dir) => dir.clone(),
        None => dirs::data_dir()
            .ok_or_else(|| eyre!("No data directory available; pass --data-dir"))?
            .join("eshare"),
    };

    let store = Arc::new(
        SqliteStore::open(&data_dir)
            .await
            .wrap_err_with(|| format!("Failed to open store at {}", data_dir.display()))?,
    );
    tracing::debug!(data_dir = %data_dir.display(), "Opened store");

    let config = ShareConfig {
        share_ttl_secs,
        max_blob_bytes: args.max_blob_bytes,
        app_url: args.app_url.clone(),
    };

    Ok(ShareService::new(store.clone(), store.clone(), store, config))
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn register(service: &StoreService, wallet_key: &str) -> Result<()> {
    let wallet = WalletSigner::from_hex(wallet_key)?;
    let signature = wallet.sign_message(&derivation_message(&wallet.address()))?;
    let keys = derive_keypair(&signature)?;

    let registered = service
        .register_public_key(&wallet.address().to_string(), &keys.public_key().to_hex())
        .await?;

    println!("Registered {}", registered.address);
    println!("Public key: {}", registered.public_key.to_hex());
    Ok(())
}

async fn send(
    service: &StoreService,
    wallet_key: &str,
    to: String,
    to_name: Option<String>,
    from_name: Option<String>,
    paths: &[PathBuf],
) -> Result<()> {
    let wallet = WalletSigner::from_hex(wallet_key)?;

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let data = tokio::fs::read(path)
            .await
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| eyre!("Not a file: {}", path.display()))?;
        files.push(SharedFile::new(name, mime_type(path), data));
    }

    let receipt = service
        .create_share(CreateShare {
            sender: wallet.address().to_string(),
            recipient: to,
            sender_name: from_name,
            recipient_name: to_name,
            files,
        })
        .await?;

    println!("Share:   {}", receipt.share_id);
    println!("Link:    {}", receipt.share_link);
    println!("Mode:    {}", receipt.mode);
    println!("Expires: {}", receipt.expires_at.to_rfc3339());
    Ok(())
}

async fn claim(service: &StoreService, share_id: Uuid, wallet_key: &str, out: &Path) -> Result<()> {
    let wallet = WalletSigner::from_hex(wallet_key)?;
    let address = wallet.address();

    // Everything that can fail locally runs before the one-time claim.
    let info = service.share_info(&share_id).await?;
    if let Some(entry) = info
        .file_manifest
        .files
        .iter()
        .find(|f| Path::new(&f.name).file_name().is_none())
    {
        bail!("Refusing to write file with name {:?}", entry.name);
    }
    prepare_out_dir(out).await?;

    let derived = match info.encryption_mode {
        EncryptionMode::E2e => {
            let signature = wallet.sign_message(&derivation_message(&address))?;
            Some(derive_keypair(&signature)?)
        }
        EncryptionMode::Legacy => None,
    };

    let signature = wallet.sign_message(&claim_message(&share_id, &address))?;
    let claimed = service
        .claim(&ClaimRequest::new(share_id, address, signature))
        .await?;

    let files = service.fetch_and_open(&claimed, derived.as_ref()).await?;

    for file in &files {
        let Some(name) = Path::new(&file.name).file_name() else {
            bail!("Refusing to write file with name {:?}", file.name);
        };
        let path = out.join(name);
        tokio::fs::write(&path, &file.data)
            .await
            .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
        println!("{} ({} bytes)", path.display(), file.data.len());
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Create `out` and check that files can be written into it
async fn prepare_out_dir(out: &Path) -> Result<()> {
    tokio::fs::create_dir_all(out)
        .await
        .wrap_err_with(|| format!("Failed to create {}", out.display()))?;

    let check = out.join(WRITE_CHECK_FILE);
    tokio::fs::write(&check, b"")
        .await
        .wrap_err_with(|| format!("{} is not writable", out.display()))?;
    if let Err(e) = tokio::fs::remove_file(&check).await {
        tracing::warn!(path = %check.display(), error = %e, "Failed to remove write check file");
    }
    Ok(())
}

/// Infer a MIME type from the file extension
fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("html") | Some("htm") => "text/html",
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_type(Path::new("notes.txt")), "text/plain");
        assert_eq!(mime_type(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn test_parse_send() {
        let args = Args::try_parse_from([
            "eshare",
            "send",
            "--wallet-key",
            "01",
            "--to",
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf",
            "a.txt",
            "b.png",
        ])
        .unwrap();
        match args.command {
            Command::Send { files, to_name, .. } => {
                assert_eq!(files.len(), 2);
                assert!(to_name.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ttl_days_overflow_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let args = Args::try_parse_from([
            "eshare".to_string(),
            "--data-dir".to_string(),
            dir.path().display().to_string(),
            "--share-ttl-days".to_string(),
            i64::MAX.to_string(),
            "purge".to_string(),
        ])
        .unwrap();
        assert!(open_service(&args).await.is_err());
    }

    #[tokio::test]
    async fn test_unwritable_out_dir_leaves_share_claimable() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path().join("data")).await.unwrap());
        let service = ShareService::new(store.clone(), store.clone(), store, ShareConfig::default());

        let alice = WalletSigner::generate();
        let bob = WalletSigner::generate();
        let receipt = service
            .create_share(CreateShare {
                sender: alice.address().to_string(),
                recipient: bob.address().to_string(),
                sender_name: None,
                recipient_name: None,
                files: vec![SharedFile::new("note.txt", "text/plain", b"hello".to_vec())],
            })
            .await
            .unwrap();

        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let bad_out = blocker.join("out");
        assert!(claim(&service, receipt.share_id, &bob.secret_hex(), &bad_out)
            .await
            .is_err());
        assert!(!service.share_info(&receipt.share_id).await.unwrap().claimed);

        let out = dir.path().join("out");
        claim(&service, receipt.share_id, &bob.secret_hex(), &out)
            .await
            .unwrap();
        assert_eq!(std::fs::read(out.join("note.txt")).unwrap(), b"hello");
        assert!(!out.join(WRITE_CHECK_FILE).exists());
    }
}
