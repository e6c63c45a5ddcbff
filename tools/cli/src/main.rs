//! DiaryVault CLI - Command line interface for the journal encryption engine.
//!
//! This tool manages the device master key, encrypts and decrypts journal
//! records, and exports or imports encrypted backups.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroizing;

use diaryvault_common::{Error, RecordId};
use diaryvault_crypto::integrity;
use diaryvault_storage::{LocalRecordStore, LocalSecureStore};
use diaryvault_vault::config::CONFIG_FILENAME;
use diaryvault_vault::{
    ArchiveFormat, BackupArchive, BackupDataset, DiaryCrypto, PrivateRecord, RecordContent,
    SubsystemConfig,
};

const KEYS_DIR: &str = "keys";
const RECORDS_DIR: &str = "records";
const NO_KEY_HINT: &str = "Failed to load master key (run `diaryvault init` to create one)";

#[derive(Parser)]
#[command(name = "diaryvault")]
#[command(about = "DiaryVault - Journal encryption and secure backup")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Application data directory.
    #[arg(short, long, default_value = ".diaryvault", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Privacy {
    Private,
    Public,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, configuration, and master key.
    Init {
        /// PBKDF2 iterations for backup passwords.
        #[arg(long)]
        iterations: Option<u32>,

        /// Write self-describing (tagged) archives.
        #[arg(long)]
        tagged: bool,
    },

    /// Show configuration and key state.
    Status,

    /// Encrypt text under the master key and print the envelope.
    Seal {
        /// Text to encrypt.
        text: String,
    },

    /// Decrypt an envelope produced by `seal`.
    Open {
        /// Base64 envelope.
        envelope: String,
    },

    /// Store a journal record.
    Write {
        /// Record identifier.
        #[arg(short, long)]
        id: String,

        /// Record content.
        #[arg(short, long)]
        text: String,

        /// Encrypt the record at rest.
        #[arg(short, long)]
        private: bool,
    },

    /// Read one record, or all records when no id is given.
    Read {
        /// Record identifier.
        #[arg(short, long)]
        id: Option<String>,
    },

    /// Change whether a record is encrypted at rest.
    Privacy {
        /// Record identifier.
        #[arg(short, long)]
        id: String,

        /// New privacy setting.
        #[arg(value_enum)]
        setting: Privacy,
    },

    /// Export a dataset JSON file as an encrypted archive.
    Export {
        /// Dataset JSON file.
        #[arg(long)]
        dataset: PathBuf,

        /// Archive output file.
        #[arg(short, long)]
        out: PathBuf,

        /// Protect the archive with a password instead of the device key.
        #[arg(short, long)]
        password: bool,
    },

    /// Decrypt an archive and show or write its dataset.
    Import {
        /// Archive file.
        #[arg(short, long)]
        archive: PathBuf,

        /// The archive is password protected.
        #[arg(short, long)]
        password: bool,

        /// Write the dataset JSON here.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the SHA-256 digest of text or a file.
    Hash {
        /// Text to hash.
        text: Option<String>,

        /// File to hash instead of text.
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Destroy the master key. Private records become unreadable.
    Wipe {
        /// Confirm destruction.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let data_dir = cli.data_dir.as_path();
    match cli.command {
        Commands::Init { iterations, tagged } => cmd_init(data_dir, iterations, tagged).await,

        Commands::Status => cmd_status(data_dir).await,

        Commands::Seal { text } => cmd_seal(data_dir, &text).await,

        Commands::Open { envelope } => cmd_open(data_dir, &envelope).await,

        Commands::Write { id, text, private } => cmd_write(data_dir, &id, &text, private).await,

        Commands::Read { id } => cmd_read(data_dir, id.as_deref()).await,

        Commands::Privacy { id, setting } => cmd_privacy(data_dir, &id, setting).await,

        Commands::Export {
            dataset,
            out,
            password,
        } => cmd_export(data_dir, &dataset, &out, password).await,

        Commands::Import {
            archive,
            password,
            out,
        } => cmd_import(data_dir, &archive, password, out.as_deref()).await,

        Commands::Hash { text, file } => cmd_hash(text.as_deref(), file.as_deref()).await,

        Commands::Wipe { yes } => cmd_wipe(data_dir, yes).await,
    }
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Zeroizing::new(password))
}

/// Load the configuration, falling back to defaults before `init`.
async fn load_config(data_dir: &Path) -> Result<SubsystemConfig> {
    let path = data_dir.join(CONFIG_FILENAME);
    if !path.exists() {
        return Ok(SubsystemConfig::default());
    }
    let json = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = SubsystemConfig::from_json(&json).context("Invalid configuration file")?;
    Ok(config)
}

/// Wire the subsystem over the data directory without touching the key.
async fn build_service(data_dir: &Path) -> Result<DiaryCrypto> {
    let config = load_config(data_dir).await?;
    let secure_store = LocalSecureStore::new(data_dir.join(KEYS_DIR))
        .context("Failed to open key store")?;
    let record_store = LocalRecordStore::new(data_dir.join(RECORDS_DIR))
        .context("Failed to open record store")?;

    DiaryCrypto::new(config, Arc::new(secure_store), Arc::new(record_store))
        .context("Invalid configuration")
}

/// Open the subsystem and load the existing master key. Only `init` ever
/// creates one.
async fn open_service(data_dir: &Path) -> Result<DiaryCrypto> {
    let service = build_service(data_dir).await?;
    service.load().context(NO_KEY_HINT)?;
    Ok(service)
}

/// Initialize the data directory.
async fn cmd_init(data_dir: &Path, iterations: Option<u32>, tagged: bool) -> Result<()> {
    info!("Initializing data directory: {}", data_dir.display());

    tokio::fs::create_dir_all(data_dir)
        .await
        .context("Failed to create data directory")?;

    let config_path = data_dir.join(CONFIG_FILENAME);
    if config_path.exists() {
        println!("Configuration already exists, keeping it.");
    } else {
        let mut config = SubsystemConfig::default();
        if let Some(iterations) = iterations {
            config.kdf_iterations = iterations;
        }
        if tagged {
            config.archive_format = ArchiveFormat::Tagged;
        }
        config.validate().context("Invalid configuration")?;
        tokio::fs::write(&config_path, config.to_json()?)
            .await
            .context("Failed to write configuration")?;
    }

    let service = build_service(data_dir).await?;
    service.initialize().context("Failed to initialize master key")?;

    println!("DiaryVault initialized!");
    println!("  Location: {}", data_dir.display());
    println!("  Key state: {:?}", service.keys().state());

    Ok(())
}

/// Show configuration and key state.
async fn cmd_status(data_dir: &Path) -> Result<()> {
    let config = load_config(data_dir).await?;
    let service = build_service(data_dir).await?;
    let key_state = match service.load() {
        Ok(()) => format!("{:?}", service.keys().state()),
        Err(Error::NotInitialized(_)) => "missing (run `diaryvault init`)".to_string(),
        Err(e) => return Err(e).context("Failed to load master key"),
    };
    let records = LocalRecordStore::new(data_dir.join(RECORDS_DIR))?.ids()?;

    println!("DiaryVault Status:");
    println!("  Location: {}", data_dir.display());
    println!("  Key state: {}", key_state);
    println!("  Records: {}", records.len());
    println!("  Archive format: {:?}", config.archive_format);
    println!("  KDF Parameters:");
    println!("    Iterations: {}", config.kdf_iterations);
    println!("    Key length: {} bits", config.key_length_bits);

    Ok(())
}

/// Encrypt text for storage.
async fn cmd_seal(data_dir: &Path, text: &str) -> Result<()> {
    let service = open_service(data_dir).await?;
    let envelope = service
        .encrypt_for_storage(text)
        .context("Failed to encrypt")?;
    println!("{}", envelope);
    Ok(())
}

/// Decrypt a stored envelope.
async fn cmd_open(data_dir: &Path, envelope: &str) -> Result<()> {
    let service = open_service(data_dir).await?;
    let plaintext = service
        .decrypt_from_storage(envelope.trim())
        .context("Failed to decrypt")?;
    println!("{}", plaintext);
    Ok(())
}

/// Store a record.
async fn cmd_write(data_dir: &Path, id: &str, text: &str, private: bool) -> Result<()> {
    let service = open_service(data_dir).await?;
    let id = RecordId::new(id).context("Invalid record id")?;

    service
        .policy()
        .save(&id, &PrivateRecord::new(text, private))
        .context("Failed to save record")?;

    println!(
        "Record saved: {} ({})",
        id,
        if private { "private" } else { "public" }
    );
    Ok(())
}

/// Read records.
async fn cmd_read(data_dir: &Path, id: Option<&str>) -> Result<()> {
    let service = open_service(data_dir).await?;

    let ids = match id {
        Some(id) => vec![RecordId::new(id).context("Invalid record id")?],
        None => LocalRecordStore::new(data_dir.join(RECORDS_DIR))?.ids()?,
    };

    if ids.is_empty() {
        println!("No records.");
        return Ok(());
    }

    let records = service
        .policy()
        .load_all(&ids)
        .context("Failed to read records")?;
    for (id, content) in records {
        match content {
            RecordContent::Available(text) => println!("[{}] {}", id, text),
            RecordContent::Unavailable(reason) => println!("[{}] <unavailable: {}>", id, reason),
        }
    }

    Ok(())
}

/// Change record privacy.
async fn cmd_privacy(data_dir: &Path, id: &str, setting: Privacy) -> Result<()> {
    let service = open_service(data_dir).await?;
    let id = RecordId::new(id).context("Invalid record id")?;
    let private = matches!(setting, Privacy::Private);

    service
        .policy()
        .set_privacy(&id, private)
        .context("Failed to change privacy")?;

    println!(
        "Record {} is now {}",
        id,
        if private { "private" } else { "public" }
    );
    Ok(())
}

/// Export a dataset as an archive.
async fn cmd_export(data_dir: &Path, dataset: &Path, out: &Path, use_password: bool) -> Result<()> {
    info!("Exporting {} to {}", dataset.display(), out.display());

    let json = tokio::fs::read(dataset)
        .await
        .context("Failed to read dataset file")?;
    let dataset: BackupDataset =
        serde_json::from_slice(&json).context("Dataset file is not valid JSON")?;

    let password = if use_password {
        let password = prompt_password("Enter backup password: ")?;
        let confirm = prompt_password("Confirm backup password: ")?;
        if password != confirm {
            anyhow::bail!("Passwords do not match");
        }
        Some(password)
    } else {
        None
    };

    let service = Arc::new(open_service(data_dir).await?);
    let format = service.codec().config().archive_format;
    let summary = dataset.summary();

    // Key derivation is CPU-bound
    let archive = tokio::task::spawn_blocking(move || {
        service.export_backup(&dataset, password.as_ref().map(|p| p.as_str()))
    })
    .await
    .context("Export task failed")?
    .context("Failed to export backup")?;

    tokio::fs::write(out, archive.encode(format))
        .await
        .context("Failed to write archive")?;

    println!("Backup exported successfully!");
    println!("  Archive: {}", out.display());
    println!("  Contents: {}", summary);
    println!(
        "  Protection: {}",
        if archive.is_password_protected() {
            "password"
        } else {
            "device key"
        }
    );

    Ok(())
}

/// Import an archive.
async fn cmd_import(
    data_dir: &Path,
    archive: &Path,
    use_password: bool,
    out: Option<&Path>,
) -> Result<()> {
    info!("Importing {}", archive.display());

    let text = tokio::fs::read_to_string(archive)
        .await
        .context("Failed to read archive file")?;

    let service = Arc::new(open_service(data_dir).await?);
    let format = service.codec().config().archive_format;
    let archive =
        BackupArchive::decode(&text, format, use_password).context("Failed to parse archive")?;

    let password = if archive.is_password_protected() {
        Some(prompt_password("Enter backup password: ")?)
    } else {
        None
    };

    let dataset = tokio::task::spawn_blocking(move || {
        service.import_backup(&archive, password.as_ref().map(|p| p.as_str()))
    })
    .await
    .context("Import task failed")?
    .context("Failed to import backup")?;

    println!("Backup imported successfully!");
    println!("  Dataset: {}", dataset.id);
    println!("  User: {}", dataset.user_id);
    println!("  Contents: {}", dataset.summary());

    if let Some(out) = out {
        let json = serde_json::to_vec_pretty(&dataset)?;
        tokio::fs::write(out, json)
            .await
            .context("Failed to write dataset file")?;
        println!("  Written to: {}", out.display());
    }

    Ok(())
}

/// Hash text or a file.
async fn cmd_hash(text: Option<&str>, file: Option<&Path>) -> Result<()> {
    let data = match (text, file) {
        (_, Some(file)) => tokio::fs::read(file)
            .await
            .context("Failed to read input file")?,
        (Some(text), None) => text.as_bytes().to_vec(),
        (None, None) => anyhow::bail!("Provide text or --file"),
    };
    println!("{}", integrity::hash_hex(&data));
    Ok(())
}

/// Destroy the master key.
async fn cmd_wipe(data_dir: &Path, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("Refusing to destroy the master key without --yes");
    }

    let service = open_service(data_dir).await?;
    service
        .keys()
        .clear_key()
        .context("Failed to clear master key")?;

    println!("Master key destroyed. Private records can no longer be read.");
    Ok(())
}
