//! KeeVault CLI - Command line interface for the local secrets vault.
//!
//! Every mutating command loads the whole vault, edits it in memory and
//! writes the full record list back as a new signed envelope.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

use keevault_crypto::CryptoEngine;
use keevault_vault::{Record, RecordCollection, Settings, VaultCrypto, VaultCryptoInitializer};

#[derive(Parser)]
#[command(name = "keevault")]
#[command(about = "KeeVault - Local encrypted secrets vault")]
#[command(version)]
struct Cli {
    /// Home directory (default: $KEEVAULT_HOME or ~/.keestore).
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the registration and an empty vault.
    Init,

    /// Show registration and vault information.
    Info,

    /// List records.
    List,

    /// Print a record as JSON.
    Show {
        /// Record id.
        #[arg(short, long)]
        id: String,
    },

    /// Add a new record.
    Add {
        /// Record name.
        #[arg(short, long)]
        name: String,

        /// Entry as KEY=VALUE; may be repeated.
        #[arg(short, long = "entry", value_parser = parse_entry)]
        entries: Vec<(String, String)>,
    },

    /// Set one entry of a record.
    Set {
        /// Record id.
        #[arg(short, long)]
        id: String,

        #[arg(short, long)]
        key: String,

        #[arg(short = 'V', long)]
        value: String,
    },

    /// Remove one entry from a record.
    Unset {
        /// Record id.
        #[arg(short, long)]
        id: String,

        #[arg(short, long)]
        key: String,
    },

    /// Rename a record.
    Rename {
        /// Record id.
        #[arg(short, long)]
        id: String,

        /// New name.
        #[arg(short, long)]
        name: String,
    },

    /// Delete a record.
    Delete {
        /// Record id.
        #[arg(short, long)]
        id: String,
    },
}

fn main() -> Result<()> {
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
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = Settings::load(cli.home).context("Failed to load settings")?;

    match cli.command {
        Commands::Init => cmd_init(settings),
        Commands::Info => cmd_info(settings),
        Commands::List => cmd_list(settings),
        Commands::Show { id } => cmd_show(settings, &id),
        Commands::Add { name, entries } => cmd_add(settings, &name, entries),
        Commands::Set { id, key, value } => edit_record(settings, &id, |record| {
            record.put(key, value)?;
            Ok(())
        }),
        Commands::Unset { id, key } => edit_record(settings, &id, |record| {
            if record.remove(&key)?.is_none() {
                bail!("Record has no entry '{}'", key);
            }
            Ok(())
        }),
        Commands::Rename { id, name } => edit_record(settings, &id, |record| {
            record.set_name(name)?;
            Ok(())
        }),
        Commands::Delete { id } => cmd_delete(settings, &id),
    }
}

/// Parse a `KEY=VALUE` argument.
fn parse_entry(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

fn initializer(settings: Settings) -> VaultCryptoInitializer {
    let engine = CryptoEngine::with_entropy(settings.cipher);
    VaultCryptoInitializer::new(settings, engine)
}

/// Open the registration and load every record.
fn open_vault(settings: Settings) -> Result<(VaultCrypto, RecordCollection)> {
    let init = initializer(settings);
    if !init.is_registered() {
        bail!("No registration found. Run `keevault init` first.");
    }

    let mut vault = init
        .initialize(|vault| debug!(state = ?vault.state(), "Vault crypto initialized"))
        .context("Failed to open registration")?;
    let records = vault.load_vault().context("Failed to load vault")?;

    Ok((vault, RecordCollection::from_records(records)))
}

fn save(vault: &VaultCrypto, collection: &RecordCollection) -> Result<()> {
    vault
        .encrypt(&collection.snapshot())
        .context("Failed to write vault")
}

fn cmd_init(settings: Settings) -> Result<()> {
    let init = initializer(settings);
    if init.is_registered() {
        bail!("Already registered");
    }

    let vault = init
        .initialize(|vault| info!(path = %vault.registration_path().display(), "Registration created"))
        .context("Failed to create registration")?;
    vault.encrypt(&[]).context("Failed to write empty vault")?;

    println!("Registration created successfully!");
    if let Some(registration) = vault.registration() {
        println!("  ID: {}", registration.id);
    }
    println!("  Registration: {}", vault.registration_path().display());
    println!("  Vault: {}", vault.vault_path()?.display());

    Ok(())
}

fn cmd_info(settings: Settings) -> Result<()> {
    let home = settings.home().to_path_buf();
    let (vault, collection) = open_vault(settings)?;

    println!("Vault Information:");
    println!("  Home: {}", home.display());
    if let Some(registration) = vault.registration() {
        println!("  ID: {}", registration.id);
        println!("  Cipher: {}", registration.algorithm.transform());
    }
    println!("  Signature: {}", vault.signature_algorithm());
    println!("  Registration: {}", vault.registration_path().display());
    println!("  Vault: {}", vault.vault_path()?.display());
    println!("  Records: {}", collection.len());

    Ok(())
}

fn cmd_list(settings: Settings) -> Result<()> {
    let (_, collection) = open_vault(settings)?;
    let records = collection.snapshot();

    if records.is_empty() {
        println!("Vault is empty.");
        return Ok(());
    }

    for record in records {
        println!("{}  {} ({} entries)", record.id(), record.name(), record.fields().count());
    }
    Ok(())
}

fn cmd_show(settings: Settings, id: &str) -> Result<()> {
    let (_, collection) = open_vault(settings)?;
    let record = collection
        .get(id)
        .with_context(|| format!("Record not found: {}", id))?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn cmd_add(settings: Settings, name: &str, entries: Vec<(String, String)>) -> Result<()> {
    let (vault, collection) = open_vault(settings)?;

    let mut record = Record::new(name).context("Invalid record")?;
    for (key, value) in entries {
        record.put(key, value).context("Invalid entry")?;
    }
    let id = record.id().to_string();
    collection.add(record)?;
    save(&vault, &collection)?;

    println!("Record added: {}", id);
    Ok(())
}

/// Load a record, apply `edit` and write the vault back.
fn edit_record<F>(settings: Settings, id: &str, edit: F) -> Result<()>
where
    F: FnOnce(&mut Record) -> Result<()>,
{
    let (vault, collection) = open_vault(settings)?;
    let mut record = collection
        .get(id)
        .with_context(|| format!("Record not found: {}", id))?;

    edit(&mut record)?;
    collection.upsert(record);
    save(&vault, &collection)?;

    println!("Record updated: {}", id);
    Ok(())
}

fn cmd_delete(settings: Settings, id: &str) -> Result<()> {
    let (vault, collection) = open_vault(settings)?;
    if collection.remove(id).is_none() {
        bail!("Record not found: {}", id);
    }
    save(&vault, &collection)?;

    println!("Record deleted: {}", id);
    Ok(())
}
