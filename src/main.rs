//! genvault - Typed results and tiered storage for generated content
//!
//! Command-line access to the requestor catalog, the serialization format
//! recommendation, and the on-disk storage areas.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use genvault::{
    providers::builtin_registry, GenVaultConfig, ProviderCategory, SerializationFormat,
    StorageAreaReference, TypedDataFileReference,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "genvault")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Typed results and tiered storage for generated content")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "GENVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in requestors
    Requestors {
        /// Only this content category (e.g. text, embedding)
        #[arg(long)]
        category: Option<ProviderCategory>,

        /// Only this provider
        #[arg(long)]
        provider: Option<String>,
    },

    /// Show a requestor's descriptor and default configuration
    Describe {
        /// Requestor id, e.g. openai.text.gpt-4o
        requestor_id: String,
    },

    /// Recommend a serialization format
    Recommend {
        /// Payload is primarily text
        #[arg(long)]
        textual: bool,

        /// Payload must stay human-inspectable
        #[arg(long)]
        inspect: bool,

        /// Estimated payload size in bytes
        #[arg(long)]
        size: Option<u64>,
    },

    /// List files in a request's storage area
    Inspect {
        /// Request id
        request_id: Uuid,

        /// Bundle root (defaults to the configured one)
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Verify a stored file against its serialized reference
    Verify {
        /// Path to a JSON-serialized file reference
        reference: PathBuf,

        /// Bundle root (defaults to the configured one)
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("genvault={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = match cli.config.or_else(GenVaultConfig::default_path) {
        Some(path) if path.exists() => GenVaultConfig::load(&path)?,
        _ => GenVaultConfig::default(),
    };

    match cli.command {
        Commands::Requestors { category, provider } => {
            list_requestors(&config, category, provider.as_deref())?;
        }
        Commands::Describe { requestor_id } => {
            describe(&config, &requestor_id)?;
        }
        Commands::Recommend {
            textual,
            inspect,
            size,
        } => {
            recommend(textual, inspect, size);
        }
        Commands::Inspect { request_id, root } => {
            let root = root.unwrap_or_else(|| config.storage.bundle_root.clone());
            inspect(root, request_id).await?;
        }
        Commands::Verify { reference, root } => {
            let root = root.unwrap_or_else(|| config.storage.bundle_root.clone());
            verify(reference, root).await?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

fn list_requestors(
    config: &GenVaultConfig,
    category: Option<ProviderCategory>,
    provider: Option<&str>,
) -> Result<()> {
    let registry = builtin_registry(config)?;

    for r in registry.all() {
        let d = r.describe();
        if category.is_some_and(|c| c != d.category()) {
            continue;
        }
        if provider.is_some_and(|p| p != d.provider_id()) {
            continue;
        }
        let threshold = d
            .output_file_type()
            .file_threshold
            .map(|t| format!("≥{} B", t))
            .unwrap_or_else(|| "category default".to_string());
        println!(
            "{:<42} {:<28} {:<30} {}",
            d.requestor_id(),
            d.display_name(),
            d.output_file_type().mime_type,
            threshold
        );
    }
    Ok(())
}

fn describe(config: &GenVaultConfig, requestor_id: &str) -> Result<()> {
    let registry = builtin_registry(config)?;
    let requestor = registry
        .get(requestor_id)
        .with_context(|| format!("unknown requestor: {}", requestor_id))?;

    let description = serde_json::json!({
        "descriptor": requestor.describe(),
        "default_configuration": requestor.default_configuration_json()?,
    });
    println!("{}", serde_json::to_string_pretty(&description)?);
    Ok(())
}

fn recommend(textual: bool, inspect: bool, size: Option<u64>) {
    let format = SerializationFormat::recommend(textual, inspect, size);
    println!("{}", format);
    println!("  MIME type:      {}", format.mime_type());
    println!("  Extension:      .{}", format.file_extension());
    println!("  Human readable: {}", format.is_human_readable());
}

async fn inspect(root: PathBuf, request_id: Uuid) -> Result<()> {
    let area = StorageAreaReference::in_bundle(&root, request_id, "genvault");
    if !area.exists().await {
        println!("No storage area at {}", area.base_path().display());
        return Ok(());
    }

    println!("{}", area.base_path().display());
    for path in area.list_files().await? {
        let size = tokio::fs::metadata(&path).await?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("  {:<40} {:>12} B", name, size);
    }
    Ok(())
}

async fn verify(reference_path: PathBuf, root: PathBuf) -> Result<()> {
    let content = tokio::fs::read_to_string(&reference_path)
        .await
        .with_context(|| format!("failed to read {}", reference_path.display()))?;
    let reference: TypedDataFileReference = serde_json::from_str(&content)?;

    println!("🔍 {}", reference.relative_path());
    if !reference.file_exists(&root).await {
        println!("  ✗ File not found under {}", root.display());
        anyhow::bail!("verification failed");
    }
    println!("  ✓ File exists");

    if !reference.verify_size_matches(&root).await? {
        println!("  ✗ Size mismatch (expected {} bytes)", reference.file_size());
        anyhow::bail!("verification failed");
    }
    println!("  ✓ Size matches ({} bytes)", reference.file_size());

    match reference.verify_checksum(&root).await? {
        Some(true) => println!("  ✓ Checksum matches"),
        Some(false) => {
            println!("  ✗ Checksum mismatch");
            anyhow::bail!("verification failed");
        }
        None => println!("  ℹ No checksum recorded"),
    }
    Ok(())
}

fn show_config(config: Option<&GenVaultConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    println!("{}", config.to_toml()?);
    Ok(())
}
