use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use notevault::catalog::{self, notes};
use notevault::{SchemaBundle, SchemaRegistry, StoreConfig, StoreController, StoreFile};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "vault-tool")]
#[command(about = "Developer tooling for NoteVault stores")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a store's header without loading its records
    Inspect {
        #[arg(long)]
        store: PathBuf,
    },
    /// Bring the store in a directory up to the newest schema
    Migrate {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        clean: bool,
    },
    /// Write a sample store at one of the bundled schema versions
    Seed {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        schema: String,
        #[arg(long, default_value_t = 3)]
        notes: usize,
        #[arg(long)]
        with_images: bool,
    },
    /// List a schema chain and its mappings
    Schemas {
        /// JSON schema bundle to check instead of the bundled chain
        #[arg(long)]
        bundle: Option<PathBuf>,
        /// Dump the chain as a JSON bundle
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Inspect { store } => inspect(&store),
        Command::Migrate { dir, clean } => migrate(&dir, clean),
        Command::Seed {
            store,
            schema,
            notes,
            with_images,
        } => seed(&store, &schema, notes, with_images),
        Command::Schemas { bundle, json } => schemas(bundle.as_deref(), json),
    }
}

fn inspect(store: &Path) -> Result<()> {
    let metadata = StoreFile::new(store)
        .read_metadata()
        .with_context(|| format!("Failed to read store header from '{}'", store.display()))?;
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

fn migrate(dir: &Path, clean: bool) -> Result<()> {
    let config = StoreConfig::in_directory(dir).with_reset(clean);
    let controller = StoreController::for_notes(config)
        .context("Failed to build the note schema chain")?;
    let handle = controller
        .obtain_ready_store()
        .with_context(|| format!("Failed to obtain a ready store in '{}'", dir.display()))?;

    let output = json!({
        "schema": handle.schema().identifier,
        "records": handle.store().len(),
        "migration": handle.migration_report(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn seed(store: &Path, schema: &str, note_count: usize, with_images: bool) -> Result<()> {
    let registry = catalog::note_registry()?;
    let version = registry.resolve_model(schema).map_err(|_| {
        anyhow!(
            "Unknown schema '{}', expected one of {}",
            schema,
            identifiers(&registry)
        )
    })?;

    let sample = notes::sample_store(version, note_count, with_images)
        .with_context(|| format!("Failed to build a sample store at '{}'", schema))?;
    let metadata = StoreFile::new(store)
        .save(&sample)
        .with_context(|| format!("Failed to write store to '{}'", store.display()))?;

    println!(
        "Seeded {} records at schema {} into {}",
        metadata.record_count,
        metadata.schema_identifier,
        store.display()
    );
    Ok(())
}

fn schemas(bundle: Option<&Path>, as_json: bool) -> Result<()> {
    let registry = match bundle {
        Some(path) => SchemaBundle::from_path(path)
            .and_then(SchemaBundle::into_registry)
            .with_context(|| format!("Invalid schema bundle '{}'", path.display()))?,
        None => catalog::note_registry()?,
    };

    if as_json {
        println!("{}", SchemaBundle::from(&registry).to_json_string()?);
        return Ok(());
    }

    for version in registry.versions() {
        let entities = version
            .entities
            .iter()
            .map(|entity| entity.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        println!("{:<8} {}", version.identifier, entities);
    }
    for spec in registry.mappings() {
        let mappings = spec
            .entity_mappings
            .iter()
            .map(|mapping| match mapping.transition_tag() {
                Some(tag) => format!("{}@{}", mapping.name, tag),
                None => mapping.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        println!("{} -> {}: {}", spec.source_schema, spec.destination_schema, mappings);
    }
    Ok(())
}

fn identifiers(registry: &SchemaRegistry) -> String {
    registry
        .versions()
        .iter()
        .map(|version| version.identifier.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
