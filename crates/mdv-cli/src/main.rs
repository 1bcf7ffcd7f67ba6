//! mdv CLI: schema-governed markdown vaults.
//!
//! Commands: init, check, reindex, schema rename, completions

mod check;
mod rename;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use mdv_check::index_snapshot;
use mdv_index::{IndexManager, INDEX_PATH};
use mdv_vault::{Vault, VaultSnapshot};

#[derive(Debug, Parser)]
#[command(name = "mdv", version, about = "Schema-governed markdown vaults")]
struct Cli {
    /// Vault root directory.
    #[arg(long, global = true, default_value = ".")]
    vault: PathBuf,

    /// More log output on stderr (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a vault skeleton (schema.yaml, mdv.yaml, .mdv/).
    Init {
        /// Directory to initialize (default: --vault).
        path: Option<PathBuf>,
    },
    /// Validate every document against the schema.
    Check(check::CheckArgs),
    /// Rebuild the object index from the vault files.
    Reindex,
    /// Schema refactoring.
    Schema {
        #[command(subcommand)]
        cmd: SchemaCommand,
    },
    /// Print shell completions.
    Completions {
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
enum SchemaCommand {
    /// Rename a type or a field everywhere it is used.
    Rename {
        #[command(subcommand)]
        target: rename::RenameTarget,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.cmd {
        Command::Init { path } => cmd_init(&path.unwrap_or(cli.vault)),
        Command::Check(args) => check::run(&open_vault(&cli.vault)?, &args),
        Command::Reindex => cmd_reindex(&open_vault(&cli.vault)?),
        Command::Schema {
            cmd: SchemaCommand::Rename { target },
        } => rename::run(&open_vault(&cli.vault)?, &target),
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "mdv", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn open_vault(root: &std::path::Path) -> anyhow::Result<Vault> {
    Vault::open(root).with_context(|| format!("open vault at {}", root.display()))
}

fn load_snapshot(vault: &Vault) -> anyhow::Result<VaultSnapshot> {
    vault
        .load_snapshot()
        .with_context(|| format!("load vault at {}", vault.root().display()))
}

/// The on-disk index when one exists, else a throwaway index of `snapshot`.
fn open_index(vault: &Vault, snapshot: &VaultSnapshot) -> anyhow::Result<IndexManager> {
    let path = vault.root().join(INDEX_PATH);
    if path.exists() {
        debug!(path = %path.display(), "using on-disk index");
        return IndexManager::open(&path).with_context(|| format!("open index {}", path.display()));
    }
    let index = IndexManager::in_memory().context("create in-memory index")?;
    index_snapshot(&index, snapshot).context("index vault")?;
    Ok(index)
}

fn cmd_init(root: &std::path::Path) -> anyhow::Result<ExitCode> {
    Vault::init(root).with_context(|| format!("initialize vault at {}", root.display()))?;
    println!("Initialized mdv vault at {}", root.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_reindex(vault: &Vault) -> anyhow::Result<ExitCode> {
    let snapshot = load_snapshot(vault)?;
    let path = vault.root().join(INDEX_PATH);
    let index = IndexManager::open(&path).with_context(|| format!("open index {}", path.display()))?;
    index.clear().context("clear index")?;
    index_snapshot(&index, &snapshot).context("index vault")?;

    let objects = index.object_count().context("count objects")?;
    let files = index.file_count().context("count files")?;
    info!(objects, files, "reindexed");
    println!("Indexed {objects} objects from {files} files");
    for failure in &snapshot.parse_failures {
        eprintln!("skipped {}: {}", failure.file_path, failure.message);
    }
    Ok(ExitCode::SUCCESS)
}
