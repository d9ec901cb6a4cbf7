//! # localhistory CLI - Shadow revisions for your files
//!
//! Command-line front end for the localhistory engine. It does what an editor
//! integration would do: snapshot files, browse their revisions, label them
//! and hand revision pairs to a diff tool.
//!
//! ## Usage
//! ```bash
//! # Create the repository in the current directory
//! localhistory init
//!
//! # Snapshot a file
//! localhistory save src/main.rs
//!
//! # List its revisions, newest first
//! localhistory list src/main.rs
//!
//! # Label one of them
//! localhistory label src/main.rs 1700000000 before-refactor
//!
//! # Snapshot every file as it is written
//! localhistory watch
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use localhistory::utils::format_bytes;
use localhistory::{
    AddressFormat, DiffPair, HistoryError, ListOptions, ListOrder, Result, RevisionEntry,
    RevisionStore, RevisionStoreBuilder, SaveHook,
};
use notify::{EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// localhistory - keep a timestamped copy of every save
#[derive(Parser)]
#[command(name = "localhistory")]
#[command(version)]
#[command(about = "Shadow revision history for files in a project")]
#[command(long_about = None)]
struct Cli {
    /// Project root (defaults to current directory)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Repository directory name (defaults to .localhistory)
    #[arg(short, long, global = true)]
    repository: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the repository in the project root
    Init {
        /// Do not touch .gitignore
        #[arg(long)]
        no_gitignore: bool,

        /// Default listing order
        #[arg(long, value_enum, default_value = "newest")]
        order: OrderMode,

        /// Snapshot on every save, not only after edits
        #[arg(long)]
        every_save: bool,
    },

    /// Snapshot a file
    Save {
        /// File to snapshot
        file: PathBuf,
    },

    /// List the revisions of a file
    #[command(alias = "ls")]
    List {
        /// File whose revisions to list
        file: PathBuf,

        /// Only labeled revisions
        #[arg(short, long)]
        labeled: bool,

        /// Limit results
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Override the configured order
        #[arg(long, value_enum)]
        order: Option<OrderMode>,
    },

    /// Label a revision
    Label {
        /// File the revision belongs to
        file: PathBuf,

        /// Revision timestamp
        timestamp: i64,

        /// New label
        label: String,
    },

    /// Remove the label of a revision
    Unlabel {
        /// File the revision belongs to
        file: PathBuf,

        /// Revision timestamp
        timestamp: i64,
    },

    /// Delete a revision
    #[command(alias = "rm")]
    Delete {
        /// File the revision belongs to
        file: PathBuf,

        /// Revision timestamp
        timestamp: i64,
    },

    /// Print the two paths to compare
    Diff {
        /// File the revisions belong to
        file: PathBuf,

        /// Revision timestamp
        timestamp: i64,

        /// Second revision; the live file when omitted
        other: Option<i64>,
    },

    /// Show repository status
    Status,

    /// Delete orphaned shadow files
    Prune {
        /// Dry run
        #[arg(long)]
        dry_run: bool,
    },

    /// Snapshot files whenever they are written
    Watch,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OrderMode {
    /// Newest first
    Newest,
    /// Reverse directory scan order
    Scan,
}

impl From<OrderMode> for ListOrder {
    fn from(mode: OrderMode) -> Self {
        match mode {
            OrderMode::Newest => ListOrder::NewestFirst,
            OrderMode::Scan => ListOrder::ScanReversed,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let default_filter = if cli.trace {
        "localhistory=trace"
    } else if cli.verbose {
        "localhistory=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e.user_message());
        std::process::exit(1);
    }
}

/// Main command runner
fn run(cli: Cli) -> Result<()> {
    let root_path = cli.path.unwrap_or_else(|| PathBuf::from("."));
    let builder = match cli.repository {
        Some(dir) => RevisionStoreBuilder::new().repository_dir(dir),
        None => RevisionStoreBuilder::new(),
    };

    match cli.command {
        Commands::Init {
            no_gitignore,
            order,
            every_save,
        } => cmd_init(builder, &root_path, no_gitignore, order, every_save),
        Commands::Save { file } => cmd_save(&builder.build(&root_path)?, &file),
        Commands::List {
            file,
            labeled,
            limit,
            order,
        } => {
            let options = ListOptions {
                labeled_only: labeled,
                limit,
                order: order.map(ListOrder::from),
            };
            cmd_list(&builder.build(&root_path)?, &file, &options)
        }
        Commands::Label {
            file,
            timestamp,
            label,
        } => cmd_label(&builder.build(&root_path)?, &file, timestamp, &label),
        Commands::Unlabel { file, timestamp } => {
            cmd_unlabel(&builder.build(&root_path)?, &file, timestamp)
        }
        Commands::Delete { file, timestamp } => {
            cmd_delete(&builder.build(&root_path)?, &file, timestamp)
        }
        Commands::Diff {
            file,
            timestamp,
            other,
        } => cmd_diff(&builder.build(&root_path)?, &file, timestamp, other),
        Commands::Status => cmd_status(&builder.build(&root_path)?),
        Commands::Prune { dry_run } => cmd_prune(&builder.build(&root_path)?, dry_run),
        Commands::Watch => cmd_watch(builder.build(&root_path)?),
    }
}

/// Create the repository
///
/// Settings passed here are written to `config.json` and apply to every later
/// command.
fn cmd_init(
    builder: RevisionStoreBuilder,
    root_path: &Path,
    no_gitignore: bool,
    order: OrderMode,
    every_save: bool,
) -> Result<()> {
    let store = builder
        .update_gitignore(!no_gitignore)
        .list_order(order.into())
        .create_only_if_dirty(!every_save)
        .build(root_path)?;
    store.update_config(|config| {
        config.list_order = order.into();
        config.update_gitignore = !no_gitignore;
        config.create_only_if_dirty = !every_save;
    })?;

    println!("{} Initialized local history", "✓".green().bold());
    println!(
        "  Project: {}",
        store.project_root().display().to_string().cyan()
    );
    println!(
        "  Repository: {}",
        store.repository_root().display().to_string().cyan()
    );
    println!("\nNext steps:");
    println!(
        "  - Snapshot a file: {}",
        "localhistory save <file>".yellow()
    );
    println!("  - Snapshot on write: {}", "localhistory watch".yellow());

    Ok(())
}

/// Snapshot a file
fn cmd_save(store: &RevisionStore, file: &Path) -> Result<()> {
    let entry = store.try_create_revision(file)?;
    println!(
        "{} Saved revision {} of {}",
        "✓".green().bold(),
        entry.timestamp().to_string().yellow().bold(),
        entry.original_file_name().cyan()
    );
    println!("  {}", entry.shadow_full_path().display().to_string().dimmed());
    Ok(())
}

/// List revisions of a file
fn cmd_list(store: &RevisionStore, file: &Path, options: &ListOptions) -> Result<()> {
    let revisions = store.list_revisions_with(file, options);

    if revisions.is_empty() {
        println!("{}", "No revisions found.".yellow());
        return Ok(());
    }

    println!("{} {}", "Revisions of".blue().bold(), file.display());
    println!();
    for revision in &revisions {
        print_revision(revision);
    }
    println!("\n{} revisions", revisions.len().to_string().bold());

    Ok(())
}

/// Label a revision
fn cmd_label(store: &RevisionStore, file: &Path, timestamp: i64, label: &str) -> Result<()> {
    let mut entry = find_revision(store, file, timestamp)?;
    store.add_label(&mut entry, label)?;
    println!(
        "{} Labeled {} as {}",
        "✓".green().bold(),
        timestamp.to_string().yellow(),
        label.trim().cyan()
    );
    Ok(())
}

/// Remove a label
fn cmd_unlabel(store: &RevisionStore, file: &Path, timestamp: i64) -> Result<()> {
    let mut entry = find_revision(store, file, timestamp)?;
    if !entry.is_labeled() {
        println!("{}", "Revision has no label.".yellow());
        return Ok(());
    }
    store.remove_label(&mut entry)?;
    println!(
        "{} Removed label from {}",
        "✓".green().bold(),
        timestamp.to_string().yellow()
    );
    Ok(())
}

/// Delete a revision
fn cmd_delete(store: &RevisionStore, file: &Path, timestamp: i64) -> Result<()> {
    let entry = find_revision(store, file, timestamp)?;
    let path = entry.shadow_full_path();
    store.delete_revision(entry)?;
    println!("{} Deleted {}", "✓".green().bold(), path.display());
    Ok(())
}

/// Print a diff pair, older side first
fn cmd_diff(store: &RevisionStore, file: &Path, timestamp: i64, other: Option<i64>) -> Result<()> {
    let entry = find_revision(store, file, timestamp)?;
    let pair = match other {
        Some(other) => DiffPair::between(&entry, &find_revision(store, file, other)?),
        None => DiffPair::against_live(&entry),
    };

    println!("{} {}", "---".red(), pair.left_title);
    println!("    {}", pair.left.display());
    println!("{} {}", "+++".green(), pair.right_title);
    println!("    {}", pair.right.display());
    Ok(())
}

/// Show repository status
fn cmd_status(store: &RevisionStore) -> Result<()> {
    let stats = store.stats()?;
    let config = store.config();

    println!("{}", "Local History Status:".blue().bold());
    println!();
    println!("  Project: {}", store.project_root().display());
    println!("  Repository: {}", store.repository_root().display());

    println!("\n{}", "Revisions:".bold());
    println!("  Total: {}", stats.revisions);
    println!("  Labeled: {}", stats.labeled);
    println!("  Directories: {}", stats.shadow_dirs);
    println!("  Size: {}", format_bytes(stats.total_bytes));
    if stats.malformed > 0 {
        println!(
            "  Unrecognized files: {} (run {} to clean up)",
            stats.malformed.to_string().yellow(),
            "localhistory prune".yellow()
        );
    }

    println!("\n{}", "Settings:".bold());
    println!("  Order: {:?}", config.list_order);
    println!("  Only if dirty: {}", config.create_only_if_dirty);
    println!("  Update .gitignore: {}", config.update_gitignore);

    Ok(())
}

/// Delete orphaned shadow files
fn cmd_prune(store: &RevisionStore, dry_run: bool) -> Result<()> {
    if dry_run {
        println!("{}", "Analyzing orphaned revisions (dry run)...".blue().bold());
    } else {
        println!("{}", "Pruning orphaned revisions...".blue().bold());
    }

    let stats = store.prune(dry_run)?;

    println!("\n{}", "Results:".bold());
    println!("  Files examined: {}", stats.files_examined);
    println!(
        "  Orphans found: {}",
        stats.orphans.len().to_string().yellow()
    );
    for orphan in stats.orphans.iter().take(10) {
        println!("    - {}", orphan.display().to_string().dimmed());
    }
    if stats.orphans.len() > 10 {
        println!(
            "    ... and {} more",
            (stats.orphans.len() - 10).to_string().dimmed()
        );
    }

    if dry_run {
        println!(
            "  Space to reclaim: {}",
            format_bytes(stats.bytes_reclaimed).green()
        );
        println!("\n{}", "No changes made (dry run)".dimmed());
    } else {
        println!(
            "  Files deleted: {}",
            stats.files_deleted.to_string().green()
        );
        println!("  Directories removed: {}", stats.dirs_removed);
        println!(
            "  Space reclaimed: {}",
            format_bytes(stats.bytes_reclaimed).green()
        );
        println!("  Time: {}ms", stats.duration_ms.to_string().cyan());
    }

    Ok(())
}

/// Snapshot files as they are written until interrupted
fn cmd_watch(store: RevisionStore) -> Result<()> {
    let root = store.project_root();
    let hook: SaveHook<PathBuf> = SaveHook::new(Arc::new(store));

    let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>();
    let mut watcher = notify::recommended_watcher(tx)?;
    watcher.watch(&root, RecursiveMode::Recursive)?;

    println!(
        "{} {} {}",
        "Watching".blue().bold(),
        root.display(),
        "(Ctrl+C to stop)".dimmed()
    );

    for result in rx {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Watch error: {}", e);
                continue;
            }
        };
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            continue;
        }

        for path in event.paths {
            if !path.is_file() || !hook.store().is_tracked(&path) {
                continue;
            }
            // A write is both the edit and the save
            hook.on_dirty_changed(path.clone(), true);
            if let Some(entry) = hook.on_before_save(&path, &path) {
                println!(
                    "{} {} {}",
                    "✓".green().bold(),
                    entry.display_timestamp().dimmed(),
                    path.display()
                );
            }
        }
    }

    Ok(())
}

fn find_revision(store: &RevisionStore, file: &Path, timestamp: i64) -> Result<RevisionEntry> {
    store
        .list_revisions(file)
        .into_iter()
        .find(|revision| revision.timestamp() == timestamp)
        .ok_or_else(|| {
            HistoryError::invalid_input(format!(
                "no revision {} of {}",
                timestamp,
                file.display()
            ))
        })
}

fn print_revision(revision: &RevisionEntry) {
    print!(
        "  {} {} ",
        revision.timestamp().to_string().yellow().bold(),
        revision.display_timestamp().dimmed()
    );
    if let Some(label) = revision.label() {
        print!("{}", label.cyan());
    }
    if revision.format() == AddressFormat::Legacy {
        print!(" {}", "(legacy)".dimmed());
    }
    println!();
}
