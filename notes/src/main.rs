//! Command-line front end for threaded annotation files.
//!
//! Wires the `notes-core` store and differ to the terminal, the user's config
//! file, and git (for fetching ancestor revisions during merges).
//!
//! # Startup sequence
//!
//! 1. Parse arguments.
//! 2. Initialise `env_logger` (`RUST_LOG`, or `-v` for debug).
//! 3. Load `config.toml`; failures fall back to defaults.
//! 4. Run the subcommand. Errors propagate to `main` and exit non-zero.

mod config;
mod git;
mod render;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use notes_core::{
    Annotation, AnnotationRepository, IndexOfAllOpenConflicts, LogProgress, Message,
    SnapshotDiffer,
};

use crate::git::{GitFileRetriever, RetrieveFile};

#[derive(Parser)]
#[command(name = "notes", version, about = "Threaded annotations for versioned data files")]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List annotations, optionally filtered by current status or class
    List {
        file: PathBuf,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        class: Option<String>,
        /// Also print every message of each thread
        #[arg(long)]
        thread: bool,
    },
    /// Add a new annotation with an opening message
    Add {
        file: PathBuf,
        #[arg(long)]
        class: String,
        #[arg(long = "ref")]
        reference: String,
        #[arg(long, default_value = "")]
        message: String,
        /// Status of the opening message (default from config)
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        author: Option<String>,
    },
    /// Change an annotation's status by appending a message
    SetStatus {
        file: PathBuf,
        guid: String,
        status: String,
        #[arg(long, default_value = "")]
        message: String,
        #[arg(long)]
        author: Option<String>,
    },
    /// Delete an annotation outright
    Remove { file: PathBuf, guid: String },
    /// List merge-conflict annotations that are still open
    Conflicts { file: PathBuf },
    /// Compare two notes files (ancestor, then current)
    Diff {
        ancestor: PathBuf,
        current: PathBuf,
        /// Also report annotations removed from the current file
        #[arg(long)]
        deletions: bool,
    },
    /// Compare a notes file in the working copy against a git revision
    DiffRev {
        /// Revision holding the ancestor (e.g. HEAD, a branch, a commit id)
        revision: String,
        file: PathBuf,
        #[arg(long)]
        deletions: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn open(file: &Path) -> anyhow::Result<AnnotationRepository> {
    AnnotationRepository::from_file(file, &mut LogProgress)
        .with_context(|| format!("cannot open {}", file.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = config::load();
    log::debug!("config: {config:?}");

    match cli.command {
        Commands::List { file, status, class, thread } => {
            let repo = open(&file)?;
            let shown: Vec<&Annotation> = match &status {
                Some(s) => repo.by_current_status(s),
                None => repo.annotations().iter().collect(),
            };
            for annotation in shown
                .into_iter()
                .filter(|a| class.as_deref().map_or(true, |c| a.class_name == c))
            {
                println!("{}", render::annotation_line(annotation));
                if thread {
                    print!("{}", render::thread(annotation));
                }
            }
        }
        Commands::Add { file, class, reference, message, status, author } => {
            let mut repo = open(&file)?;
            let author = author.unwrap_or_else(|| config.author.clone());
            let status = status.unwrap_or_else(|| config.default_status.clone());
            let annotation = Annotation::new(&class, &reference, &file.to_string_lossy())
                .with_message(Message::new(&author, &status, &message));
            let guid = repo.add_annotation(annotation).guid.clone();
            repo.save(&mut LogProgress)?;
            println!("{guid}");
        }
        Commands::SetStatus { file, guid, status, message, author } => {
            let mut repo = open(&file)?;
            let author = author.unwrap_or_else(|| config.author.clone());
            let changed = repo.set_status(&guid, &author, &status, &message)?;
            println!("{}", render::annotation_line(changed));
            repo.save(&mut LogProgress)?;
        }
        Commands::Remove { file, guid } => {
            let mut repo = open(&file)?;
            let removed = repo.remove(&guid)?;
            repo.save(&mut LogProgress)?;
            println!("removed {}", removed.guid);
        }
        Commands::Conflicts { file } => {
            let mut repo = open(&file)?;
            repo.add_observer(IndexOfAllOpenConflicts::new(), &mut LogProgress)?;
            if let Some(index) = repo.index::<IndexOfAllOpenConflicts>() {
                for guid in index.guids() {
                    if let Some(annotation) = repo.get(guid) {
                        println!("{}", render::annotation_line(annotation));
                    }
                }
                log::info!("{} open conflict(s)", index.count());
            }
        }
        Commands::Diff { ancestor, current, deletions } => {
            let mut listener = render::PrintingListener::default();
            SnapshotDiffer::new()
                .report_deletions(deletions)
                .diff_files(&ancestor, &current, &mut listener)?;
            if listener.printed == 0 {
                println!("no changes");
            }
        }
        Commands::DiffRev { revision, file, deletions } => {
            if !file.exists() {
                bail!("{} does not exist in the working copy", file.display());
            }
            let start = file
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let retriever = GitFileRetriever::discover(start)?;
            let relative = retriever.relative_path(&file)?;
            let ancestor = match retriever.retrieve_historical_version(&relative, &revision)? {
                Some(text) => text,
                None => {
                    log::warn!(
                        "{} does not exist at {revision}; treating every annotation as new",
                        relative.display()
                    );
                    String::new()
                }
            };
            let current = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;

            let mut listener = render::PrintingListener::default();
            SnapshotDiffer::new().report_deletions(deletions).diff(
                &relative.to_string_lossy(),
                &ancestor,
                &current,
                &mut listener,
            )?;
            if listener.printed == 0 {
                println!("no changes");
            }
        }
    }
    Ok(())
}
