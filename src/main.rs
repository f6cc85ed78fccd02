//! imgindex - Index and browse large category/item image datasets.
//!
//! Usage:
//!   imgindex build DIR INDEX            Scan a dataset and save its index
//!   imgindex summary INDEX              List categories and item counts
//!   imgindex ls INDEX CATEGORY          List the items of one category
//!   imgindex cat INDEX CATEGORY NAME    Write one item to stdout
//!   imgindex --help                     Show help

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;

use imgindex_core::{DEFAULT_CONCURRENCY, DEFAULT_EXTENSION, Index, IndexConfig, IndexError, ItemKey};
use imgindex_scan::{BuildProgress, IndexBuilder};

/// Exit status for unknown categories and items.
const EXIT_NOT_FOUND: u8 = 2;

#[derive(Parser)]
#[command(
    name = "imgindex",
    version,
    about = "Index and browse large category/item image datasets",
    long_about = "imgindex scans a dataset laid out as DIR/<category>/<item>.<ext> once, \
                  saves a snapshot of the categories and their item counts, and answers \
                  lookups against that snapshot without rescanning the whole tree."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a dataset and save its index
    Build {
        /// Dataset root (one directory per category)
        dir: PathBuf,

        /// Where to write the index
        index: PathBuf,

        /// Number of categories scanned in parallel
        #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
        jobs: usize,

        /// Required item extension, without the dot
        #[arg(short, long, default_value = DEFAULT_EXTENSION)]
        extension: String,

        /// Print categories as they complete
        #[arg(short, long)]
        verbose: bool,
    },

    /// List every category with its item count
    Summary {
        /// Index file
        index: PathBuf,
    },

    /// List the items of one category
    Ls {
        /// Index file
        index: PathBuf,

        /// Category name
        category: String,
    },

    /// Write one item to stdout or a file
    Cat {
        /// Index file
        index: PathBuf,

        /// Category name
        category: String,

        /// Item name, without extension
        name: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    init_logging();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Build {
            dir,
            index,
            jobs,
            extension,
            verbose,
        } => run_build(dir, &index, jobs, extension, verbose).await,
        Command::Summary { index } => run_summary(&index),
        Command::Ls { index, category } => run_ls(&index, &category),
        Command::Cat {
            index,
            category,
            name,
            output,
        } => run_cat(&index, ItemKey::new(category, name), output),
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(report)
            if report
                .downcast_ref::<IndexError>()
                .is_some_and(IndexError::is_not_found) =>
        {
            eprintln!("Error: {report}");
            Ok(ExitCode::from(EXIT_NOT_FOUND))
        }
        Err(report) => Err(report),
    }
}

/// Log to stderr, filtered by `RUST_LOG` (defaults to warnings).
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
}

/// Build an index and save it.
async fn run_build(
    dir: PathBuf,
    index_path: &Path,
    jobs: usize,
    extension: String,
    verbose: bool,
) -> Result<()> {
    let config = IndexConfig::builder()
        .root(dir)
        .concurrency(jobs)
        .extension(extension)
        .build()
        .context("Invalid build options")?;

    eprintln!("Scanning {}...", config.root.display());

    let builder = IndexBuilder::new();
    let printer = verbose.then(|| tokio::spawn(print_progress(builder.subscribe())));

    let result = builder.build(&config).await;
    // Closing the channel lets the printer drain and exit.
    drop(builder);
    if let Some(printer) = printer {
        let _ = printer.await;
    }
    let index = result.context("Build failed")?;

    println!(
        "Index contains {} images between {} categories",
        index.total_items(),
        index.len()
    );

    index
        .save(index_path)
        .with_context(|| format!("Failed to save index to {}", index_path.display()))?;
    eprintln!("Saved to {}", index_path.display());

    Ok(())
}

/// Print one line per completed category.
async fn print_progress(mut progress_rx: broadcast::Receiver<BuildProgress>) {
    loop {
        match progress_rx.recv().await {
            Ok(progress) => println!(
                "{:9}: \"{}\" {:6} {:12}  {:5.1}% {:8.1}/s",
                progress.completed,
                progress.category,
                progress.item_count,
                progress.running_total,
                progress.fraction() * 100.0,
                progress.categories_per_second()
            ),
            Err(RecvError::Lagged(skipped)) => {
                eprintln!("({skipped} progress lines skipped)");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Show every category with its item count.
fn run_summary(index_path: &Path) -> Result<()> {
    let index = load_index(index_path)?;

    println!();
    println!("{}", "─".repeat(60));
    println!(" {}", index.root().display());
    println!(
        " {} images, {} categories",
        index.total_items(),
        index.len()
    );
    if let Some(built_at) = index.built_at() {
        println!(" Built {}", built_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("{}", "─".repeat(60));
    println!();

    for (category, count) in index.category_counts() {
        println!(" {category:<40} {count:>10}");
    }

    Ok(())
}

/// List the items of one category.
fn run_ls(index_path: &Path, category: &str) -> Result<()> {
    let index = load_index(index_path)?;
    let contents = index.category_contents(category)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for name in contents.iter() {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

/// Copy one item to stdout or a file.
fn run_cat(index_path: &Path, key: ItemKey, output: Option<PathBuf>) -> Result<()> {
    let index = load_index(index_path)?;
    let mut item = index.open(&key)?;

    match output {
        Some(output_path) => {
            let mut file = File::create(&output_path)
                .with_context(|| format!("Failed to create {}", output_path.display()))?;
            io::copy(&mut item, &mut file)?;
            eprintln!("Wrote {key} to {}", output_path.display());
        }
        None => {
            io::copy(&mut item, &mut io::stdout().lock())?;
        }
    }

    Ok(())
}

fn load_index(path: &Path) -> Result<Index> {
    Index::load(path).with_context(|| format!("Failed to load index {}", path.display()))
}
