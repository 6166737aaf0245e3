//! Command-line interface for concurrent zip extraction.
//!
//! `punzip extract` unpacks an archive into a directory (or nowhere, with
//! `--dry-run`) and `punzip list` prints what an archive contains.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use punzip::{
    ArchiveInfo, DirSink, DiscardSink, ExtractError, ExtractOptions, ExtractReport, Extractor,
    OutputSink, Progress, ZipSource,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

const EXIT_FAILURE: i32 = 1;
const EXIT_CANCELLED: i32 = 130;

#[derive(Parser)]
#[command(name = "punzip")]
#[command(version, about = "Extract zip archives concurrently", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a zip archive
    Extract {
        /// Archive file to extract
        archive: PathBuf,

        /// Output directory (default: <archive-stem>-<unix-seconds>)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Members extracted at the same time, 0 for no limit
        #[arg(short, long, env = "PUNZIP_CONCURRENCY")]
        concurrency: Option<usize>,

        /// Read every member but write nothing
        #[arg(long)]
        dry_run: bool,

        /// Do not apply permission bits stored in the archive
        #[arg(long)]
        no_permissions: bool,

        /// Do not apply modification times stored in the archive
        #[arg(long)]
        no_mtime: bool,

        /// Hide the progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// List archive members
    List {
        /// Archive file to inspect
        archive: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract {
            archive,
            out,
            concurrency,
            dry_run,
            no_permissions,
            no_mtime,
            quiet,
        } => {
            let args = ExtractArgs {
                out: out.unwrap_or_else(|| default_out_dir(&archive)),
                archive,
                concurrency,
                dry_run,
                no_permissions,
                no_mtime,
                quiet,
            };
            handle_extract(args).await
        }
        Commands::List { archive, json } => handle_list(&archive, json).map(|_| 0),
    };

    match result {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(EXIT_FAILURE);
        }
    }
}

struct ExtractArgs {
    archive: PathBuf,
    out: PathBuf,
    concurrency: Option<usize>,
    dry_run: bool,
    no_permissions: bool,
    no_mtime: bool,
    quiet: bool,
}

/// `<archive-stem>-<unix-seconds>` next to the current directory.
fn default_out_dir(archive: &Path) -> PathBuf {
    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    PathBuf::from(format!("{stem}-{secs}"))
}

async fn handle_extract(args: ExtractArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let archive = args.archive.clone();
    let source = tokio::task::spawn_blocking(move || ZipSource::open(archive)).await??;

    let sink: Arc<dyn OutputSink> = if args.dry_run {
        Arc::new(DiscardSink)
    } else {
        Arc::new(
            DirSink::new(&args.out)
                .preserve_permissions(!args.no_permissions)
                .preserve_modified(!args.no_mtime),
        )
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || on_interrupt.cancel())?;

    let mut options = ExtractOptions::default();
    if let Some(n) = args.concurrency {
        options.concurrency = n;
    }
    debug!(concurrency = options.concurrency, out = %args.out.display(), "extract");

    let bar = if args.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(source.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len}")?,
        );
        bar
    };
    let monitor_bar = bar.clone();

    let report = Extractor::from_options(&options)
        .with_cancel_token(cancel)
        .with_monitor(move |p: Progress| {
            monitor_bar.set_length(p.total as u64);
            monitor_bar.set_position(p.completed as u64);
        })
        .extract_report(Arc::new(source), sink)
        .await;
    bar.finish_and_clear();

    Ok(summarize_report(&args, report))
}

fn summarize_report(args: &ExtractArgs, report: ExtractReport) -> i32 {
    let stats = report.stats.clone();
    for failure in &report.errors {
        error!(index = failure.index, name = %failure.name, error = %failure.error, "member failed");
    }

    match report.into_result() {
        Ok(_) => {
            let target = if args.dry_run {
                "nowhere (dry run)".to_string()
            } else {
                args.out.display().to_string()
            };
            println!(
                "Extracted {} members ({} bytes) to {} in {:.3}s",
                stats.completed,
                stats.bytes_written,
                target,
                stats.duration.as_secs_f64()
            );
            0
        }
        Err(ExtractError::Cancelled) => {
            eprintln!(
                "Cancelled after {} of {} members in {:.3}s",
                stats.completed,
                stats.total,
                stats.duration.as_secs_f64()
            );
            EXIT_CANCELLED
        }
        Err(e) => {
            eprintln!(
                "Error: {} ({} of {} members failed, {:.3}s)",
                e,
                stats.failed,
                stats.total,
                stats.duration.as_secs_f64()
            );
            EXIT_FAILURE
        }
    }
}

fn handle_list(archive: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let info = punzip::probe(archive)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_listing(&info);
    }
    Ok(())
}

fn print_listing(info: &ArchiveInfo) {
    for entry in &info.entry_list {
        println!("{:>10}  {:>12}  {}", entry.mode.to_string(), entry.size, entry.path);
    }
    println!(
        "{} entries: {} directories, {} files, {} unsupported; {} bytes uncompressed",
        info.entries, info.directories, info.files, info.unsupported, info.uncompressed_bytes
    );
    if let Some(size) = info.compressed_bytes {
        println!("archive size: {} bytes", size);
    }
}
