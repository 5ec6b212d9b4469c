//! boxfile - File and ZIP archive operations from the command line.
//!
//! Usage:
//!   boxfile list PATH                 List a folder or archive folder
//!   boxfile read PATH                 Read a file (archive entries included)
//!   boxfile copy SOURCE DESTINATION   Copy between disk and archives
//!   boxfile move SOURCE DESTINATION   Move on disk
//!   boxfile drives                    List drive roots
//!   boxfile scan [PATH]               Size a directory tree
//!   boxfile request [JSON]            Run a JSON request (stdin if omitted)
//!
//! Paths may point inside ZIP archives, e.g. `/data/photos.zip/2024/a.jpg`.

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, bail};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use boxfile_ops::{CompressionMethod, FileOperation, OperationExecutor};
use boxfile_scan::{ScanConfig, ScanNode, ScanOutcome, TreeScanner};

#[derive(Parser)]
#[command(
    name = "boxfile",
    version,
    about = "File and ZIP archive operations with a concurrent size scanner",
    long_about = "boxfile treats ZIP archives as folders: paths such as \
                  `/data/photos.zip/2024/a.jpg` address entries inside the archive.\n\n\
                  Every command prints a JSON result on stdout."
)]
struct Cli {
    /// Print compact JSON instead of pretty JSON
    #[arg(long, global = true)]
    compact: bool,

    /// Directory for temporary files used by archive-to-archive copies
    #[arg(long, global = true)]
    temp_dir: Option<PathBuf>,

    /// Store entries added to archives without compression
    #[arg(long, global = true)]
    store: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List a folder or a folder inside an archive
    List {
        /// Folder path
        path: String,
    },

    /// Read a file; images are returned as data URLs
    Read {
        /// File path
        path: String,
    },

    /// Copy a file or folder
    Copy {
        /// Source path
        source: String,
        /// Destination path
        destination: String,
    },

    /// Move a file or folder on disk
    Move {
        /// Source path
        source: String,
        /// Destination path
        destination: String,
    },

    /// List available drive roots
    Drives,

    /// Compute the size tree of a directory
    Scan {
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Print progress lines on stderr
        #[arg(short, long)]
        progress: bool,

        /// Minimum milliseconds between progress events
        #[arg(long, default_value = "100")]
        interval: u64,

        /// Folder count treated as 100% by the progress estimate
        #[arg(long, default_value = "1000")]
        estimate: u64,

        /// Print only the root summary instead of the whole tree
        #[arg(short, long)]
        summary: bool,
    },

    /// Run a JSON request such as {"operation":"list","path":"/tmp"}
    Request {
        /// Request body (read from stdin when omitted)
        json: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let executor = build_executor(&cli);

    if let Some(operation) = file_operation(&cli.command) {
        let result = executor.execute(operation).await;
        return print_json(&result, cli.compact);
    }

    match cli.command {
        Command::Scan {
            path,
            progress,
            interval,
            estimate,
            summary,
        } => {
            let config = ScanConfig::builder()
                .root(path)
                .progress_interval_ms(interval)
                .folder_estimate(estimate)
                .build()
                .context("Invalid scan configuration")?;
            let outcome = run_scan(&config, progress).await;
            if summary {
                print_summary(&outcome);
            } else {
                print_json(&outcome, cli.compact)?;
            }
        }
        Command::Request { json } => {
            let body = match json {
                Some(body) => body,
                None => {
                    let mut body = String::new();
                    std::io::stdin()
                        .read_to_string(&mut body)
                        .context("Failed to read request from stdin")?;
                    body
                }
            };
            run_request(&executor, &body, cli.compact).await?;
        }
        Command::List { .. }
        | Command::Read { .. }
        | Command::Copy { .. }
        | Command::Move { .. }
        | Command::Drives => {}
    }

    Ok(())
}

/// The executor request behind a file subcommand, if it is one.
fn file_operation(command: &Command) -> Option<FileOperation> {
    let operation = match command {
        Command::List { path } => FileOperation::list(path.as_str()),
        Command::Read { path } => FileOperation::read(path.as_str()),
        Command::Copy {
            source,
            destination,
        } => FileOperation::copy(source.as_str(), destination.as_str()),
        Command::Move {
            source,
            destination,
        } => FileOperation::move_to(source.as_str(), destination.as_str()),
        Command::Drives => FileOperation::Drives,
        Command::Scan { .. } | Command::Request { .. } => return None,
    };
    Some(operation)
}

fn build_executor(cli: &Cli) -> OperationExecutor {
    let mut executor = OperationExecutor::new();
    if let Some(dir) = &cli.temp_dir {
        executor = executor.with_temp_dir(dir);
    }
    if cli.store {
        executor = executor.with_compression(CompressionMethod::Stored);
    }
    executor
}

/// Dispatch a JSON request. Scan requests carry `rootPath`; everything else
/// is a [`FileOperation`].
async fn run_request(executor: &OperationExecutor, body: &str, compact: bool) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(body).context("Invalid JSON request")?;

    if value.get("operation").and_then(|op| op.as_str()) == Some("scan") {
        let Some(root) = value
            .get("rootPath")
            .or_else(|| value.get("path"))
            .and_then(|p| p.as_str())
        else {
            bail!("scan request requires rootPath");
        };
        debug!(root, "dispatching scan request");
        let outcome = run_scan(&ScanConfig::new(root), false).await;
        return print_json(&outcome, compact);
    }

    let operation: FileOperation =
        serde_json::from_value(value).context("Unsupported request")?;
    debug!(operation = operation.name(), "dispatching request");
    let result = executor.execute(operation).await;
    print_json(&result, compact)
}

/// Run a scan, cancelling it on Ctrl-C.
async fn run_scan(config: &ScanConfig, progress: bool) -> ScanOutcome {
    let scanner = TreeScanner::new();
    if progress {
        scanner.set_progress_callback(|p| {
            eprintln!(
                "[{:>3}%] {} folders, {}  {}",
                p.percentage,
                p.folders_scanned,
                format_size(p.total_size),
                p.current_path.display()
            );
        });
    }

    let scan = scanner.scan(config);
    tokio::pin!(scan);

    tokio::select! {
        outcome = &mut scan => outcome,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Cancelling scan...");
            scanner.cancel();
            scan.await
        }
    }
}

fn print_summary(outcome: &ScanOutcome) {
    match outcome {
        ScanOutcome::Completed(report) => {
            let Some(root) = report.root() else {
                return;
            };
            println!("{}", "─".repeat(60));
            println!(" {} - {}", root.path.display(), format_size(root.size));
            println!(
                " {} files, {} directories",
                root.file_count, root.folder_count
            );
            println!("{}", "─".repeat(60));

            let mut children: Vec<&ScanNode> = root.children.iter().collect();
            children.sort_by(|a, b| b.size.cmp(&a.size));
            for child in children.into_iter().take(10) {
                println!("  {:>10}  {}", format_size(child.size), child.name);
            }
        }
        ScanOutcome::Cancelled => println!("Scan cancelled"),
        ScanOutcome::Failed(e) => println!("Scan failed: {e}"),
    }
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("Failed to serialize result")?;
    println!("{json}");
    Ok(())
}

/// Format bytes as human-readable size.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
