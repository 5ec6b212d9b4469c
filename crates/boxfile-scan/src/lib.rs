//! Directory size scanning for boxfile.
//!
//! # Overview
//!
//! `boxfile-scan` walks a directory tree on the tokio runtime and builds a
//! [`ScanNode`] tree whose sizes and counts are aggregated bottom-up:
//!
//! - **Bounded concurrency**: files are stat'ed in batches of 100 and
//!   subdirectories scanned in batches of 10 (see [`ScanConfig`])
//! - **Cooperative cancellation** via [`TreeScanner::cancel`]
//! - **Throttled progress** snapshots through a callback, including the
//!   partial tree
//! - **Fault tolerant**: unreadable files and directories are skipped
//!
//! # Example
//!
//! ```rust,no_run
//! use boxfile_scan::{ScanConfig, ScanOutcome, TreeScanner};
//!
//! # async fn run() {
//! let scanner = TreeScanner::new();
//! scanner.set_progress_callback(|p| println!("{}% {}", p.percentage, p.current_path.display()));
//!
//! match scanner.scan(&ScanConfig::new("/path/to/scan")).await {
//!     ScanOutcome::Completed(report) => println!("{} bytes", report.total_size),
//!     ScanOutcome::Cancelled => println!("cancelled"),
//!     ScanOutcome::Failed(e) => eprintln!("{e}"),
//! }
//! # }
//! ```

mod arena;
mod progress;
mod scanner;

pub use progress::{ProgressCallback, ScanProgress};
pub use scanner::{ScanOutcome, ScanReport, ScanState, TreeScanner};

// Re-export core types for convenience
pub use boxfile_core::{ScanConfig, ScanConfigBuilder, ScanError, ScanNode};
