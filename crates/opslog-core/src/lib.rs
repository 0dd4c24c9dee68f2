//! Ops Logging Core Library
//!
//! Stack trace deduplication and archival for operations-oriented logging.
//!
//! ## Overview
//!
//! Instead of inlining large, repetitive stack traces into the log stream,
//! each distinct failure is fingerprinted by content, written once to a side
//! file, and replaced in the log line by its message plus a `file://` locator:
//!
//! ```text
//! failure -> fingerprint -> stacktrace_<Kind>_<fp>.txt (create-if-absent) -> "<message> (<locator>)"
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use opslog_core::{Failure, ProcessorBuilder, StackFrame};
//!
//! let processor = ProcessorBuilder::new()
//!     .with_stacktrace_dir("/var/log/app/traces")
//!     .build()?;
//!
//! let failure = Failure::new("Timeout")
//!     .with_message("upstream did not answer")
//!     .with_frame(StackFrame::at("app::fetch", "src/fetch.rs:31:9"));
//!
//! let mut line = String::from("fetch failed: ");
//! processor.process(&failure, &mut line)?;
//! // fetch failed: upstream did not answer (file:///var/log/app/traces/stacktrace_Timeout_....txt)
//! ```
//!
//! ## Concurrency
//!
//! Processing is synchronous and lock-free. The filesystem's create-new
//! primitive is the only synchronization point, which keeps archival correct
//! across threads and across processes sharing a destination directory.

pub mod archive;
pub mod config;
pub mod error;
pub mod failure;
pub mod fingerprint;
pub mod logging;
pub mod processor;
pub mod render;

// Re-exports
pub use archive::{ArchiveOutcome, ArchiveWriter, Archived, Locator};
pub use config::{ProcessorBuilder, ProcessorConfig};
pub use error::{OpsLogError, OpsResult};
pub use failure::{Failure, StackFrame, MAX_CAUSE_DEPTH};
pub use fingerprint::{
    Blake3Fingerprint, Fingerprint, FingerprintAlgorithm, FingerprintCalculator,
    Sha256Fingerprint,
};
pub use processor::{FilesystemProcessor, StackTraceProcessor};
pub use render::{render_substitute, render_trace, trace_string};
