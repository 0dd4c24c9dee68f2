//! Logging front-end glue.
//!
//! [`FailureLayer`] is a `tracing_subscriber` layer that turns events into JSON
//! lines and hands recorded errors to a [`StackTraceProcessor`]:
//!
//! ```ignore
//! use opslog_core::config::ProcessorBuilder;
//! use opslog_core::logging::FailureLayer;
//! use tracing_subscriber::prelude::*;
//!
//! let processor = ProcessorBuilder::new()
//!     .with_stacktrace_dir("/var/log/app/traces")
//!     .create_dir(true)
//!     .build()?;
//!
//! let subscriber = tracing_subscriber::registry()
//!     .with(FailureLayer::to_file(processor, "/var/log/app/app.jsonl")?);
//! tracing::subscriber::set_global_default(subscriber)?;
//!
//! // {"level":"error","msg":"read failed","stacktrace":"peer went away (file:///var/log/app/traces/stacktrace_Custom_3f9a...txt)",...}
//! tracing::error!(error = &err as &dyn std::error::Error, "read failed");
//! ```
//!
//! [`StackTraceProcessor`]: crate::processor::StackTraceProcessor

pub mod entry;
pub mod layer;

pub use entry::LogEntry;
pub use layer::FailureLayer;
