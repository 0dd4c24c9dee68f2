//! Stack trace processors.
//!
//! The logging front-end hands every failure it needs to embed to
//! [`StackTraceProcessor::process`] together with the line it is building.
//! Which variant runs is fixed when the processor is built:
//!
//! - [`StackTraceProcessor::Inline`] appends the full multi-line trace.
//! - [`StackTraceProcessor::Filesystem`] archives the trace once per
//!   fingerprint and appends `<message> (<locator>)` instead.

use std::path::Path;
use std::sync::Arc;

use crate::archive::{Archived, ArchiveWriter};
use crate::error::OpsResult;
use crate::failure::Failure;
use crate::fingerprint::{Blake3Fingerprint, FingerprintCalculator};
use crate::render::{render_substitute, render_trace};

/// Deduplicating processor: fingerprint, archive, substitute.
#[derive(Clone)]
pub struct FilesystemProcessor {
    writer: ArchiveWriter,
    calculator: Arc<dyn FingerprintCalculator>,
}

impl FilesystemProcessor {
    /// Processor archiving into `destination` with the default BLAKE3 fingerprint.
    pub fn new(destination: impl Into<std::path::PathBuf>) -> Self {
        Self::with_calculator(destination, Arc::new(Blake3Fingerprint))
    }

    /// Processor archiving into `destination` with a custom fingerprint calculator.
    pub fn with_calculator(
        destination: impl Into<std::path::PathBuf>,
        calculator: Arc<dyn FingerprintCalculator>,
    ) -> Self {
        Self {
            writer: ArchiveWriter::new(destination),
            calculator,
        }
    }

    /// Directory archive files are written into.
    pub fn destination(&self) -> &Path {
        self.writer.destination()
    }

    /// Archive `failure` if needed, then append its substitute text.
    pub fn process(&self, failure: &Failure, output: &mut String) -> OpsResult<Archived> {
        let fingerprint = self.calculator.fingerprint(failure);
        let archived = self.writer.ensure_archived(failure, &fingerprint)?;
        render_substitute(failure, &archived.locator, output);
        Ok(archived)
    }
}

impl std::fmt::Debug for FilesystemProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesystemProcessor")
            .field("destination", &self.writer.destination())
            .finish()
    }
}

/// Replaces failures in log output, either inline or by archived reference.
#[derive(Debug, Clone, Default)]
pub enum StackTraceProcessor {
    /// Full trace in the log line. Used when no archive directory is configured.
    #[default]
    Inline,
    /// Archived trace plus a short substitute in the log line.
    Filesystem(FilesystemProcessor),
}

impl StackTraceProcessor {
    /// Append the text that stands in for `failure` to `output`.
    ///
    /// `output` is only appended to. Archive I/O failures (other than a lost
    /// creation race) are returned unchanged; there is no fallback to inline.
    pub fn process(&self, failure: &Failure, output: &mut String) -> OpsResult<()> {
        match self {
            StackTraceProcessor::Inline => {
                render_trace(failure, output);
                Ok(())
            }
            StackTraceProcessor::Filesystem(processor) => {
                processor.process(failure, output).map(|_| ())
            }
        }
    }

    /// Whether traces are archived rather than inlined.
    pub fn is_archiving(&self) -> bool {
        matches!(self, StackTraceProcessor::Filesystem(_))
    }

    /// Archive directory, when archiving.
    pub fn destination(&self) -> Option<&Path> {
        match self {
            StackTraceProcessor::Inline => None,
            StackTraceProcessor::Filesystem(processor) => Some(processor.destination()),
        }
    }
}

impl From<FilesystemProcessor> for StackTraceProcessor {
    fn from(processor: FilesystemProcessor) -> Self {
        StackTraceProcessor::Filesystem(processor)
    }
}
