//! Processor configuration.
//!
//! The only choices are whether traces are archived (and where) and which
//! fingerprint algorithm names the archive files. Configuration can come from
//! a JSON file, from the environment, or be set directly on a
//! [`ProcessorBuilder`].
//!
//! ```json
//! { "stacktrace_dir": "/var/log/app/traces", "fingerprint": "blake3", "create_dir": true }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{OpsLogError, OpsResult};
use crate::fingerprint::{FingerprintAlgorithm, FingerprintCalculator};
use crate::processor::{FilesystemProcessor, StackTraceProcessor};

/// Environment variable naming the archive directory.
pub const ENV_STACKTRACE_DIR: &str = "OPSLOG_STACKTRACE_DIR";

/// Environment variable selecting the fingerprint algorithm.
pub const ENV_FINGERPRINT: &str = "OPSLOG_FINGERPRINT";

/// Serializable processor configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Archive directory; `None` selects inline traces
    pub stacktrace_dir: Option<PathBuf>,

    pub fingerprint: FingerprintAlgorithm,

    /// Create the archive directory at build time if it is missing
    pub create_dir: bool,
}

impl ProcessorConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> OpsResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Default configuration with environment overrides applied.
    pub fn from_env() -> OpsResult<Self> {
        Self::default().with_env()
    }

    /// Apply `OPSLOG_STACKTRACE_DIR` and `OPSLOG_FINGERPRINT` overrides.
    pub fn with_env(self) -> OpsResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> OpsResult<Self> {
        if let Some(dir) = lookup(ENV_STACKTRACE_DIR).filter(|d| !d.trim().is_empty()) {
            self.stacktrace_dir = Some(PathBuf::from(dir));
        }
        if let Some(algorithm) = lookup(ENV_FINGERPRINT) {
            self.fingerprint = algorithm.parse().map_err(OpsLogError::InvalidConfig)?;
        }
        Ok(self)
    }

    /// Builder preloaded with this configuration.
    pub fn builder(&self) -> ProcessorBuilder {
        let mut builder = ProcessorBuilder::new()
            .with_fingerprint(self.fingerprint)
            .create_dir(self.create_dir);
        if let Some(dir) = &self.stacktrace_dir {
            builder = builder.with_stacktrace_dir(dir);
        }
        builder
    }

    /// Build the processor this configuration describes.
    pub fn build(&self) -> OpsResult<StackTraceProcessor> {
        self.builder().build()
    }
}

/// Builder for a [`StackTraceProcessor`].
///
/// Without a stack trace directory the inline processor is built.
#[derive(Default)]
pub struct ProcessorBuilder {
    stacktrace_dir: Option<PathBuf>,
    algorithm: FingerprintAlgorithm,
    calculator: Option<Arc<dyn FingerprintCalculator>>,
    create_dir: bool,
}

impl ProcessorBuilder {
    /// Create a builder for the inline processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Archive traces into `dir` instead of printing them inline.
    pub fn with_stacktrace_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stacktrace_dir = Some(dir.into());
        self
    }

    /// Select the fingerprint algorithm.
    pub fn with_fingerprint(mut self, algorithm: FingerprintAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Use a custom calculator (takes precedence over `with_fingerprint`).
    pub fn with_calculator(mut self, calculator: Arc<dyn FingerprintCalculator>) -> Self {
        self.calculator = Some(calculator);
        self
    }

    /// Create a missing archive directory (and parents) when building.
    pub fn create_dir(mut self, create: bool) -> Self {
        self.create_dir = create;
        self
    }

    /// Validate the destination and build the processor.
    pub fn build(self) -> OpsResult<StackTraceProcessor> {
        let Some(dir) = self.stacktrace_dir else {
            return Ok(StackTraceProcessor::Inline);
        };

        if dir.exists() {
            if !dir.is_dir() {
                return Err(OpsLogError::InvalidConfig(format!(
                    "stack trace destination {:?} must be a directory",
                    dir
                )));
            }
        } else if self.create_dir {
            std::fs::create_dir_all(&dir)?;
        } else {
            return Err(OpsLogError::InvalidConfig(format!(
                "stack trace destination {:?} does not exist",
                dir
            )));
        }

        let calculator = self
            .calculator
            .unwrap_or_else(|| Arc::from(self.algorithm.calculator()));
        Ok(FilesystemProcessor::with_calculator(dir, calculator).into())
    }
}
