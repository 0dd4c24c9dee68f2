//! Stack trace archive on the filesystem.
//!
//! Each distinct failure is written exactly once to
//! `<destination>/stacktrace_<Kind>_<fingerprint>.txt`. The filename is
//! derived from content, so an existing file is taken as proof that the trace
//! is already archived and is never rewritten.
//!
//! There are no locks and no in-memory index. Concurrent writers (threads or
//! separate processes) racing on the same fingerprint are serialized by the
//! filesystem's create-new primitive alone: the first `create_new` wins and
//! writes, everyone else sees `AlreadyExists` and treats the trace as handled.
//! A reader may therefore briefly observe a file that the winner is still
//! writing.
//!
//! ```text
//! /var/log/app/traces/
//! ├── stacktrace_ConnectionReset_3f9a...c1.txt
//! └── stacktrace_Timeout_b71e...04.txt
//! ```

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{OpsLogError, OpsResult};
use crate::failure::Failure;
use crate::fingerprint::Fingerprint;
use crate::render::trace_string;

/// Fixed filename prefix of archive files.
pub const ARCHIVE_PREFIX: &str = "stacktrace";

/// Fixed filename suffix of archive files.
pub const ARCHIVE_SUFFIX: &str = ".txt";

/// Longest kind segment kept in a filename. The fingerprint alone keeps names unique.
pub const MAX_KIND_LEN: usize = 100;

/// Dereferenceable `file://` URI of an archived trace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(Url);

impl Locator {
    /// Build a locator for a filesystem path.
    ///
    /// Relative paths are resolved against the current working directory.
    pub fn from_path(path: &Path) -> OpsResult<Self> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        Url::from_file_path(&absolute)
            .map(Self)
            .map_err(|_| OpsLogError::InvalidLocator(absolute))
    }

    /// Parse a locator from its string form.
    pub fn parse(s: &str) -> Result<Self, url::ParseError> {
        Url::parse(s).map(Self)
    }

    /// Canonical URI string.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Underlying URL.
    pub fn url(&self) -> &Url {
        &self.0
    }

    /// Filesystem path the locator points at, if it is a `file` URI.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        self.0.to_file_path().ok()
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// How a call to [`ArchiveWriter::ensure_archived`] resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// This call created and wrote the file
    Written,
    /// The file already existed before this call looked
    AlreadyPresent,
    /// Another writer created the file between the existence check and our create
    LostRace,
}

/// Result of archiving a failure.
#[derive(Debug, Clone)]
pub struct Archived {
    pub path: PathBuf,
    pub locator: Locator,
    pub outcome: ArchiveOutcome,
}

/// Writes each distinct trace to its own file, at most once.
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    destination: PathBuf,
}

impl ArchiveWriter {
    /// Create a writer for an existing destination directory.
    ///
    /// The directory itself is not created or checked here.
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
        }
    }

    /// Directory archive files are written into.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Archive filename for a failure kind and fingerprint.
    ///
    /// Kind characters outside `[A-Za-z0-9_.$-]` become `_`, and the kind is
    /// cut to [`MAX_KIND_LEN`] characters.
    pub fn file_name(kind: &str, fingerprint: &Fingerprint) -> String {
        let kind: String = kind
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .take(MAX_KIND_LEN)
            .collect();
        format!(
            "{}_{}_{}{}",
            ARCHIVE_PREFIX, kind, fingerprint, ARCHIVE_SUFFIX
        )
    }

    /// Full archive path for a failure kind and fingerprint.
    pub fn archive_path(&self, kind: &str, fingerprint: &Fingerprint) -> PathBuf {
        self.destination.join(Self::file_name(kind, fingerprint))
    }

    /// Make sure the trace for `fingerprint` exists on disk and return its locator.
    ///
    /// Losing the creation race is success. Any other I/O error is returned as
    /// [`OpsLogError::Archive`]; nothing is retried.
    pub fn ensure_archived(
        &self,
        failure: &Failure,
        fingerprint: &Fingerprint,
    ) -> OpsResult<Archived> {
        let path = self.archive_path(&failure.kind, fingerprint);

        let outcome = if path.exists() {
            ArchiveOutcome::AlreadyPresent
        } else {
            write_new(failure, &path)?
        };

        let locator = Locator::from_path(&path)?;
        Ok(Archived {
            path,
            locator,
            outcome,
        })
    }
}

fn write_new(failure: &Failure, path: &Path) -> OpsResult<ArchiveOutcome> {
    write_new_with(failure, path, |file| file)
}

/// Exclusive create, then write through `wrap(file)`.
///
/// A file whose write fails is removed again so a partial trace is never taken
/// for an archived one.
fn write_new_with<W: Write>(
    failure: &Failure,
    path: &Path,
    wrap: impl FnOnce(File) -> W,
) -> OpsResult<ArchiveOutcome> {
    let file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        // the winner is writing it (possibly right now)
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(ArchiveOutcome::LostRace),
        Err(source) => {
            return Err(OpsLogError::Archive {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut text = trace_string(failure);
    text.push('\n');

    let mut out = wrap(file);
    if let Err(source) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
        drop(out);
        let _ = std::fs::remove_file(path);
        return Err(OpsLogError::Archive {
            path: path.to_path_buf(),
            source,
        });
    }

    Ok(ArchiveOutcome::Written)
}
