//! Captured failure descriptions.
//!
//! A [`Failure`] is an immutable, owned snapshot of a fault: a kind name, an
//! optional message, the stack frames active when it was captured, and an
//! optional cause (itself a `Failure`). The processing pipeline only ever reads
//! it.
//!
//! Failures can be built by hand, captured from any `std::error::Error` via its
//! `source()` chain, or deserialized from JSON:
//!
//! ```json
//! {
//!   "kind": "ConnectionReset",
//!   "message": "peer went away",
//!   "frames": [{ "symbol": "net::read", "location": "src/net.rs:42:9" }],
//!   "cause": null
//! }
//! ```

use std::backtrace::Backtrace;
use std::error::Error as StdError;

use serde::{Deserialize, Serialize};

/// Maximum number of causes followed below a failure.
///
/// Ownership makes cyclic chains unrepresentable, but error `source()` chains
/// and deserialized input can still be arbitrarily deep.
pub const MAX_CAUSE_DEPTH: usize = 64;

/// A single stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackFrame {
    /// Function or method symbol, e.g. `opslog_core::archive::ArchiveWriter::ensure_archived`
    pub symbol: String,

    /// Source location, e.g. `src/archive.rs:88:13`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl StackFrame {
    /// Create a frame without a source location.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            location: None,
        }
    }

    /// Create a frame with a source location.
    pub fn at(symbol: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            location: Some(location.into()),
        }
    }
}

/// A captured fault with its stack and causal chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Failure {
    /// Category name, typically the short type name of the error
    pub kind: String,

    /// Human-readable message, if the fault carried one
    #[serde(default)]
    pub message: Option<String>,

    /// Stack frames, innermost first
    #[serde(default)]
    pub frames: Vec<StackFrame>,

    /// The failure that caused this one
    #[serde(default)]
    pub cause: Option<Box<Failure>>,
}

impl Failure {
    /// Create a failure with no message, frames or cause.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: None,
            frames: Vec::new(),
            cause: None,
        }
    }

    /// Set the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Append one stack frame.
    pub fn with_frame(mut self, frame: StackFrame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Append several stack frames.
    pub fn with_frames(mut self, frames: impl IntoIterator<Item = StackFrame>) -> Self {
        self.frames.extend(frames);
        self
    }

    /// Set the cause.
    pub fn caused_by(mut self, cause: Failure) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Message text, or the empty string when absent.
    pub fn message_or_empty(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }

    /// Iterate over this failure followed by its causes, outermost first.
    ///
    /// Stops after [`MAX_CAUSE_DEPTH`] causes.
    pub fn chain(&self) -> Chain<'_> {
        Chain {
            next: Some(self),
            remaining: MAX_CAUSE_DEPTH + 1,
        }
    }

    /// Number of causes below the depth bound that `chain()` does not visit.
    pub fn truncated_causes(&self) -> usize {
        let mut current = self.chain().last().and_then(|f| f.cause.as_deref());
        let mut count = 0;
        while let Some(failure) = current {
            count += 1;
            current = failure.cause.as_deref();
        }
        count
    }

    /// Capture an error and its `source()` chain.
    ///
    /// The outer kind is the short type name of `E`; kinds further down the
    /// chain come from each source's `Debug` form. Common std and serde_json
    /// error types are named by their module path instead (`io::Error`).
    /// No frames are attached; combine with [`Failure::capture_frames`] when
    /// the call site matters.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: StdError + 'static,
    {
        let kind = match known_kind(err) {
            Some(kind) => kind.to_string(),
            None => short_type_name(std::any::type_name::<E>()),
        };
        let mut failure = Self::describe(kind, err);
        failure.cause = err.source().map(|source| Box::new(Self::from_dyn_error(source)));
        failure
    }

    /// Capture a type-erased error and its `source()` chain.
    pub fn from_dyn_error(err: &(dyn StdError + 'static)) -> Self {
        let mut links = Vec::new();
        let mut current = Some(err);
        while let Some(e) = current {
            if links.len() > MAX_CAUSE_DEPTH {
                break;
            }
            let kind = known_kind(e).map_or_else(|| kind_from_debug(e), str::to_string);
            links.push(Self::describe(kind, e));
            current = e.source();
        }

        let mut failure: Option<Failure> = None;
        while let Some(mut link) = links.pop() {
            link.cause = failure.map(Box::new);
            failure = Some(link);
        }
        failure.unwrap_or_else(|| Failure::new("Error"))
    }

    /// Attach the frames of the current thread's stack.
    pub fn capture_frames(self) -> Self {
        let backtrace = Backtrace::force_capture();
        let frames = parse_backtrace(&backtrace.to_string());
        self.with_frames(frames)
    }

    fn describe(kind: String, err: &dyn StdError) -> Self {
        let text = err.to_string();
        Self {
            kind,
            message: (!text.is_empty()).then_some(text),
            frames: Vec::new(),
            cause: None,
        }
    }
}

/// Iterator over a failure and its causes.
pub struct Chain<'a> {
    next: Option<&'a Failure>,
    remaining: usize,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Failure;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next?;
        self.remaining -= 1;
        self.next = current.cause.as_deref();
        Some(current)
    }
}

/// Parse the `Display` output of `std::backtrace::Backtrace` into frames.
///
/// Frame lines look like `  12: symbol::path` and are optionally followed by
/// an `at file:line:col` line. Anything else (including the
/// `disabled backtrace` placeholder) is ignored.
pub fn parse_backtrace(text: &str) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(location) = trimmed.strip_prefix("at ") {
            if let Some(frame) = frames.last_mut() {
                if frame.location.is_none() {
                    frame.location = Some(location.trim().to_string());
                }
            }
            continue;
        }

        if let Some((index, symbol)) = trimmed.split_once(": ") {
            if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) {
                frames.push(StackFrame::new(symbol.trim()));
            }
        }
    }

    frames
}

/// `alloc::string::String` -> `String`, `core::option::Option<u8>` -> `Option`
fn short_type_name(full: &str) -> String {
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .to_string()
}

/// Names for error types whose short name is just `Error` or whose `Debug`
/// output starts with a private variant (`Custom`, `Os`, `Kind`).
fn known_kind(err: &(dyn StdError + 'static)) -> Option<&'static str> {
    if err.is::<std::io::Error>() {
        Some("io::Error")
    } else if err.is::<std::fmt::Error>() {
        Some("fmt::Error")
    } else if err.is::<serde_json::Error>() {
        Some("serde_json::Error")
    } else if err.is::<std::num::ParseIntError>() {
        Some("ParseIntError")
    } else if err.is::<std::num::ParseFloatError>() {
        Some("ParseFloatError")
    } else if err.is::<std::str::Utf8Error>() {
        Some("Utf8Error")
    } else if err.is::<std::string::FromUtf8Error>() {
        Some("FromUtf8Error")
    } else {
        None
    }
}

/// Leading identifier of the `Debug` output, e.g. `Os { code: 2, .. }` -> `Os`.
fn kind_from_debug(err: &dyn StdError) -> String {
    let debug = format!("{:?}", err);
    let ident: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    let short = short_type_name(&ident);
    if short.is_empty() {
        "Error".to_string()
    } else {
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Outer {
        inner: Inner,
    }

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "request failed")
        }
    }

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "connection reset")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.inner)
        }
    }

    impl StdError for Inner {}

    #[test]
    fn test_from_error_walks_source_chain() {
        let failure = Failure::from_error(&Outer { inner: Inner });

        assert_eq!(failure.kind, "Outer");
        assert_eq!(failure.message.as_deref(), Some("request failed"));

        let cause = failure.cause.as_deref().expect("cause");
        assert_eq!(cause.kind, "Inner");
        assert_eq!(cause.message.as_deref(), Some("connection reset"));
        assert!(cause.cause.is_none());
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let failure = Failure::from_error(&err);

        assert_eq!(failure.kind, "io::Error");
        assert_eq!(failure.message.as_deref(), Some("disk on fire"));
    }

    #[test]
    fn test_from_dyn_io_error_names_type_not_variant() {
        let custom = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer went away");
        let os = std::io::Error::from_raw_os_error(2);
        let simple = std::io::Error::from(std::io::ErrorKind::NotFound);

        for err in [custom, os, simple] {
            let failure = Failure::from_dyn_error(&err);
            assert_eq!(failure.kind, "io::Error");
        }
    }

    #[test]
    fn test_io_error_as_source_keeps_type_name() {
        #[derive(Debug)]
        struct Wrapper(std::io::Error);

        impl fmt::Display for Wrapper {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "read failed")
            }
        }

        impl StdError for Wrapper {
            fn source(&self) -> Option<&(dyn StdError + 'static)> {
                Some(&self.0)
            }
        }

        let failure = Failure::from_error(&Wrapper(std::io::Error::from_raw_os_error(13)));

        assert_eq!(failure.kind, "Wrapper");
        assert_eq!(failure.cause.as_deref().unwrap().kind, "io::Error");
    }

    #[test]
    fn test_parse_int_error_kind() {
        let err = "x".parse::<u32>().unwrap_err();
        assert_eq!(Failure::from_dyn_error(&err).kind, "ParseIntError");
    }

    #[test]
    fn test_chain_is_bounded() {
        let mut failure = Failure::new("Leaf");
        for i in 0..(MAX_CAUSE_DEPTH + 10) {
            failure = Failure::new(format!("Level{}", i)).caused_by(failure);
        }

        assert_eq!(failure.chain().count(), MAX_CAUSE_DEPTH + 1);
        assert_eq!(failure.truncated_causes(), 10);
    }

    #[test]
    fn test_chain_without_cause() {
        let failure = Failure::new("Solo");
        assert_eq!(failure.chain().count(), 1);
        assert_eq!(failure.truncated_causes(), 0);
    }

    #[test]
    fn test_parse_backtrace() {
        let text = "   0: opslog_core::archive::write\n\
                    \x20            at ./src/archive.rs:10:5\n\
                    \x20  1: std::rt::lang_start\n\
                    \x20  2: main\n\
                    \x20            at ./src/main.rs:3:1\n";
        let frames = parse_backtrace(text);

        assert_eq!(
            frames,
            vec![
                StackFrame::at("opslog_core::archive::write", "./src/archive.rs:10:5"),
                StackFrame::new("std::rt::lang_start"),
                StackFrame::at("main", "./src/main.rs:3:1"),
            ]
        );
    }

    #[test]
    fn test_parse_disabled_backtrace() {
        assert!(parse_backtrace("disabled backtrace").is_empty());
    }

    #[test]
    fn test_json_with_missing_optional_fields() {
        let failure: Failure = serde_json::from_str(r#"{"kind":"Timeout"}"#).unwrap();
        assert_eq!(failure, Failure::new("Timeout"));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("std::io::error::Error"), "Error");
        assert_eq!(short_type_name("my_crate::Wrapper<alloc::string::String>"), "Wrapper");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
