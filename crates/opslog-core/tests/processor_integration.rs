//! End-to-end processor tests
//!
//! Configuration in, log text and archive files out.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use opslog_core::{
    trace_string, Failure, FingerprintAlgorithm, FingerprintCalculator, Locator, OpsLogError,
    ProcessorBuilder, ProcessorConfig, Sha256Fingerprint, StackFrame,
};
use tempfile::TempDir;

#[derive(Debug)]
enum FetchError {
    Upstream(std::io::Error),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Upstream(_) => write!(f, "upstream unavailable"),
        }
    }
}

impl StdError for FetchError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            FetchError::Upstream(e) => Some(e),
        }
    }
}

fn boom() -> Failure {
    Failure::new("RuntimeException")
        .with_message("boom")
        .with_frame(StackFrame::at("app::handler", "src/handler.rs:10:5"))
        .with_frame(StackFrame::at("app::main", "src/main.rs:3:1"))
}

#[test]
fn test_substitute_points_at_archived_trace() {
    let temp = TempDir::new().unwrap();
    let processor = ProcessorBuilder::new()
        .with_stacktrace_dir(temp.path())
        .build()
        .unwrap();

    let mut line = String::new();
    processor.process(&boom(), &mut line).unwrap();

    // "<message> (<locator>)"
    let (message, rest) = line.rsplit_once(" (").unwrap();
    assert_eq!(message, "boom");
    let locator = Locator::parse(rest.strip_suffix(')').unwrap()).unwrap();

    let path = locator.to_file_path().unwrap();
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("stacktrace_RuntimeException_"));
    assert!(name.ends_with(".txt"));

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.trim_end(), trace_string(&boom()));
}

#[test]
fn test_substitute_splits_at_last_delimiter() {
    let temp = TempDir::new().unwrap();
    let processor = ProcessorBuilder::new()
        .with_stacktrace_dir(temp.path())
        .build()
        .unwrap();
    let failure = Failure::new("RetryError")
        .with_message("retry (attempt 2) failed")
        .with_frame(StackFrame::at("app::retry", "src/retry.rs:7:3"));

    let mut line = String::new();
    processor.process(&failure, &mut line).unwrap();

    let (message, rest) = line.rsplit_once(" (").unwrap();
    assert_eq!(message, "retry (attempt 2) failed");
    let locator = Locator::parse(rest.strip_suffix(')').unwrap()).unwrap();

    let content = std::fs::read_to_string(locator.to_file_path().unwrap()).unwrap();
    assert_eq!(content.trim_end(), trace_string(&failure));
}

#[test]
fn test_causes_are_archived_in_full() {
    let temp = TempDir::new().unwrap();
    let processor = ProcessorBuilder::new()
        .with_stacktrace_dir(temp.path())
        .build()
        .unwrap();

    let err = FetchError::Upstream(std::io::Error::new(
        std::io::ErrorKind::TimedOut,
        "no answer in 30s",
    ));
    let failure = Failure::from_error(&err);

    let mut line = String::new();
    processor.process(&failure, &mut line).unwrap();
    assert!(line.starts_with("upstream unavailable (file://"));

    let file = std::fs::read_dir(temp.path()).unwrap().next().unwrap().unwrap();
    let content = std::fs::read_to_string(file.path()).unwrap();
    assert!(content.starts_with("FetchError: upstream unavailable"));
    assert!(content.contains("Caused by: "));
    assert!(content.contains("no answer in 30s"));
}

#[test]
fn test_different_causes_archive_separately() {
    let temp = TempDir::new().unwrap();
    let processor = ProcessorBuilder::new()
        .with_stacktrace_dir(temp.path())
        .build()
        .unwrap();

    let a = boom().caused_by(Failure::new("IoError").with_message("reset"));
    let b = boom().caused_by(Failure::new("IoError").with_message("refused"));

    let mut first = String::new();
    let mut second = String::new();
    processor.process(&a, &mut first).unwrap();
    processor.process(&b, &mut second).unwrap();

    assert_ne!(first, second);
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 2);
}

#[test]
fn test_config_selects_algorithm() {
    let temp = TempDir::new().unwrap();
    let config = ProcessorConfig {
        stacktrace_dir: Some(temp.path().to_path_buf()),
        fingerprint: FingerprintAlgorithm::Sha256,
        create_dir: false,
    };
    let processor = config.build().unwrap();

    let mut line = String::new();
    processor.process(&boom(), &mut line).unwrap();

    let expected = Sha256Fingerprint.fingerprint(&boom());
    assert!(line.contains(&format!("stacktrace_RuntimeException_{}.txt", expected)));
}

#[test]
fn test_custom_calculator() {
    struct Constant;

    impl FingerprintCalculator for Constant {
        fn fingerprint(&self, _failure: &Failure) -> opslog_core::Fingerprint {
            opslog_core::Fingerprint::from_digest(&[0xab, 0xcd])
        }
    }

    let temp = TempDir::new().unwrap();
    let processor = ProcessorBuilder::new()
        .with_stacktrace_dir(temp.path())
        .with_calculator(Arc::new(Constant))
        .build()
        .unwrap();

    let mut line = String::new();
    processor.process(&boom(), &mut line).unwrap();
    assert!(line.ends_with("/stacktrace_RuntimeException_abcd.txt)"));
}

#[test]
fn test_inline_is_default() {
    let processor = ProcessorConfig::default().build().unwrap();

    let mut line = String::new();
    processor.process(&boom(), &mut line).unwrap();

    assert_eq!(line, trace_string(&boom()));
    assert_eq!(line.lines().count(), 3);
    assert!(!line.ends_with('\n'));
}

#[cfg(unix)]
#[test]
fn test_unwritable_destination_is_an_error() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("readonly");
    std::fs::create_dir(&dir).unwrap();
    std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o555)).unwrap();

    // root ignores directory permissions
    if std::fs::write(dir.join("writable"), "").is_ok() {
        return;
    }

    let processor = ProcessorBuilder::new()
        .with_stacktrace_dir(&dir)
        .build()
        .unwrap();

    let mut line = String::new();
    let err = processor.process(&boom(), &mut line).unwrap_err();

    assert!(matches!(err, OpsLogError::Archive { .. }));
    assert!(line.is_empty());

    std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o755)).unwrap();
}
