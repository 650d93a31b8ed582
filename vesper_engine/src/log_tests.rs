//! Unit tests for the logging module
//!
//! The capture logger sees entries from any test running in parallel, so
//! every assertion filters on this file's own source tag.

use std::sync::{Arc, Mutex};
use serial_test::serial;

use crate::engine::Engine;
use crate::log::{Logger, LogEntry, LogSeverity};

const SOURCE: &str = "vesper::log_tests";

/// Test logger that captures entries into a shared vector
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn install_capture_logger() -> Arc<Mutex<Vec<LogEntry>>> {
    let entries = Arc::new(Mutex::new(Vec::new()));
    Engine::set_logger(CaptureLogger { entries: entries.clone() });
    entries
}

fn captured_from(entries: &Arc<Mutex<Vec<LogEntry>>>) -> Vec<LogEntry> {
    entries
        .lock()
        .unwrap()
        .iter()
        .filter(|entry| entry.source == SOURCE)
        .cloned()
        .collect()
}

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
#[serial]
fn test_custom_logger_receives_entries() {
    let entries = install_capture_logger();

    Engine::log(LogSeverity::Info, SOURCE, "hello".to_string());

    let captured = captured_from(&entries);
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Info);
    assert_eq!(captured[0].message, "hello");
    assert!(captured[0].file.is_none());
    assert!(captured[0].line.is_none());

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_detailed_log_carries_file_and_line() {
    let entries = install_capture_logger();

    Engine::log_detailed(
        LogSeverity::Error,
        SOURCE,
        "boom".to_string(),
        "some_file.rs",
        42,
    );

    let captured = captured_from(&entries);
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].severity, LogSeverity::Error);
    assert_eq!(captured[0].file, Some("some_file.rs"));
    assert_eq!(captured[0].line, Some(42));

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_error_macro_logs_with_location() {
    let entries = install_capture_logger();

    crate::engine_error!(SOURCE, "failed with code {}", 7);

    let captured = captured_from(&entries);
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].message, "failed with code 7");
    assert!(captured[0].file.is_some());
    assert!(captured[0].line.is_some());

    Engine::reset_logger();
}

#[test]
#[serial]
fn test_bail_macro_logs_and_returns_error() {
    let entries = install_capture_logger();

    fn failing() -> crate::error::Result<()> {
        crate::engine_bail!(SOURCE, "bad state {}", 3);
    }

    let result = failing();
    assert!(result.is_err());
    match result.unwrap_err() {
        crate::error::Error::BackendError(msg) => assert_eq!(msg, "bad state 3"),
        other => panic!("unexpected error variant: {:?}", other),
    }

    assert_eq!(captured_from(&entries).len(), 1);

    Engine::reset_logger();
}
