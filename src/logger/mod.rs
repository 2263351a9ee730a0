//! Persistent event log with graceful degradation.

pub mod eventlog;

pub use eventlog::{EventLog, EventLogConfig, EventType, LogEntry, Severity};
