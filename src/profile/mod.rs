//! Browser profile location and browser-process detection.

pub mod discovery;
pub mod process;

pub use discovery::{compile_name_pattern, find_profile, require_profile};
pub use process::{BrowserWait, ProcessProbe, Sleeper, SystemProbe, ThreadSleeper};
