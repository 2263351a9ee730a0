#![forbid(unsafe_code)]

//! prefs-overlay (pov): keeps a browser profile's `user.js` in sync with a
//! curated base configuration plus the user's own overrides.
//!
//! The pipeline for every install or update:
//! 1. **Backup**: snapshot the tracked profile files with SHA-256 digests
//! 2. **Merge**: base followed by overrides, verbatim, with shadowed keys reported
//! 3. **Diff**: candidate vs. live file, summarized as added preference keys
//! 4. **Apply**: confirm (interactive only), wait for the browser, atomic write
//!
//! # Library usage
//!
//! ```rust,no_run
//! use prefs_overlay::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use prefs_overlay::core::config::Config;
//! use prefs_overlay::engine::merge::merge;
//! ```

pub mod prelude;

pub mod backup;
pub mod core;
pub mod engine;
pub mod fetch;
pub mod logger;
pub mod notify;
pub mod ops;
pub mod profile;
pub mod schedule;
