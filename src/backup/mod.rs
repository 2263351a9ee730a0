//! Profile backups: manifests, snapshot, restore, retention.

pub mod manifest;
pub mod store;

pub use manifest::{BackupManifest, BackupReason, ManifestEntry, sha256_hex};
pub use store::{BackupInventory, BackupManager, PruneResult, RestoreReport, Snapshot};
