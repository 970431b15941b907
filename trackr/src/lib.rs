//! # trackr - Tracked-file manifest for file managers
//!
//! Keeps the set of files an application created or imported inside a shared
//! storage area, so listings can hide incidental files placed there by other
//! programs.
//!
//! ## Key Features
//! - Idempotent track / untrack and atomic retarget
//! - Write-through persistence behind a pluggable backend
//! - MessagePack file backend with atomic saves and backup recovery
//! - In-memory backend for tests

pub mod config;
pub mod error;
pub mod manifest;
pub mod persistence;

/// Set of tracked absolute paths
pub type TrackedSet = hashbrown::HashSet<std::path::PathBuf>;

pub use config::PersistenceConfig;
pub use error::{ManifestError, ManifestResult};
pub use manifest::Manifest;
pub use persistence::{FilePersistence, ManifestPersistence, MemoryPersistence};
