//! Error kinds surfaced by the loader.
//!
//! Everything here is `Clone`: load results fan out through completion
//! cells to multiple waiters, so payloads must be duplicable. Errors from
//! collaborators that are not `Clone` (HTTP, engine internals) are reduced
//! to message strings at the boundary.

use std::fmt;

use thiserror::Error;

use crate::{PackageName, PackageSource};

/// Failure reported by the embedded runtime engine.
///
/// The engine is an external collaborator; its failures cross the trait
/// boundary as messages.
#[derive(Debug, Clone, Error)]
#[error("engine error: {message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Which record a conflicting source collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSite {
    /// The package is already in the loaded-package map.
    Loaded,
    /// The package is staged in the current resolution.
    Staged,
}

impl fmt::Display for ConflictSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => f.write_str("already loaded"),
            Self::Staged => f.write_str("already being loaded"),
        }
    }
}

/// Resolution failures, detected before any network activity starts.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("invalid package name or URI '{0}'")]
    InvalidPackageIdentifier(String),

    #[error("unknown package '{0}'")]
    UnknownPackage(PackageName),

    #[error(
        "URI mismatch, attempting to load package {name} from {requested} \
         while it is {site} from {existing}"
    )]
    UriConflict {
        name: PackageName,
        requested: PackageSource,
        existing: PackageSource,
        site: ConflictSite,
    },
}

/// Failure of a single `load_package` request.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("failed to fetch package asset from {url}: {message}")]
    AssetFetch { url: String, message: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Terminal failure of the one-time bootstrap sequence.
///
/// There is no partial-success state and no retry; the caller must
/// re-invoke the bootstrap entry point from scratch.
#[derive(Debug, Clone, Error)]
pub enum BootstrapError {
    #[error("failed to fetch runtime module from {url}: {message}")]
    ModuleFetch { url: String, message: String },

    #[error("runtime module compilation failed: {0}")]
    Compile(EngineError),

    #[error("runtime startup failed: {0}")]
    Start(EngineError),

    #[error("failed to fetch dependency manifest from {url}: {message}")]
    Manifest { url: String, message: String },

    #[error(transparent)]
    Engine(#[from] EngineError),
}
