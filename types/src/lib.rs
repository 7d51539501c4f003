//! Core domain types for Pyrite.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Everything here can be used from any layer of the
//! application: package names and sources, the dependency manifest shape,
//! and the error kinds surfaced by the loader.

mod error;
mod manifest;

pub use error::{BootstrapError, ConflictSite, EngineError, LoadError, ResolveError};
pub use manifest::{DependencyManifest, MANIFEST_PATH};

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// File extension of a fetchable package asset.
pub const PACKAGE_ASSET_EXTENSION: &str = ".pkg";

/// A validated package name.
///
/// Names are non-empty and restricted to `[A-Za-z0-9_-]`, which keeps them
/// unambiguous against source URIs (no slashes, no extensions).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageName(String);

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid package name '{0}'")]
pub struct InvalidPackageName(pub String);

impl PackageName {
    pub fn parse(value: impl Into<String>) -> Result<Self, InvalidPackageName> {
        let value = value.into();
        let valid = !value.is_empty()
            && value
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if valid {
            Ok(Self(value))
        } else {
            Err(InvalidPackageName(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PackageName {
    type Error = InvalidPackageName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PackageName> for String {
    fn from(value: PackageName) -> Self {
        value.0
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a package's asset is fetched from.
///
/// The default channel is the runtime's standard, pre-configured origin;
/// anything else is a caller-supplied URI recorded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageSource {
    DefaultChannel,
    Uri(String),
}

impl PackageSource {
    /// Resolve the URL this package's asset is fetched from.
    ///
    /// Custom URIs may be relative; they resolve against the base location,
    /// which is also where default-channel assets live as `<name>.pkg`.
    pub fn asset_url(&self, base: &Url, name: &PackageName) -> Result<Url, url::ParseError> {
        match self {
            Self::DefaultChannel => base.join(&format!("{name}{PACKAGE_ASSET_EXTENSION}")),
            Self::Uri(uri) => base.join(uri),
        }
    }
}

impl fmt::Display for PackageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DefaultChannel => f.write_str("default channel"),
            Self::Uri(uri) => f.write_str(uri),
        }
    }
}

/// Derive the canonical package name from a requested identifier.
///
/// Bare identifiers must already be valid names. Anything else is treated
/// as a URI whose final path segment, minus the `.pkg` asset extension,
/// names the package. Returns `None` when neither form applies.
#[must_use]
pub fn canonical_package_name(identifier: &str) -> Option<PackageName> {
    if let Ok(name) = PackageName::parse(identifier) {
        return Some(name);
    }
    let tail = identifier.rsplit('/').next().unwrap_or(identifier);
    let stem = tail.strip_suffix(PACKAGE_ASSET_EXTENSION)?;
    PackageName::parse(stem).ok()
}
