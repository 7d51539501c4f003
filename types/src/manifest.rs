//! Dependency manifest shape.
//!
//! The manifest is published next to the runtime's binary module as
//! `packages.json` and maps every known package to its direct dependency
//! identifiers. The resolver treats it as read-only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Well-known manifest path relative to the base location.
pub const MANIFEST_PATH: &str = "packages.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyManifest {
    /// Package name -> direct dependency identifiers (names or URIs).
    pub dependencies: BTreeMap<String, Vec<String>>,
}

impl DependencyManifest {
    #[must_use]
    pub fn dependencies_of(&self, name: &str) -> Option<&[String]> {
        self.dependencies.get(name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.dependencies.contains_key(name)
    }

    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    /// Register a package with its direct dependencies.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        deps: impl IntoIterator<Item = impl Into<String>>,
    ) {
        self.dependencies
            .insert(name.into(), deps.into_iter().map(Into::into).collect());
    }
}
