//! Narrowed public surface of the live runtime.
//!
//! Constructed once, by reference to the underlying engine module, when
//! the bootstrap sequence reaches `Ready`. Exposes exactly the sanctioned
//! operations; everything else about the engine stays behind the loader.

use std::collections::BTreeMap;
use std::sync::Arc;

use pyrite_runtime::RuntimeModule;
use pyrite_types::{EngineError, LoadError, PackageName, PackageSource};

use crate::queue::PackageLoader;

/// Live, narrowed-capability handle to the embedded runtime.
///
/// Process-wide singleton by convention: created once per bootstrap and
/// shared by reference. Every mutation of loaded-package state goes
/// through [`Self::load_package`], which serializes internally.
pub struct RuntimeHandle {
    module: Arc<dyn RuntimeModule>,
    loader: PackageLoader,
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle").finish_non_exhaustive()
    }
}

impl RuntimeHandle {
    pub(crate) fn new(module: Arc<dyn RuntimeModule>, loader: PackageLoader) -> Self {
        Self { module, loader }
    }

    /// Load packages (by name or source URI) with their transitive
    /// dependencies. Fulfils with a human-readable summary.
    pub async fn load_package<S: AsRef<str>>(
        &self,
        names: &[S],
        on_progress: Option<&(dyn Fn(&str) + Sync)>,
    ) -> Result<String, LoadError> {
        self.loader.load_package(names, on_progress).await
    }

    /// Snapshot of package name -> source for everything loaded so far.
    #[must_use]
    pub fn loaded_packages(&self) -> BTreeMap<PackageName, PackageSource> {
        self.loader.loaded_packages()
    }

    /// Evaluate a snippet in the embedded interpreter.
    pub fn eval(&self, code: &str) -> Result<String, EngineError> {
        self.module.eval(code)
    }

    /// Runtime version string.
    #[must_use]
    pub fn version(&self) -> String {
        self.module.version()
    }
}
