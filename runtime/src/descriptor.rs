//! Module descriptor - configuration handed to the engine before
//! compilation begins.
//!
//! The descriptor is built once by the bootstrap sequencer and shared with
//! the engine for the lifetime of the runtime. The engine consumes its
//! hooks during startup (instantiation, readiness, dependency counting)
//! and keeps using two pieces afterwards: the path-resolution hook and the
//! dynamic-library cache. The run-dependency hook is a single global slot,
//! not per-call state - only the currently serialized load operation may
//! install one.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use futures_util::future::BoxFuture;

use pyrite_types::EngineError;

use crate::module::{CompiledModule, DynlibModule};

/// Resolves an engine-requested asset path to a fetchable URL.
pub type LocateFileHook = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Hands the engine the (possibly still compiling) binary module.
pub type InstantiateHook =
    Box<dyn Fn() -> BoxFuture<'static, Result<CompiledModule, EngineError>> + Send + Sync>;

/// Invoked once when the engine's startup routine has fully finished.
pub type ReadyHook = Box<dyn FnOnce() + Send>;

/// Invoked on every change of the engine's pending-dependency count.
pub type RunDependencyHook = Box<dyn FnMut(usize) -> HookAction + Send>;

/// Whether a run-dependency hook stays installed after an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    Retain,
    Clear,
}

/// Feature-disable flags applied before compilation.
///
/// All eager asset decoding is off by default; the loader injects package
/// payloads itself and the engine must not second-guess their format.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleFeatures {
    pub image_decoding: bool,
    pub audio_decoding: bool,
    pub binary_decoding: bool,
}

pub struct ModuleDescriptor {
    features: ModuleFeatures,
    preloaded_dynlibs: Mutex<HashMap<String, DynlibModule>>,
    locate_file: Mutex<LocateFileHook>,
    instantiate: Mutex<Option<InstantiateHook>>,
    on_ready: Mutex<Option<ReadyHook>>,
    on_run_dependencies: Mutex<Option<RunDependencyHook>>,
}

impl ModuleDescriptor {
    #[must_use]
    pub fn new(features: ModuleFeatures, locate_file: LocateFileHook) -> Self {
        Self {
            features,
            preloaded_dynlibs: Mutex::new(HashMap::new()),
            locate_file: Mutex::new(locate_file),
            instantiate: Mutex::new(None),
            on_ready: Mutex::new(None),
            on_run_dependencies: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn features(&self) -> ModuleFeatures {
        self.features
    }

    /// Resolve an engine-requested asset path to the URL it is served from.
    #[must_use]
    pub fn locate_file(&self, path: &str) -> String {
        (self.locate_file.lock().expect("locate_file lock poisoned"))(path)
    }

    /// Replace the path-resolution hook. Each load request rewires this so
    /// custom-source packages resolve their auxiliary files correctly.
    pub fn set_locate_file(&self, hook: LocateFileHook) {
        *self.locate_file.lock().expect("locate_file lock poisoned") = hook;
    }

    pub fn set_instantiate(&self, hook: InstantiateHook) {
        *self.instantiate.lock().expect("instantiate lock poisoned") = Some(hook);
    }

    /// Called by the engine when it needs the compiled binary module.
    /// Returns `None` if no instantiation hook was configured.
    #[must_use]
    pub fn request_instantiation(
        &self,
    ) -> Option<BoxFuture<'static, Result<CompiledModule, EngineError>>> {
        self.instantiate
            .lock()
            .expect("instantiate lock poisoned")
            .as_ref()
            .map(|hook| hook())
    }

    pub fn set_ready_hook(&self, hook: ReadyHook) {
        *self.on_ready.lock().expect("on_ready lock poisoned") = Some(hook);
    }

    /// Called by the engine once its startup routine has finished. The
    /// hook is consumed; later calls are ignored.
    pub fn signal_ready(&self) {
        let hook = self.on_ready.lock().expect("on_ready lock poisoned").take();
        if let Some(hook) = hook {
            hook();
        } else {
            tracing::debug!("ready signal with no hook installed");
        }
    }

    /// Install the run-dependency hook, replacing any previous one.
    pub fn set_run_dependency_hook(&self, hook: RunDependencyHook) {
        *self
            .on_run_dependencies
            .lock()
            .expect("run-dependency hook lock poisoned") = Some(hook);
    }

    pub fn clear_run_dependency_hook(&self) {
        self.on_run_dependencies
            .lock()
            .expect("run-dependency hook lock poisoned")
            .take();
    }

    /// Called by the engine whenever its pending-dependency count changes.
    ///
    /// The installed hook must not call back into this slot; it signals
    /// removal by returning [`HookAction::Clear`].
    pub fn report_run_dependencies(&self, pending: usize) {
        let mut slot = self
            .on_run_dependencies
            .lock()
            .expect("run-dependency hook lock poisoned");
        if let Some(hook) = slot.as_mut()
            && hook(pending) == HookAction::Clear
        {
            *slot = None;
        }
    }

    /// Whether a dynamic library at `path` is already instantiated.
    #[must_use]
    pub fn has_dynlib(&self, path: &str) -> bool {
        self.preloaded_dynlibs
            .lock()
            .expect("dynlib cache lock poisoned")
            .contains_key(path)
    }

    /// Cache an instantiated dynamic library under its full path.
    pub fn store_dynlib(&self, path: impl Into<String>, module: DynlibModule) {
        self.preloaded_dynlibs
            .lock()
            .expect("dynlib cache lock poisoned")
            .insert(path.into(), module);
    }

    /// Synchronous retrieval used by the engine's dynamic-linking path.
    #[must_use]
    pub fn preloaded_dynlib(&self, path: &str) -> Option<DynlibModule> {
        self.preloaded_dynlibs
            .lock()
            .expect("dynlib cache lock poisoned")
            .get(path)
            .cloned()
    }

    #[must_use]
    pub fn dynlib_count(&self) -> usize {
        self.preloaded_dynlibs
            .lock()
            .expect("dynlib cache lock poisoned")
            .len()
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("features", &self.features)
            .field("dynlibs", &self.dynlib_count())
            .finish_non_exhaustive()
    }
}
