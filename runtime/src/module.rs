//! Trait seams between the loader and the engine.
//!
//! [`ModuleHost`] is the embedding environment: it compiles the fetched
//! binary module and runs the engine's startup against a shared
//! [`ModuleDescriptor`]. [`RuntimeModule`] is the live engine surface the
//! loader drives afterwards. Both traits hide everything about how the
//! engine actually executes; the opaque [`CompiledModule`] and
//! [`DynlibModule`] handles pass engine artifacts through loader code
//! without the loader ever looking inside.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use pyrite_types::{EngineError, PackageName, PackageSource};

use crate::descriptor::ModuleDescriptor;
use crate::vfs::VirtualFs;

/// Opaque handle to a compiled (not yet started) binary module.
#[derive(Clone)]
pub struct CompiledModule(Arc<dyn Any + Send + Sync>);

impl CompiledModule {
    pub fn new(inner: impl Any + Send + Sync) -> Self {
        Self(Arc::new(inner))
    }

    #[must_use]
    pub fn downcast<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompiledModule(..)")
    }
}

/// Opaque handle to an instantiated dynamic-linkable sub-module.
#[derive(Clone)]
pub struct DynlibModule(Arc<dyn Any + Send + Sync>);

impl DynlibModule {
    pub fn new(inner: impl Any + Send + Sync) -> Self {
        Self(Arc::new(inner))
    }

    #[must_use]
    pub fn downcast<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for DynlibModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DynlibModule(..)")
    }
}

/// Live engine surface driven by the loader after bootstrap.
pub trait RuntimeModule: Send + Sync {
    /// The engine's virtual filesystem.
    fn filesystem(&self) -> &dyn VirtualFs;

    /// Announce that `count` package payloads are about to be injected.
    ///
    /// The engine counts each announced package as one outstanding
    /// dependency until its payload arrives, so the dependency count
    /// reaches zero exactly when the batch is fully satisfied.
    fn begin_load_batch(&self, count: usize);

    /// Deliver a fetched package payload to the engine.
    ///
    /// Installing the payload settles one outstanding dependency; the
    /// engine reports the new count through the descriptor's
    /// run-dependency hook.
    fn inject_package(
        &self,
        name: &PackageName,
        source: &PackageSource,
        payload: Vec<u8>,
    ) -> BoxFuture<'_, Result<(), EngineError>>;

    /// Asynchronously instantiate a dynamic library's byte contents.
    ///
    /// Callers must never overlap two instantiations; the target
    /// environment forbids concurrent instantiation calls.
    fn instantiate_dynlib(
        &self,
        path: &str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'_, Result<DynlibModule, EngineError>>;

    /// Drop the engine's internal module-lookup caches so newly injected
    /// files become visible to its import machinery.
    fn invalidate_module_caches(&self) -> Result<(), EngineError>;

    /// Clamp the interpreter's recursion limit to the embedding's safe
    /// call-stack depth.
    fn set_recursion_limit(&self, limit: u32) -> Result<(), EngineError>;

    /// Evaluate a snippet in the embedded interpreter.
    fn eval(&self, code: &str) -> Result<String, EngineError>;

    /// Runtime version string.
    fn version(&self) -> String;
}

/// The embedding environment for the binary module.
pub trait ModuleHost: Send + Sync {
    /// Begin asynchronous compilation of the runtime's binary module.
    fn compile(&self, bytes: Vec<u8>) -> BoxFuture<'static, Result<CompiledModule, EngineError>>;

    /// Run the engine's startup routine against the descriptor.
    ///
    /// During startup the engine pulls the compiled module through the
    /// descriptor's instantiation hook, installs its initial data
    /// dependencies (reporting counts through the run-dependency hook) and
    /// fires the ready hook once its own startup routine finishes - in no
    /// guaranteed order relative to the returned future resolving.
    fn start(
        &self,
        descriptor: Arc<ModuleDescriptor>,
    ) -> BoxFuture<'static, Result<Arc<dyn RuntimeModule>, EngineError>>;

    /// Whether this environment can instantiate dynamic libraries
    /// synchronously inside the engine's linking call path. When it can,
    /// the ahead-of-time preload pass is unnecessary.
    fn supports_sync_dynlib_instantiation(&self) -> bool;
}
