//! Collaborator surface consumed from the embedded runtime engine.
//!
//! The engine itself (binary-module execution, virtual filesystem
//! internals, dynamic linking) lives behind the trait seams in this crate;
//! the loader only ever talks to [`ModuleHost`], [`RuntimeModule`] and the
//! shared [`ModuleDescriptor`]. Everything the engine needs before
//! compilation begins - feature flags, the dynamic-library cache, the
//! path-resolution, instantiation, ready and dependency-count hooks - is
//! supplied through the descriptor, which the engine then mutates during
//! its own startup and operation.

mod completion;
mod descriptor;
mod module;
mod vfs;

pub use completion::CompletionCell;
pub use descriptor::{
    HookAction, InstantiateHook, LocateFileHook, ModuleDescriptor, ModuleFeatures, ReadyHook,
    RunDependencyHook,
};
pub use module::{CompiledModule, DynlibModule, ModuleHost, RuntimeModule};
pub use vfs::VirtualFs;
