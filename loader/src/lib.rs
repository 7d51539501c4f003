//! Asynchronous package-loading orchestrator for the embedded runtime.
//!
//! # Architecture
//!
//! - [`initialize_runtime`] - one-time bootstrap sequencer: starts binary
//!   module compilation, runs the engine's startup against a shared
//!   module descriptor, awaits the module-ready and initial-data signals
//!   jointly, then exposes the narrowed [`RuntimeHandle`].
//! - [`resolve`] - pure transitive-dependency resolution of a load
//!   request against the manifest and the loaded-package map.
//! - [`PackageLoader`] - serializes all load requests through a single
//!   FIFO queue so at most one load operation drives the engine's
//!   dependency-tracking machinery at a time.
//! - [`preload_dynamic_libraries`] - walks the engine's virtual
//!   filesystem and instantiates every dynamic library ahead of use, one
//!   at a time, for environments that cannot instantiate synchronously
//!   inside the linking call path.
//!
//! # Concurrency model
//!
//! Everything is event-loop driven and non-blocking. Ordering guarantees:
//! load operations are totally ordered; dynamic-library instantiations
//! are sequential in discovery order; the two bootstrap readiness signals
//! are unordered and awaited jointly. Cancellation is not supported -
//! once initiated, a load or bootstrap runs to completion or failure.

mod bootstrap;
mod handle;
mod preload;
mod queue;
mod resolve;

pub use bootstrap::{RUNTIME_MODULE_PATH, initialize_runtime};
pub use handle::RuntimeHandle;
pub use preload::preload_dynamic_libraries;
pub use queue::{NO_NEW_PACKAGES, PackageLoader};
pub use resolve::resolve;

pub use pyrite_config::RuntimeOptions;
pub use pyrite_runtime as runtime;
pub use pyrite_types as types;
