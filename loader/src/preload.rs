//! Ahead-of-use instantiation of dynamic-linkable binary modules.
//!
//! Some execution environments cannot instantiate a binary module
//! synchronously inside the engine's dynamic-linking call path. On those
//! environments every dynamic library a freshly loaded package brought
//! along must be instantiated up front and cached, so the linking path
//! can retrieve it synchronously later.

use pyrite_runtime::{ModuleDescriptor, RuntimeModule, VirtualFs};
use pyrite_types::EngineError;

const DYNLIB_EXTENSION: &str = ".so";

/// Walk the engine's virtual filesystem and instantiate every dynamic
/// library not yet in the descriptor's cache, strictly one at a time in
/// discovery order. Returns the number of libraries instantiated.
///
/// Unreadable directories are skipped; an instantiation failure aborts
/// the chain and propagates.
pub async fn preload_dynamic_libraries(
    module: &dyn RuntimeModule,
    descriptor: &ModuleDescriptor,
) -> Result<usize, EngineError> {
    let mut discovered = Vec::new();
    discover(module.filesystem(), "/", &mut discovered);

    let mut instantiated = 0;
    for path in discovered {
        if descriptor.has_dynlib(&path) {
            continue;
        }
        let bytes = module.filesystem().read_file(&path)?;
        let dynlib = module.instantiate_dynlib(&path, bytes).await?;
        descriptor.store_dynlib(path, dynlib);
        instantiated += 1;
    }

    if instantiated > 0 {
        tracing::debug!(count = instantiated, "preloaded dynamic libraries");
    }
    Ok(instantiated)
}

fn discover(fs: &dyn VirtualFs, root: &str, found: &mut Vec<String>) {
    let Ok(entries) = fs.read_dir(root) else {
        return;
    };
    for entry in entries {
        if entry.starts_with('.') {
            continue;
        }
        let path = format!("{root}{entry}");
        if entry.ends_with(DYNLIB_EXTENSION) {
            found.push(path);
        } else if fs.is_dir(&path) {
            discover(fs, &format!("{path}/"), found);
        }
    }
}
