//! Virtual filesystem surface exposed by the engine.

use pyrite_types::EngineError;

/// Directory listing, type checks and reads over the engine's in-memory
/// filesystem. All operations are synchronous; the engine owns the data.
pub trait VirtualFs: Send + Sync {
    /// Entry names directly under `path` (no `.`/`..`).
    fn read_dir(&self, path: &str) -> Result<Vec<String>, EngineError>;

    fn is_dir(&self, path: &str) -> bool;

    fn read_file(&self, path: &str) -> Result<Vec<u8>, EngineError>;
}
