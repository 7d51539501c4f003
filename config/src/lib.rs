//! Configuration loading for the Pyrite loader.
//!
//! Options come from three layers, weakest first: built-in defaults,
//! `pyrite.toml` in the user config directory, and `PYRITE_*` environment
//! variables. A missing config file is not an error; a malformed one is
//! reported with its path.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use serde::Deserialize;
use thiserror::Error;

/// Default interpreter recursion limit, clamped for embeddings with
/// shallow host call stacks.
pub const DEFAULT_RECURSION_LIMIT: u32 = 1000;

const RECURSION_LIMIT_VAR: &str = "PYRITE_RECURSION_LIMIT";
const PRELOAD_DYNLIBS_VAR: &str = "PYRITE_PRELOAD_DYNLIBS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Top-level shape of `pyrite.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct PyriteConfig {
    pub runtime: Option<RuntimeSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RuntimeSection {
    pub recursion_limit: Option<u32>,
    /// Force the ahead-of-time dynamic-library preload pass on or off.
    /// Unset means "ask the host environment".
    pub preload_dynamic_libraries: Option<bool>,
    #[serde(default)]
    pub features: FeatureToggles,
}

/// Eager asset decoding toggles forwarded to the engine. All off by
/// default; the loader injects package payloads itself.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct FeatureToggles {
    #[serde(default)]
    pub image_decoding: bool,
    #[serde(default)]
    pub audio_decoding: bool,
    #[serde(default)]
    pub binary_decoding: bool,
}

/// Effective options consumed by the bootstrap sequencer.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    pub recursion_limit: u32,
    pub preload_dynamic_libraries: Option<bool>,
    pub features: FeatureToggles,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            preload_dynamic_libraries: None,
            features: FeatureToggles::default(),
        }
    }
}

impl PyriteConfig {
    /// Collapse the file layer into effective options, then apply
    /// environment overrides.
    #[must_use]
    pub fn runtime_options(&self) -> RuntimeOptions {
        let mut options = RuntimeOptions::default();
        if let Some(runtime) = &self.runtime {
            if let Some(limit) = runtime.recursion_limit {
                options.recursion_limit = limit;
            }
            options.preload_dynamic_libraries = runtime.preload_dynamic_libraries;
            options.features = runtime.features;
        }
        apply_env_overrides(&mut options);
        options
    }
}

fn apply_env_overrides(options: &mut RuntimeOptions) {
    if let Ok(raw) = env::var(RECURSION_LIMIT_VAR) {
        match raw.parse::<u32>() {
            Ok(limit) => options.recursion_limit = limit,
            Err(_) => {
                tracing::warn!("{RECURSION_LIMIT_VAR}='{raw}' is not a number, ignoring");
            }
        }
    }
    if let Ok(raw) = env::var(PRELOAD_DYNLIBS_VAR) {
        match raw.parse::<bool>() {
            Ok(preload) => options.preload_dynamic_libraries = Some(preload),
            Err(_) => {
                tracing::warn!("{PRELOAD_DYNLIBS_VAR}='{raw}' is not a bool, ignoring");
            }
        }
    }
}

/// Location of `pyrite.toml`, if a config directory exists on this system.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pyrite").join("pyrite.toml"))
}

/// Load the user config. A missing file yields the defaults.
pub fn load() -> Result<PyriteConfig, ConfigError> {
    match config_path() {
        Some(path) => load_from(&path),
        None => Ok(PyriteConfig::default()),
    }
}

/// Load config from an explicit path. A missing file yields the defaults.
pub fn load_from(path: &Path) -> Result<PyriteConfig, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Ok(PyriteConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
