//! Load-queue serialization.
//!
//! The engine exposes one package-loading entry point and one global
//! run-dependency hook slot; a second load operation must never start
//! before the previous one's dependency count has returned to zero. All
//! requests therefore funnel through a FIFO mutex that gates the whole
//! operation - resolution included, so conflict detection always sees
//! every completed load, never a half-applied one.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use url::Url;

use pyrite_runtime::{CompletionCell, HookAction, ModuleDescriptor, RuntimeModule};
use pyrite_types::{
    DependencyManifest, LoadError, PACKAGE_ASSET_EXTENSION, PackageName, PackageSource,
};

use crate::preload::preload_dynamic_libraries;
use crate::resolve::resolve;

/// Result summary when a request reduces to an empty load set.
pub const NO_NEW_PACKAGES: &str = "No new packages to load";

/// Auxiliary data files the engine requests alongside a package payload.
const PACKAGE_DATA_EXTENSION: &str = ".data";

/// Serialized package-loading entry point.
///
/// Sole owner of the mutation capability for the loaded-package map: the
/// map is written only by the completion hook of the currently serialized
/// operation, which is what makes the lock-light shared state safe.
pub struct PackageLoader {
    base_url: Url,
    module: Arc<dyn RuntimeModule>,
    descriptor: Arc<ModuleDescriptor>,
    manifest: DependencyManifest,
    loaded: Arc<RwLock<BTreeMap<PackageName, PackageSource>>>,
    chain: Mutex<()>,
    preload_dynlibs: bool,
}

impl PackageLoader {
    #[must_use]
    pub fn new(
        base_url: Url,
        module: Arc<dyn RuntimeModule>,
        descriptor: Arc<ModuleDescriptor>,
        manifest: DependencyManifest,
        preload_dynlibs: bool,
    ) -> Self {
        Self {
            base_url,
            module,
            descriptor,
            manifest,
            loaded: Arc::new(RwLock::new(BTreeMap::new())),
            chain: Mutex::new(()),
            preload_dynlibs,
        }
    }

    /// Snapshot of the loaded-package map.
    #[must_use]
    pub fn loaded_packages(&self) -> BTreeMap<PackageName, PackageSource> {
        self.loaded
            .read()
            .expect("loaded-package map lock poisoned")
            .clone()
    }

    #[must_use]
    pub fn manifest(&self) -> &DependencyManifest {
        &self.manifest
    }

    /// Load packages and their transitive dependencies.
    ///
    /// Concurrent callers are fully serialized: a later request's
    /// resolution does not begin until the earlier request has settled.
    /// Fulfils with a human-readable summary; `on_progress`, when given,
    /// is told which packages are about to load.
    pub async fn load_package<S: AsRef<str>>(
        &self,
        names: &[S],
        on_progress: Option<&(dyn Fn(&str) + Sync)>,
    ) -> Result<String, LoadError> {
        let _serialized = self.chain.lock().await;
        self.load_one(names, on_progress).await
    }

    async fn load_one<S: AsRef<str>>(
        &self,
        names: &[S],
        on_progress: Option<&(dyn Fn(&str) + Sync)>,
    ) -> Result<String, LoadError> {
        let to_load = {
            let loaded = self
                .loaded
                .read()
                .expect("loaded-package map lock poisoned");
            resolve(names, &self.manifest, &loaded)?
        };
        if to_load.is_empty() {
            return Ok(NO_NEW_PACKAGES.to_string());
        }

        let package_list = to_load
            .keys()
            .map(PackageName::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Some(progress) = on_progress {
            progress(&format!("Loading {package_list}"));
        }
        tracing::info!(packages = %package_list, "loading packages");

        self.rewire_locate_file(&to_load);

        // One-shot hook: when the engine reports zero pending
        // dependencies the batch is fully satisfied - merge the staged
        // entries, clear the slot, fulfill the request.
        let completion: Arc<CompletionCell<(), LoadError>> = Arc::new(CompletionCell::new());
        {
            let loaded = Arc::clone(&self.loaded);
            let staged = to_load.clone();
            let cell = Arc::clone(&completion);
            self.descriptor
                .set_run_dependency_hook(Box::new(move |pending| {
                    if pending > 0 {
                        return HookAction::Retain;
                    }
                    {
                        let mut map = loaded.write().expect("loaded-package map lock poisoned");
                        for (name, source) in &staged {
                            map.insert(name.clone(), source.clone());
                        }
                    }
                    cell.fulfill(());
                    HookAction::Clear
                }));
        }

        // Announce the batch before any fetch starts so the dependency
        // count cannot touch zero between two packages of one batch.
        self.module.begin_load_batch(to_load.len());

        for (name, source) in &to_load {
            match source.asset_url(&self.base_url, name) {
                Ok(url) => {
                    let module = Arc::clone(&self.module);
                    let cell = Arc::clone(&completion);
                    let name = name.clone();
                    let source = source.clone();
                    tokio::spawn(async move {
                        if let Err(err) = fetch_and_inject(&*module, &name, &source, &url).await {
                            tracing::warn!(package = %name, error = %err, "package load failed");
                            cell.fail(err);
                        }
                    });
                }
                Err(e) => {
                    completion.fail(LoadError::AssetFetch {
                        url: source.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        // Invalidate the engine's module-lookup caches now so injected
        // files become visible; this overlaps with the in-flight fetches
        // rather than being sequenced after them.
        if let Err(e) = self.module.invalidate_module_caches() {
            self.descriptor.clear_run_dependency_hook();
            return Err(LoadError::Engine(e));
        }

        if let Err(err) = completion.wait().await {
            // A failed fetch must leave the loaded-package map untouched;
            // drop the hook so a late count-zero cannot merge the batch.
            self.descriptor.clear_run_dependency_hook();
            return Err(err);
        }

        if self.preload_dynlibs {
            preload_dynamic_libraries(&*self.module, &self.descriptor)
                .await
                .map_err(LoadError::Engine)?;
        }

        Ok(format!("Loaded {package_list}"))
    }

    /// Point the engine's path resolution at the right origin for this
    /// batch: auxiliary files of custom-source packages come from their
    /// custom URI, everything else from the base location.
    fn rewire_locate_file(&self, to_load: &BTreeMap<PackageName, PackageSource>) {
        let base = self.base_url.clone();
        let custom: HashMap<String, String> = to_load
            .iter()
            .filter_map(|(name, source)| match source {
                PackageSource::Uri(uri) => Some((name.as_str().to_string(), uri.clone())),
                PackageSource::DefaultChannel => None,
            })
            .collect();
        self.descriptor.set_locate_file(Box::new(move |path| {
            let stem = path.strip_suffix(PACKAGE_DATA_EXTENSION).unwrap_or(path);
            if let Some(uri) = custom.get(stem) {
                return uri
                    .strip_suffix(PACKAGE_ASSET_EXTENSION)
                    .map_or_else(|| uri.clone(), |head| format!("{head}{PACKAGE_DATA_EXTENSION}"));
            }
            base.join(path)
                .map_or_else(|_| format!("{base}{path}"), |url| url.to_string())
        }));
    }
}

async fn fetch_and_inject(
    module: &dyn RuntimeModule,
    name: &PackageName,
    source: &PackageSource,
    url: &Url,
) -> Result<(), LoadError> {
    let payload = pyrite_fetch::fetch_bytes(url)
        .await
        .map_err(|e| LoadError::AssetFetch {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    module
        .inject_package(name, source, payload)
        .await
        .map_err(LoadError::Engine)
}
