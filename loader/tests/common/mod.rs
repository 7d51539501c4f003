//! Shared test fixtures: an in-memory engine and host.
//!
//! `FakeModule` implements the engine surface over an in-memory
//! filesystem and reports dependency-count transitions through the
//! descriptor exactly like a real engine would. `FakeHost` drives the
//! startup handshake, either automatically or under manual test control.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::task::yield_now;
use tokio::time::sleep;

use pyrite_loader::runtime::{
    CompiledModule, DynlibModule, ModuleDescriptor, ModuleHost, RuntimeModule, VirtualFs,
};
use pyrite_loader::types::{EngineError, PackageName, PackageSource};

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory virtual filesystem keyed by full path.
#[derive(Default)]
pub struct FakeVfs {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    unreadable: Mutex<Vec<String>>,
    pub read_dir_calls: AtomicUsize,
}

impl FakeVfs {
    pub fn insert(&self, path: &str, bytes: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
    }

    pub fn mark_unreadable(&self, dir: &str) {
        self.unreadable.lock().unwrap().push(dir.to_string());
    }

    pub fn read_dir_count(&self) -> usize {
        self.read_dir_calls.load(Ordering::SeqCst)
    }
}

impl VirtualFs for FakeVfs {
    fn read_dir(&self, path: &str) -> Result<Vec<String>, EngineError> {
        self.read_dir_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreadable.lock().unwrap().iter().any(|d| d == path) {
            return Err(EngineError::new(format!("cannot read {path}")));
        }
        let files = self.files.lock().unwrap();
        let mut entries: Vec<String> = Vec::new();
        for key in files.keys() {
            if let Some(rest) = key.strip_prefix(path) {
                let segment = rest.split('/').next().unwrap_or(rest);
                if !segment.is_empty() && !entries.iter().any(|e| e == segment) {
                    entries.push(segment.to_string());
                }
            }
        }
        Ok(entries)
    }

    fn is_dir(&self, path: &str) -> bool {
        let prefix = format!("{path}/");
        self.files
            .lock()
            .unwrap()
            .keys()
            .any(|key| key.starts_with(&prefix))
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, EngineError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| EngineError::new(format!("no such file: {path}")))
    }
}

/// In-memory engine. Dependency-count transitions flow through the
/// descriptor's run-dependency hook, mirroring the real engine contract.
pub struct FakeModule {
    pub fs: FakeVfs,
    descriptor: Arc<ModuleDescriptor>,
    pending: Mutex<usize>,
    /// Ordered record of observable engine calls.
    pub events: Mutex<Vec<String>>,
    /// Files installed into the filesystem when a given package injects.
    pub package_files: Mutex<HashMap<String, Vec<(String, Vec<u8>)>>>,
    pub inject_delay: Mutex<Option<Duration>>,
    pub failing_dynlibs: Mutex<Vec<String>>,
    pub instantiations: Mutex<Vec<String>>,
    active_instantiations: AtomicUsize,
    pub max_concurrent_instantiations: AtomicUsize,
    pub invalidations: AtomicUsize,
    pub recursion_limit: Mutex<Option<u32>>,
}

impl FakeModule {
    pub fn new(descriptor: Arc<ModuleDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            fs: FakeVfs::default(),
            descriptor,
            pending: Mutex::new(0),
            events: Mutex::new(Vec::new()),
            package_files: Mutex::new(HashMap::new()),
            inject_delay: Mutex::new(None),
            failing_dynlibs: Mutex::new(Vec::new()),
            instantiations: Mutex::new(Vec::new()),
            active_instantiations: AtomicUsize::new(0),
            max_concurrent_instantiations: AtomicUsize::new(0),
            invalidations: AtomicUsize::new(0),
            recursion_limit: Mutex::new(None),
        })
    }

    /// Install files when `name` is injected (simulates package contents).
    pub fn stage_package_files(&self, name: &str, files: &[(&str, &[u8])]) {
        self.package_files.lock().unwrap().insert(
            name.to_string(),
            files
                .iter()
                .map(|(path, bytes)| ((*path).to_string(), bytes.to_vec()))
                .collect(),
        );
    }

    pub fn add_run_dependencies(&self, count: usize) {
        let pending = {
            let mut pending = self.pending.lock().unwrap();
            *pending += count;
            *pending
        };
        self.descriptor.report_run_dependencies(pending);
    }

    pub fn settle_run_dependency(&self) {
        let pending = {
            let mut pending = self.pending.lock().unwrap();
            *pending = pending.saturating_sub(1);
            *pending
        };
        self.descriptor.report_run_dependencies(pending);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn instantiations(&self) -> Vec<String> {
        self.instantiations.lock().unwrap().clone()
    }
}

impl RuntimeModule for FakeModule {
    fn filesystem(&self) -> &dyn VirtualFs {
        &self.fs
    }

    fn begin_load_batch(&self, count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("begin_batch:{count}"));
        self.add_run_dependencies(count);
    }

    fn inject_package(
        &self,
        name: &PackageName,
        _source: &PackageSource,
        _payload: Vec<u8>,
    ) -> BoxFuture<'_, Result<(), EngineError>> {
        let name = name.clone();
        async move {
            let delay = *self.inject_delay.lock().unwrap();
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            self.events.lock().unwrap().push(format!("inject:{name}"));
            let files = self.package_files.lock().unwrap().get(name.as_str()).cloned();
            if let Some(files) = files {
                for (path, bytes) in files {
                    self.fs.insert(&path, &bytes);
                }
            }
            self.settle_run_dependency();
            Ok(())
        }
        .boxed()
    }

    fn instantiate_dynlib(
        &self,
        path: &str,
        bytes: Vec<u8>,
    ) -> BoxFuture<'_, Result<DynlibModule, EngineError>> {
        let path = path.to_string();
        async move {
            let active = self.active_instantiations.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent_instantiations
                .fetch_max(active, Ordering::SeqCst);
            yield_now().await;
            self.instantiations.lock().unwrap().push(path.clone());
            self.active_instantiations.fetch_sub(1, Ordering::SeqCst);
            if self.failing_dynlibs.lock().unwrap().contains(&path) {
                return Err(EngineError::new(format!("instantiation failed: {path}")));
            }
            Ok(DynlibModule::new(bytes.len()))
        }
        .boxed()
    }

    fn invalidate_module_caches(&self) -> Result<(), EngineError> {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push("invalidate".to_string());
        Ok(())
    }

    fn set_recursion_limit(&self, limit: u32) -> Result<(), EngineError> {
        *self.recursion_limit.lock().unwrap() = Some(limit);
        Ok(())
    }

    fn eval(&self, code: &str) -> Result<String, EngineError> {
        Ok(format!("ok: {code}"))
    }

    fn version(&self) -> String {
        "1.0.0-test".to_string()
    }
}

struct HostInner {
    manual_signals: bool,
    fail_compile: bool,
    fail_start: bool,
    supports_sync: bool,
    module: Mutex<Option<Arc<FakeModule>>>,
    descriptor: Mutex<Option<Arc<ModuleDescriptor>>>,
    compiled_len: Mutex<Option<usize>>,
}

/// Host environment double. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct FakeHost {
    inner: Arc<HostInner>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HostInner {
                manual_signals: false,
                fail_compile: false,
                fail_start: false,
                supports_sync: false,
                module: Mutex::new(None),
                descriptor: Mutex::new(None),
                compiled_len: Mutex::new(None),
            }),
        }
    }

    /// Startup completes without firing any readiness signal; the test
    /// fires them through [`Self::fire_ready`] / [`Self::satisfy_initial_data`].
    #[must_use]
    pub fn with_manual_signals(mut self) -> Self {
        Arc::get_mut(&mut self.inner).unwrap().manual_signals = true;
        self
    }

    #[must_use]
    pub fn failing_compile(mut self) -> Self {
        Arc::get_mut(&mut self.inner).unwrap().fail_compile = true;
        self
    }

    #[must_use]
    pub fn failing_start(mut self) -> Self {
        Arc::get_mut(&mut self.inner).unwrap().fail_start = true;
        self
    }

    #[must_use]
    pub fn supporting_sync_instantiation(mut self) -> Self {
        Arc::get_mut(&mut self.inner).unwrap().supports_sync = true;
        self
    }

    pub fn module(&self) -> Arc<FakeModule> {
        self.inner
            .module
            .lock()
            .unwrap()
            .clone()
            .expect("host has not started a module yet")
    }

    pub fn descriptor(&self) -> Arc<ModuleDescriptor> {
        self.inner
            .descriptor
            .lock()
            .unwrap()
            .clone()
            .expect("host has not started a module yet")
    }

    pub fn compiled_len(&self) -> Option<usize> {
        *self.inner.compiled_len.lock().unwrap()
    }

    pub fn fire_ready(&self) {
        self.descriptor().signal_ready();
    }

    /// Register and immediately satisfy the startup data dependencies.
    pub fn satisfy_initial_data(&self) {
        let module = self.module();
        module.add_run_dependencies(1);
        module.settle_run_dependency();
    }
}

impl ModuleHost for FakeHost {
    fn compile(&self, bytes: Vec<u8>) -> BoxFuture<'static, Result<CompiledModule, EngineError>> {
        let inner = Arc::clone(&self.inner);
        async move {
            if inner.fail_compile {
                return Err(EngineError::new("compile refused"));
            }
            *inner.compiled_len.lock().unwrap() = Some(bytes.len());
            Ok(CompiledModule::new(bytes))
        }
        .boxed()
    }

    fn start(
        &self,
        descriptor: Arc<ModuleDescriptor>,
    ) -> BoxFuture<'static, Result<Arc<dyn RuntimeModule>, EngineError>> {
        let inner = Arc::clone(&self.inner);
        async move {
            if inner.fail_start {
                return Err(EngineError::new("startup refused"));
            }
            // Startup pulls the compiled module through the descriptor,
            // like the real engine does.
            let _compiled = descriptor
                .request_instantiation()
                .ok_or_else(|| EngineError::new("no instantiation hook configured"))?
                .await?;

            let module = FakeModule::new(Arc::clone(&descriptor));
            *inner.module.lock().unwrap() = Some(Arc::clone(&module));
            *inner.descriptor.lock().unwrap() = Some(Arc::clone(&descriptor));

            if !inner.manual_signals {
                module.add_run_dependencies(1);
                module.settle_run_dependency();
                descriptor.signal_ready();
            }
            let module: Arc<dyn RuntimeModule> = module;
            Ok(module)
        }
        .boxed()
    }

    fn supports_sync_dynlib_instantiation(&self) -> bool {
        self.inner.supports_sync
    }
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Wiremock helpers
// ---------------------------------------------------------------------------

use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pyrite_loader::{RuntimeHandle, RuntimeOptions, initialize_runtime};

pub fn base_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}/", server.uri())).unwrap()
}

/// Serve the binary module and a dependency manifest at the base location.
pub async fn mock_runtime_base(server: &MockServer, manifest: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/runtime.wasm"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\0asm-module".to_vec()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/packages.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(manifest))
        .mount(server)
        .await;
}

/// Serve a default-channel package asset.
pub async fn mock_package(server: &MockServer, name: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{name}.pkg")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("payload:{name}").into_bytes()))
        .mount(server)
        .await;
}

/// Bootstrap against the mock server with default options.
pub async fn boot(host: &FakeHost, server: &MockServer) -> RuntimeHandle {
    initialize_runtime(
        base_url(server),
        Arc::new(host.clone()),
        RuntimeOptions::default(),
    )
    .await
    .expect("bootstrap failed")
}
