//! One-time bootstrap sequencer.
//!
//! `Uninitialized -> CompilingModule -> AwaitingReady -> Ready`: begin
//! asynchronous compilation of the runtime's binary module, run the
//! engine's startup against the shared descriptor, await the
//! module-ready and initial-data signals jointly (their order is not
//! guaranteed), then fetch the dependency manifest, clamp the recursion
//! limit and hand out the narrowed public handle. Any failure along the
//! way aborts the sequence; `Ready` is atomic with respect to the caller.

use std::sync::Arc;

use futures_util::FutureExt;
use url::Url;

use pyrite_config::RuntimeOptions;
use pyrite_fetch::fetch_bytes;
use pyrite_runtime::{CompletionCell, HookAction, ModuleDescriptor, ModuleFeatures, ModuleHost};
use pyrite_types::{BootstrapError, EngineError, MANIFEST_PATH};

use crate::handle::RuntimeHandle;
use crate::queue::PackageLoader;

/// Well-known location of the runtime's binary module, relative to the
/// base location.
pub const RUNTIME_MODULE_PATH: &str = "runtime.wasm";

/// Bootstrap the embedded runtime served from `base_url`.
///
/// Fails if the binary module cannot be fetched or compiled, if the
/// engine's startup errors, or if the manifest fetch fails. There is no
/// retry; the caller re-invokes from scratch.
pub async fn initialize_runtime(
    base_url: Url,
    host: Arc<dyn ModuleHost>,
    options: RuntimeOptions,
) -> Result<RuntimeHandle, BootstrapError> {
    tracing::info!(%base_url, "bootstrapping runtime");

    let module_ready: Arc<CompletionCell<(), EngineError>> = Arc::new(CompletionCell::new());
    let data_ready: Arc<CompletionCell<(), EngineError>> = Arc::new(CompletionCell::new());

    // CompilingModule: fetch + compile run concurrently with the engine
    // startup below; the descriptor's instantiation hook hands the
    // shared in-flight compilation to the engine when it asks.
    let module_url = base_url
        .join(RUNTIME_MODULE_PATH)
        .map_err(|e| BootstrapError::ModuleFetch {
            url: format!("{base_url}{RUNTIME_MODULE_PATH}"),
            message: e.to_string(),
        })?;
    let compilation = {
        let host = Arc::clone(&host);
        let url = module_url.clone();
        async move {
            let bytes = fetch_bytes(&url)
                .await
                .map_err(|e| BootstrapError::ModuleFetch {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            tracing::debug!(len = bytes.len(), "compiling runtime module");
            host.compile(bytes).await.map_err(BootstrapError::Compile)
        }
    }
    .boxed()
    .shared();
    // Drive compilation eagerly rather than waiting for the engine to
    // poll the instantiation hook.
    tokio::spawn({
        let compilation = compilation.clone();
        async move {
            let _ = compilation.await;
        }
    });

    let descriptor = Arc::new(ModuleDescriptor::new(
        ModuleFeatures {
            image_decoding: options.features.image_decoding,
            audio_decoding: options.features.audio_decoding,
            binary_decoding: options.features.binary_decoding,
        },
        default_locate_file(base_url.clone()),
    ));
    descriptor.set_instantiate({
        let compilation = compilation.clone();
        Box::new(move || {
            let compilation = compilation.clone();
            async move {
                compilation
                    .await
                    .map_err(|e| EngineError::new(e.to_string()))
            }
            .boxed()
        })
    });
    descriptor.set_ready_hook({
        let module_ready = Arc::clone(&module_ready);
        Box::new(move || {
            module_ready.fulfill(());
        })
    });
    descriptor.set_run_dependency_hook({
        let data_ready = Arc::clone(&data_ready);
        Box::new(move |pending| {
            if pending == 0 {
                data_ready.fulfill(());
                HookAction::Clear
            } else {
                HookAction::Retain
            }
        })
    });

    let module = match host.start(Arc::clone(&descriptor)).await {
        Ok(module) => module,
        Err(start_error) => {
            // A failed compilation surfaces through the engine aborting
            // its startup; report the underlying cause when we have it.
            return Err(match compilation.peek() {
                Some(Err(e)) => e.clone(),
                _ => BootstrapError::Start(start_error),
            });
        }
    };

    // AwaitingReady: both signals must fire; no ordering between them is
    // assumed.
    tokio::try_join!(module_ready.wait(), data_ready.wait()).map_err(BootstrapError::Engine)?;
    tracing::debug!("runtime module ready, initial data satisfied");

    // Ready: manifest, recursion limit, narrowed public surface.
    let manifest = pyrite_fetch::fetch_manifest(&base_url)
        .await
        .map_err(|e| BootstrapError::Manifest {
            url: base_url
                .join(MANIFEST_PATH)
                .map_or_else(|_| base_url.to_string(), |u| u.to_string()),
            message: e.to_string(),
        })?;
    module
        .set_recursion_limit(options.recursion_limit)
        .map_err(BootstrapError::Engine)?;

    let preload_dynlibs = options
        .preload_dynamic_libraries
        .unwrap_or_else(|| !host.supports_sync_dynlib_instantiation());
    let loader = PackageLoader::new(
        base_url,
        Arc::clone(&module),
        Arc::clone(&descriptor),
        manifest,
        preload_dynlibs,
    );

    tracing::info!(version = %module.version(), "runtime ready");
    Ok(RuntimeHandle::new(module, loader))
}

fn default_locate_file(base: Url) -> pyrite_runtime::LocateFileHook {
    Box::new(move |path| {
        base.join(path)
            .map_or_else(|_| format!("{base}{path}"), |url| url.to_string())
    })
}
