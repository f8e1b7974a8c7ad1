//! Asset pipeline context
//!
//! Owns the compiler, the resource cache, the optional file watcher and the
//! running bulk compile. The host constructs one per process, calls
//! [`AssetPipeline::initialize`] once, and [`AssetPipeline::tick`] from its
//! main loop.

use std::path::{Path, PathBuf};

use void_asset::{BuildTarget, Guid, Handle, Loadable, ResourceCache, ResourceIdentity, TextureImport};

use crate::bulk::BulkCompileTask;
use crate::compiler::{AssetCompiler, CompileOptions, CompileOutcome, ScanReport};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::payloads::{Font, MaterialSource};
use crate::queue::ChangeKind;
use crate::watcher::FileWatcher;

/// Work done by one [`AssetPipeline::tick`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Change events pushed by the watcher
    pub watched: usize,
    /// Queued events acted on
    pub handled: usize,
    /// Records committed from a finished bulk compile
    pub bulk_committed: Option<usize>,
}

/// Process-wide asset pipeline
pub struct AssetPipeline {
    compiler: AssetCompiler,
    cache: ResourceCache,
    watcher: Option<FileWatcher>,
    bulk: Option<BulkCompileTask>,
    initialized: bool,
}

impl AssetPipeline {
    /// Create a pipeline. Relative roots and asset paths are resolved
    /// against the working directory so they match the absolute paths the
    /// watcher reports.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            compiler: AssetCompiler::new(config),
            cache: ResourceCache::new(),
            watcher: None,
            bulk: None,
            initialized: false,
        }
    }

    /// Scan the asset tree and start the watcher when hot-reload is enabled
    pub fn initialize(&mut self) -> Result<ScanReport> {
        if self.initialized {
            log::warn!("Asset pipeline already initialized");
            return Ok(ScanReport::default());
        }

        let report = self.compiler.initialize(Some(&self.cache))?;

        if self.compiler.config().hot_reload {
            match self.start_watcher() {
                Ok(watcher) => {
                    self.watcher = Some(watcher);
                    log::info!("Asset pipeline started with hot-reload");
                }
                Err(e) => log::warn!("Hot-reload unavailable: {}", e),
            }
        } else {
            log::info!("Asset pipeline started (hot-reload disabled)");
        }

        self.initialized = true;
        Ok(report)
    }

    fn start_watcher(&self) -> Result<FileWatcher> {
        let mut watcher = FileWatcher::new()?;
        watcher.watch(&self.compiler.config().asset_root)?;
        Ok(watcher)
    }

    /// Stop watching, abandon any bulk compile and drop resident resources
    pub fn shutdown(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.unwatch_all();
        }
        if self.bulk.take().is_some() {
            log::warn!("Abandoning running bulk compile");
        }
        self.cache.clear();
        self.initialized = false;
        log::info!("Asset pipeline shut down");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(PipelineError::NotInitialized)
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        self.compiler.config()
    }

    pub fn compiler(&self) -> &AssetCompiler {
        &self.compiler
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn compile_asset(&mut self, path: impl AsRef<Path>, options: CompileOptions) -> Result<CompileOutcome> {
        self.ensure_initialized()?;
        self.compiler.compile_asset(Some(&self.cache), path.as_ref(), options)
    }

    pub fn compile_texture(
        &mut self,
        path: impl AsRef<Path>,
        import: TextureImport,
        options: CompileOptions,
    ) -> Result<Guid> {
        self.ensure_initialized()?;
        self.compiler.compile_texture(Some(&self.cache), path.as_ref(), import, options)
    }

    pub fn compile_updated_material(
        &mut self,
        path: impl AsRef<Path>,
        material: &MaterialSource,
    ) -> Result<CompileOutcome> {
        self.ensure_initialized()?;
        self.compiler
            .compile_updated_material(Some(&self.cache), path.as_ref(), material, CompileOptions::desktop())
    }

    /// Shared handle to a resource, compiling and loading it on first use
    pub fn get_resource<T: Loadable>(&mut self, identity: impl Into<ResourceIdentity>) -> Result<Option<Handle<T>>> {
        self.ensure_initialized()?;
        Ok(self.cache.get_resource(&mut self.compiler, identity))
    }

    /// Reload a resource in place; the handle stays the same
    pub fn reload_resource<T: Loadable>(
        &mut self,
        identity: impl Into<ResourceIdentity>,
    ) -> Result<Option<Handle<T>>> {
        self.ensure_initialized()?;
        Ok(self.cache.reload_resource(&mut self.compiler, identity))
    }

    /// Font at a pixel size; each size is its own resident resource
    pub fn get_font_resource(
        &mut self,
        identity: impl Into<ResourceIdentity>,
        size: u32,
        reload: bool,
    ) -> Result<Option<Handle<Font>>> {
        self.ensure_initialized()?;
        Ok(self.cache.get_sized_resource(&mut self.compiler, identity, size, reload))
    }

    pub fn unload_asset(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        self.ensure_initialized()?;
        Ok(self.compiler.unload_asset(&self.cache, path.as_ref()))
    }

    pub fn is_resource_loaded(&self, guid: Guid) -> Result<bool> {
        self.ensure_initialized()?;
        Ok(self.cache.is_resource_loaded(guid))
    }

    /// Queue a change as if the watcher had seen it
    pub fn add_change_event(&mut self, kind: ChangeKind, path: impl Into<PathBuf>) -> Result<()> {
        self.ensure_initialized()?;
        self.compiler.add_to_event_queue(kind, path);
        Ok(())
    }

    /// Poll the watcher, run the change queue, and commit a finished bulk compile
    pub fn tick(&mut self) -> Result<TickReport> {
        self.ensure_initialized()?;
        let mut report = TickReport::default();

        if let Some(watcher) = self.watcher.as_mut() {
            report.watched = watcher.poll_into(self.compiler.change_queue_mut());
        }

        report.handled = self.compiler.run_event_queue(&self.cache);

        if let Some(artifacts) = self.bulk.as_mut().and_then(BulkCompileTask::try_take) {
            self.bulk = None;
            report.bulk_committed = Some(self.compiler.finish_bulk_compile(Some(&self.cache), artifacts));
        }

        Ok(report)
    }

    pub fn compile_all_assets_for_desktop(&mut self) -> Result<()> {
        self.compile_all_assets(BuildTarget::Desktop)
    }

    pub fn compile_all_assets_for_android(&mut self) -> Result<()> {
        self.compile_all_assets(BuildTarget::Android)
    }

    fn compile_all_assets(&mut self, target: BuildTarget) -> Result<()> {
        self.ensure_initialized()?;
        if self.bulk.is_some() {
            return Err(PipelineError::BulkCompileInProgress);
        }
        self.bulk = Some(self.compiler.compile_all_assets(target)?);
        Ok(())
    }

    /// The running bulk compile, if any
    pub fn bulk_compile(&self) -> Option<&BulkCompileTask> {
        self.bulk.as_ref()
    }

    /// Block until the running bulk compile is done and commit it. Returns
    /// the number of committed records, or `None` when nothing was running.
    pub fn wait_for_bulk_compile(&mut self) -> Result<Option<usize>> {
        self.ensure_initialized()?;
        let Some(task) = self.bulk.take() else {
            return Ok(None);
        };
        let artifacts = task.wait();
        Ok(Some(self.compiler.finish_bulk_compile(Some(&self.cache), artifacts)))
    }

    /// Delete sidecars (and their artifacts) whose source is gone
    pub fn cleanup_orphans(&mut self) -> Result<Vec<PathBuf>> {
        self.ensure_initialized()?;
        self.compiler.cleanup_orphans()
    }
}

impl Drop for AssetPipeline {
    fn drop(&mut self) {
        if self.initialized {
            self.shutdown();
        }
    }
}
