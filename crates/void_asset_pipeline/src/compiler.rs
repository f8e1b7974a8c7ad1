//! Asset compiler
//!
//! Turns source assets into compiled artifacts and keeps their metadata in
//! step: GUID lookup, staleness decisions, sidecar persistence, and
//! hot-reload of resident resources after a rebuild. It also reconciles
//! deletions reported by the change queue.
//!
//! The compiler is driven from one thread. Compiles are synchronous except
//! for bulk compiles, which run on a worker and are committed back through
//! [`AssetCompiler::finish_bulk_compile`].

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Weak;
use std::time::SystemTime;

use void_asset::files::{absolute_path, artifact_claimants, collect_files, remove_file_if_exists};
use void_asset::kind::{
    canonical_asset_path, desktop_compiled_path, is_meta_file, lowercase_extension, shader_stage_sources,
    source_exists,
};
use void_asset::{
    AssetKind, AssetMeta, BuildTarget, Guid, IdentityStatus, ImportSettings, MetaFiles, ResourceCache,
    ResourceIdentity, ResourceLocation, ResourceLocator, TextureImport, CURRENT_METADATA_VERSION,
};

use crate::bulk::{run_job, BulkCompileTask, BulkProgress, CompileJob, CompiledArtifact};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::paths::compiled_path_for;
use crate::payloads::MaterialSource;
use crate::queue::{ChangeKind, ChangeQueue};

/// Options for one compile request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Compile even when the record is current
    pub force: bool,
    pub target: BuildTarget,
}

impl CompileOptions {
    pub fn desktop() -> Self {
        Self::default()
    }

    pub fn android() -> Self {
        Self {
            force: false,
            target: BuildTarget::Android,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// What a successful `compile_asset` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileOutcome {
    /// The artifact was rebuilt
    Compiled(Guid),
    /// Record and artifact were current; nothing ran
    UpToDate(Guid),
}

impl CompileOutcome {
    pub fn guid(self) -> Guid {
        match self {
            CompileOutcome::Compiled(guid) | CompileOutcome::UpToDate(guid) => guid,
        }
    }

    pub fn did_compile(self) -> bool {
        matches!(self, CompileOutcome::Compiled(_))
    }
}

/// Result of scanning the asset root at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Assets whose record was current and was registered as is
    pub registered: usize,
    pub compiled: usize,
    pub failed: usize,
}

/// True for extensions the compiler accepts as sources
pub fn is_supported_source(path: &Path) -> bool {
    AssetKind::from_source_path(path).is_some()
}

/// True for compiled artifact extensions
pub fn is_compiled_resource(path: &Path) -> bool {
    AssetKind::from_compiled_path(path).is_some()
}

/// Kind and canonical path of a source path.
///
/// An extensionless path names a shader program when a stage file exists.
fn classify(path: &Path) -> Result<(AssetKind, PathBuf)> {
    if let Some(kind) = AssetKind::from_source_path(path) {
        return Ok((kind, canonical_asset_path(path, kind)));
    }
    if lowercase_extension(path).is_none() && !shader_stage_sources(path).is_empty() {
        return Ok((AssetKind::Shader, path.to_path_buf()));
    }
    Err(PipelineError::UnsupportedExtension(path.to_path_buf()))
}

/// Compiles source assets and owns their metadata records
pub struct AssetCompiler {
    config: PipelineConfig,
    metas: MetaFiles,
    records: HashMap<Guid, AssetMeta>,
    queue: ChangeQueue,
    bulk: Option<Weak<BulkProgress>>,
    compile_count: u64,
}

impl AssetCompiler {
    /// Create a compiler. Roots are made absolute here, and so is every path
    /// handed to a public method, so one asset never has two spellings.
    pub fn new(mut config: PipelineConfig) -> Self {
        config.asset_root = absolute_path(&config.asset_root);
        config.android_root = absolute_path(&config.android_root);
        let queue = ChangeQueue::with_debounce(config.debounce());
        Self {
            config,
            metas: MetaFiles::new(),
            records: HashMap::new(),
            queue,
            bulk: None,
            compile_count: 0,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn metas(&self) -> &MetaFiles {
        &self.metas
    }

    pub fn change_queue(&self) -> &ChangeQueue {
        &self.queue
    }

    pub fn change_queue_mut(&mut self) -> &mut ChangeQueue {
        &mut self.queue
    }

    /// Number of compiler runs since construction
    pub fn compile_count(&self) -> u64 {
        self.compile_count
    }

    /// Scan the asset root: register current records and compile the rest
    pub fn initialize(&mut self, cache: Option<&ResourceCache>) -> Result<ScanReport> {
        let root = self.config.asset_root.clone();
        fs::create_dir_all(&root).map_err(|e| PipelineError::io(&root, e))?;

        let mut report = ScanReport::default();
        for (kind, canonical) in self.source_assets()? {
            if let Err(e) = self.check_artifact_owner(kind, &canonical) {
                log::error!("{}", e);
                report.failed += 1;
                continue;
            }
            let lookup = match self.metas.guid_for(&canonical) {
                Ok(lookup) => lookup,
                Err(e) => {
                    log::error!("Failed to read metadata for {:?}: {}", canonical, e);
                    report.failed += 1;
                    continue;
                }
            };

            let current = lookup.status == IdentityStatus::Current
                && lookup.meta.as_ref().is_some_and(|m| m.has_artifact(BuildTarget::Desktop));
            if current {
                if let Some(meta) = lookup.meta {
                    self.records.insert(lookup.guid, meta);
                }
                report.registered += 1;
                continue;
            }

            if !self.config.compile_on_initialize {
                log::debug!("Deferring compile of {} {:?}", kind, canonical);
                continue;
            }

            match self.compile_asset(cache, &canonical, CompileOptions::desktop()) {
                Ok(_) => report.compiled += 1,
                Err(e) => {
                    log::error!("Failed to compile {:?}: {}", canonical, e);
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "Asset scan of {:?}: {} registered, {} compiled, {} failed",
            root,
            report.registered,
            report.compiled,
            report.failed
        );
        Ok(report)
    }

    /// Every compilable source under the asset root, by canonical path
    fn source_assets(&self) -> Result<Vec<(AssetKind, PathBuf)>> {
        let root = &self.config.asset_root;
        let files = collect_files(root).map_err(|e| PipelineError::io(root, e))?;

        let assets: BTreeSet<(PathBuf, AssetKind)> = files
            .iter()
            .filter_map(|path| classify(path).ok())
            .map(|(kind, canonical)| (canonical, kind))
            .collect();

        Ok(assets.into_iter().map(|(canonical, kind)| (kind, canonical)).collect())
    }

    /// Compile one source asset.
    ///
    /// Without `force`, an asset whose artifact for the target exists and
    /// was built from the current source is left alone. On success the
    /// record is persisted before any resident resource is hot-reloaded. On
    /// failure the record is untouched.
    pub fn compile_asset(
        &mut self,
        cache: Option<&ResourceCache>,
        path: &Path,
        options: CompileOptions,
    ) -> Result<CompileOutcome> {
        let path = absolute_path(path);
        let (kind, canonical) = classify(&path)?;
        if !source_exists(&canonical) {
            return Err(PipelineError::SourceMissing(path));
        }
        self.check_artifact_owner(kind, &canonical)?;

        let lookup = self.metas.guid_for(&canonical)?;
        let guid = lookup.guid;
        let base = self.records.get(&guid).cloned().or(lookup.meta);

        if !options.force && lookup.status != IdentityStatus::New {
            match base {
                Some(ref meta)
                    if meta.has_artifact(options.target)
                        && !MetaFiles::is_record_stale_for(meta, &canonical, options.target) =>
                {
                    self.records.entry(guid).or_insert_with(|| meta.clone());
                    log::debug!("{} {:?} is up to date", kind, canonical);
                    return Ok(CompileOutcome::UpToDate(guid));
                }
                _ => log::debug!(
                    "{} artifact of {:?} is missing or stale; recompiling",
                    options.target,
                    canonical
                ),
            }
        }

        let import = Self::import_for(kind, base.as_ref());
        self.compile_with(cache, guid, kind, &canonical, import, options.target, base)?;
        Ok(CompileOutcome::Compiled(guid))
    }

    /// Recompile a texture with explicit import settings
    pub fn compile_texture(
        &mut self,
        cache: Option<&ResourceCache>,
        path: &Path,
        import: TextureImport,
        options: CompileOptions,
    ) -> Result<Guid> {
        let path = absolute_path(path);
        let (kind, canonical) = classify(&path)?;
        if kind != AssetKind::Texture {
            return Err(PipelineError::unsupported(&path, format!("{} is not a texture", kind)));
        }
        if !canonical.is_file() {
            return Err(PipelineError::SourceMissing(path));
        }
        self.check_artifact_owner(kind, &canonical)?;

        let lookup = self.metas.guid_for(&canonical)?;
        let base = self.records.get(&lookup.guid).cloned().or(lookup.meta);
        self.compile_with(
            cache,
            lookup.guid,
            kind,
            &canonical,
            ImportSettings::Texture(import),
            options.target,
            base,
        )?;
        Ok(lookup.guid)
    }

    /// Save an edited material source and recompile it
    pub fn compile_updated_material(
        &mut self,
        cache: Option<&ResourceCache>,
        path: &Path,
        material: &MaterialSource,
        options: CompileOptions,
    ) -> Result<CompileOutcome> {
        if AssetKind::from_source_path(path) != Some(AssetKind::Material) {
            return Err(PipelineError::unsupported(path, "not a material source"));
        }
        material.save(path)?;
        self.compile_asset(cache, path, options.forced())
    }

    /// Refuse a source whose desktop artifact another source already builds.
    ///
    /// The claimant whose record names the artifact keeps it; with no record
    /// the first claimant in path order does.
    fn check_artifact_owner(&self, kind: AssetKind, canonical: &Path) -> Result<()> {
        let claimants = artifact_claimants(canonical, kind).map_err(|e| PipelineError::io(canonical, e))?;
        if claimants.len() < 2 {
            return Ok(());
        }

        let artifact = desktop_compiled_path(canonical, kind);
        let recorded = claimants.iter().find(|claimant| {
            let record = self
                .guid_by_source(claimant)
                .and_then(|guid| self.records.get(&guid).cloned())
                .or_else(|| self.metas.read(claimant).ok().flatten());
            record.is_some_and(|meta| meta.compiled.is_some() && meta.compiled == artifact)
        });

        let owner = recorded.unwrap_or(&claimants[0]);
        if owner == canonical {
            Ok(())
        } else {
            Err(PipelineError::ArtifactCollision {
                path: canonical.to_path_buf(),
                owner: owner.clone(),
            })
        }
    }

    /// Stored import settings when they fit the kind, else the defaults
    fn import_for(kind: AssetKind, base: Option<&AssetMeta>) -> ImportSettings {
        let stored = base.filter(|meta| meta.kind == kind).map(|meta| &meta.import);
        match (kind, stored) {
            (AssetKind::Texture, Some(import @ ImportSettings::Texture(_)))
            | (AssetKind::Model, Some(import @ ImportSettings::Model(_))) => import.clone(),
            _ => ImportSettings::default_for(kind),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn compile_with(
        &mut self,
        cache: Option<&ResourceCache>,
        guid: Guid,
        kind: AssetKind,
        canonical: &Path,
        import: ImportSettings,
        target: BuildTarget,
        base: Option<AssetMeta>,
    ) -> Result<()> {
        let job = self.job_for(guid, kind, canonical, import, target)?;
        self.compile_count += 1;
        let artifact = run_job(&job)?;
        self.commit(cache, artifact, base)
    }

    fn job_for(
        &self,
        guid: Guid,
        kind: AssetKind,
        canonical: &Path,
        import: ImportSettings,
        target: BuildTarget,
    ) -> Result<CompileJob> {
        let output = compiled_path_for(
            target,
            &self.config.asset_root,
            &self.config.android_root,
            canonical,
            kind,
        )
        .ok_or_else(|| PipelineError::UnsupportedExtension(canonical.to_path_buf()))?;

        Ok(CompileJob {
            guid,
            source: canonical.to_path_buf(),
            kind,
            import,
            target,
            output,
        })
    }

    /// Record a finished compile: update, persist, then hot-reload
    fn commit(
        &mut self,
        cache: Option<&ResourceCache>,
        artifact: CompiledArtifact,
        base: Option<AssetMeta>,
    ) -> Result<()> {
        let guid = artifact.guid;
        let mut meta = self
            .records
            .get(&guid)
            .cloned()
            .or(base)
            .filter(|meta| meta.guid == guid)
            .unwrap_or_else(|| AssetMeta::new(guid, artifact.kind, &artifact.source));

        meta.version = CURRENT_METADATA_VERSION;
        meta.kind = artifact.kind;
        meta.source = artifact.source.clone();
        meta.record_compile(artifact.target, artifact.compiled.clone(), artifact.source_modified);
        meta.revision = meta.revision.wrapping_add(1);
        meta.compiled_at = SystemTime::now();
        meta.import = artifact.import;

        self.metas.persist(&meta)?;
        log::info!(
            "Compiled {} {:?} -> {:?} (rev {})",
            meta.kind,
            meta.source,
            artifact.compiled,
            meta.revision
        );
        self.records.insert(guid, meta);

        if artifact.target == BuildTarget::Desktop {
            if let Some(cache) = cache {
                match cache.hot_reload(artifact.kind, guid, &artifact.compiled, &artifact.source) {
                    Ok(true) => log::info!("Hot-reloaded {} {:?}", artifact.kind, artifact.source),
                    Ok(false) => {}
                    Err(e) => log::error!("Hot-reload of {:?} failed: {}", artifact.source, e),
                }
            }
        }
        Ok(())
    }

    /// Snapshot every source under the asset root and compile them on a
    /// worker thread. Only one bulk compile runs at a time.
    pub fn compile_all_assets(&mut self, target: BuildTarget) -> Result<BulkCompileTask> {
        let running = self
            .bulk
            .as_ref()
            .and_then(Weak::upgrade)
            .is_some_and(|progress| !progress.is_done());
        if running {
            return Err(PipelineError::BulkCompileInProgress);
        }

        let mut jobs = Vec::new();
        for (kind, canonical) in self.source_assets()? {
            if let Err(e) = self.check_artifact_owner(kind, &canonical) {
                log::error!("Skipping {:?}: {}", canonical, e);
                continue;
            }
            let lookup = match self.metas.guid_for(&canonical) {
                Ok(lookup) => lookup,
                Err(e) => {
                    log::error!("Skipping {:?}: {}", canonical, e);
                    continue;
                }
            };
            let base = self.records.get(&lookup.guid).or(lookup.meta.as_ref());
            let import = Self::import_for(kind, base);
            jobs.push(self.job_for(lookup.guid, kind, &canonical, import, target)?);
        }

        self.compile_count += jobs.len() as u64;
        let task = BulkCompileTask::spawn(jobs, target)?;
        self.bulk = Some(task.progress());
        Ok(task)
    }

    /// Commit the artifacts of a finished bulk compile. Returns the number
    /// of records written.
    pub fn finish_bulk_compile(&mut self, cache: Option<&ResourceCache>, artifacts: Vec<CompiledArtifact>) -> usize {
        let total = artifacts.len();
        let mut committed = 0;

        for artifact in artifacts {
            let source = artifact.source.clone();
            let base = self.metas.read(&source).ok().flatten();
            match self.commit(cache, artifact, base) {
                Ok(()) => committed += 1,
                Err(e) => log::error!("Failed to record {:?}: {}", source, e),
            }
        }

        self.bulk = None;
        log::info!("Bulk compile committed {}/{} assets", committed, total);
        committed
    }

    /// A sidecar was deleted: remove the artifacts it described.
    ///
    /// The GUID is dropped from memory even when no artifact is found.
    pub fn handle_meta_file_deletion(&mut self, cache: &ResourceCache, meta_path: &Path) -> bool {
        let meta_path = absolute_path(meta_path);
        let source = MetaFiles::source_for_meta(&meta_path);
        let guid = self.metas.forget(&source).or_else(|| self.guid_by_source(&source));
        let record = guid.and_then(|guid| self.records.remove(&guid));

        if let Some(guid) = guid {
            cache.evict(guid);
        }

        let artifacts: Vec<PathBuf> = match &record {
            Some(meta) => [meta.compiled.clone(), meta.android_compiled.clone()]
                .into_iter()
                .flatten()
                .collect(),
            None => classify(&source)
                .ok()
                .and_then(|(kind, canonical)| desktop_compiled_path(&canonical, kind))
                .into_iter()
                .collect(),
        };

        let mut removed = false;
        for artifact in &artifacts {
            match remove_file_if_exists(artifact) {
                Ok(deleted) => removed |= deleted,
                Err(e) => log::error!("Failed to delete {:?}: {}", artifact, e),
            }
        }

        if removed {
            log::info!("Removed artifacts of {:?} after its metadata was deleted", source);
        } else {
            log::warn!("No compiled artifact found for deleted metadata {:?}", meta_path);
        }
        removed
    }

    /// A compiled artifact was deleted: remove the sidecar that points at it.
    ///
    /// An Android artifact only clears the Android path of the record.
    pub fn handle_resource_file_deletion(&mut self, cache: &ResourceCache, resource_path: &Path) -> bool {
        let resource_path = absolute_path(resource_path);
        let resource_path = resource_path.as_path();
        let recorded = self.records.iter().find_map(|(guid, meta)| {
            if meta.compiled.as_deref() == Some(resource_path) {
                Some((*guid, meta.source.clone(), BuildTarget::Desktop))
            } else if meta.android_compiled.as_deref() == Some(resource_path) {
                Some((*guid, meta.source.clone(), BuildTarget::Android))
            } else {
                None
            }
        });

        let (guid, source, target) = match recorded {
            Some(found) => found,
            None => match self.source_for_resource(resource_path) {
                Some(source) => match self.metas.guid_of(&source) {
                    Some(guid) => (guid, source, BuildTarget::Desktop),
                    None => {
                        let removed = self.delete_sidecar(&source);
                        if !removed {
                            log::warn!("No metadata found for deleted resource {:?}", resource_path);
                        }
                        return removed;
                    }
                },
                None => {
                    log::warn!("No source found for deleted resource {:?}", resource_path);
                    return false;
                }
            },
        };

        if target == BuildTarget::Android {
            let Some(meta) = self.records.get_mut(&guid) else {
                return false;
            };
            meta.clear_android();
            let meta = meta.clone();
            return match self.metas.persist(&meta) {
                Ok(()) => true,
                Err(e) => {
                    log::error!("Failed to update metadata for {:?}: {}", source, e);
                    false
                }
            };
        }

        cache.evict(guid);
        self.records.remove(&guid);
        let removed = self.delete_sidecar(&source);
        if removed {
            log::info!("Removed metadata of {:?} after its resource was deleted", source);
        } else {
            log::warn!("No metadata found for deleted resource {:?}", resource_path);
        }
        removed
    }

    fn delete_sidecar(&mut self, source: &Path) -> bool {
        match self.metas.delete(source) {
            Ok(deleted) => deleted,
            Err(e) => {
                log::error!("Failed to delete metadata of {:?}: {}", source, e);
                false
            }
        }
    }

    /// Source whose sidecar sits next to a desktop artifact
    fn source_for_resource(&self, resource_path: &Path) -> Option<PathBuf> {
        let kind = AssetKind::from_compiled_path(resource_path)?;
        let stem = resource_path.with_extension("");

        let mut candidates: Vec<PathBuf> = kind
            .source_extensions()
            .iter()
            .map(|ext| resource_path.with_extension(ext))
            .collect();
        if kind == AssetKind::Shader {
            candidates.insert(0, stem);
        }

        candidates.into_iter().find(|source| self.metas.exists(source))
    }

    /// A source was removed: evict it, delete its artifacts and its sidecar
    pub fn unload_asset(&mut self, cache: &ResourceCache, path: &Path) -> bool {
        let path = absolute_path(path);
        let path = path.as_path();
        let (kind, canonical) = match classify(path) {
            Ok(found) => found,
            Err(_) => match lowercase_extension(path) {
                // A deleted shader stem no longer has stage files to detect
                None => (AssetKind::Shader, path.to_path_buf()),
                Some(_) => {
                    log::warn!("Cannot unload {:?}: unsupported asset type", path);
                    return false;
                }
            },
        };

        let guid = self
            .metas
            .guid_of(&canonical)
            .or_else(|| self.metas.read(&canonical).ok().flatten().map(|m| m.guid));
        let Some(guid) = guid else {
            log::warn!("Cannot unload {:?}: asset is not tracked", canonical);
            return false;
        };

        let record = self
            .records
            .remove(&guid)
            .or_else(|| self.metas.read(&canonical).ok().flatten());

        let compiled = record
            .as_ref()
            .and_then(|meta| meta.compiled.clone())
            .or_else(|| desktop_compiled_path(&canonical, kind));
        if let Some(android) = record.as_ref().and_then(|meta| meta.android_compiled.as_deref()) {
            if let Err(e) = remove_file_if_exists(android) {
                log::error!("Failed to delete {:?}: {}", android, e);
            }
        }

        let ok = match compiled {
            Some(compiled) => {
                cache.unload_resource(guid, &canonical, &compiled, &mut self.metas, BuildTarget::Desktop)
            }
            None => {
                cache.evict(guid);
                self.delete_sidecar(&canonical)
            }
        };
        self.metas.forget(&canonical);
        ok
    }

    /// Queue a file change for the next [`AssetCompiler::run_event_queue`]
    pub fn add_to_event_queue(&mut self, kind: ChangeKind, path: impl Into<PathBuf>) {
        let path: PathBuf = path.into();
        self.queue.push(kind, absolute_path(&path));
    }

    /// Process every queued change. Returns the number acted on.
    pub fn run_event_queue(&mut self, cache: &ResourceCache) -> usize {
        let mut handled = 0;

        for event in self.queue.drain() {
            let path = event.path.as_path();
            let acted = if is_meta_file(path) {
                event.kind.is_removal() && {
                    self.handle_meta_file_deletion(cache, path);
                    true
                }
            } else if is_compiled_resource(path) {
                event.kind.is_removal() && {
                    self.handle_resource_file_deletion(cache, path);
                    true
                }
            } else if is_supported_source(path) {
                if event.kind.is_removal() {
                    self.unload_asset(cache, path);
                } else {
                    let options = CompileOptions {
                        force: event.kind == ChangeKind::Modified,
                        target: BuildTarget::Desktop,
                    };
                    if let Err(e) = self.compile_asset(Some(cache), path, options) {
                        log::error!("Failed to compile {:?} ({}): {}", path, event.kind, e);
                    }
                }
                true
            } else {
                false
            };

            if acted {
                handled += 1;
            } else {
                log::debug!("Ignoring {} {:?}", event.kind, path);
            }
        }

        handled
    }

    /// Delete sidecars under the asset root whose source is gone
    pub fn cleanup_orphans(&mut self) -> Result<Vec<PathBuf>> {
        let removed = self.metas.cleanup_orphans(&self.config.asset_root)?;
        let sources: Vec<PathBuf> = removed.iter().map(|p| MetaFiles::source_for_meta(p)).collect();
        self.records.retain(|_, meta| !sources.contains(&meta.source));
        Ok(removed)
    }

    fn guid_by_source(&self, source: &Path) -> Option<Guid> {
        self.records
            .iter()
            .find(|(_, meta)| meta.source == source)
            .map(|(guid, _)| *guid)
    }

    /// True when the identity has a desktop artifact on disk
    pub fn is_asset_compiled(&self, identity: impl Into<ResourceIdentity>) -> bool {
        let guid = match identity.into() {
            ResourceIdentity::Guid(guid) => Some(guid),
            ResourceIdentity::Path(path) => self.guid_for_path(&path),
        };
        guid.and_then(|guid| self.records.get(&guid))
            .is_some_and(|meta| meta.has_artifact(BuildTarget::Desktop))
    }

    pub fn asset_meta(&self, guid: Guid) -> Option<&AssetMeta> {
        self.records.get(&guid)
    }

    /// Known GUID of a source path (any shader stage file works)
    pub fn guid_for_path(&self, path: &Path) -> Option<Guid> {
        let (_, canonical) = classify(&absolute_path(path)).ok()?;
        self.metas
            .guid_of(&canonical)
            .or_else(|| self.guid_by_source(&canonical))
    }

    pub fn asset_path_from_guid(&self, guid: Guid) -> Option<&Path> {
        self.records
            .get(&guid)
            .map(|meta| meta.source.as_path())
            .or_else(|| self.metas.source_of(guid))
    }

    /// Source of a compiled asset by file name or stem, e.g. `"tex.png"` or `"tex"`
    pub fn asset_path_from_name(&self, name: &str) -> Option<&Path> {
        let mut matches: Vec<&Path> = self
            .records
            .values()
            .map(|meta| meta.source.as_path())
            .filter(|source| {
                source.file_name().is_some_and(|n| n == name) || source.file_stem().is_some_and(|s| s == name)
            })
            .collect();
        matches.sort();
        matches.first().copied()
    }

    pub fn asset_meta_count(&self) -> usize {
        self.records.len()
    }

    fn location_of(&self, guid: Guid) -> Option<ResourceLocation> {
        let meta = self.records.get(&guid)?;
        Some(ResourceLocation {
            guid,
            kind: meta.kind,
            compiled: meta.compiled.clone()?,
            source: meta.source.clone(),
        })
    }

    fn locate_source(&mut self, source: &Path, options: CompileOptions) -> Option<ResourceLocation> {
        match self.compile_asset(None, source, options) {
            Ok(outcome) => self.location_of(outcome.guid()),
            Err(e) => {
                log::error!("Failed to compile {:?}: {}", source, e);
                None
            }
        }
    }
}

impl ResourceLocator for AssetCompiler {
    fn resolve(&mut self, identity: &ResourceIdentity) -> Option<Guid> {
        match identity {
            ResourceIdentity::Guid(guid) => Some(*guid),
            ResourceIdentity::Path(path) => self.guid_for_path(path),
        }
    }

    fn locate(&mut self, identity: &ResourceIdentity) -> Option<ResourceLocation> {
        match identity {
            ResourceIdentity::Guid(guid) => {
                let compiled = self.records.get(guid).is_some_and(|m| m.has_artifact(BuildTarget::Desktop));
                if compiled {
                    return self.location_of(*guid);
                }
                let Some(source) = self.asset_path_from_guid(*guid).map(Path::to_path_buf) else {
                    log::error!("Unknown asset GUID {}", guid);
                    return None;
                };
                self.locate_source(&source, CompileOptions::desktop())
            }
            ResourceIdentity::Path(path) => self.locate_source(path, CompileOptions::desktop()),
        }
    }

    fn recompile(&mut self, location: &ResourceLocation) -> Option<ResourceLocation> {
        self.locate_source(&location.source, CompileOptions::desktop().forced())
    }
}
