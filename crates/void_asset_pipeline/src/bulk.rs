//! Background bulk compile
//!
//! A bulk compile takes immutable job snapshots built on the owning thread,
//! runs the compilers on a worker thread and sends the artifact list back
//! over a channel. The worker never touches metadata or the cache; results
//! are committed by `AssetCompiler::finish_bulk_compile` on the owning
//! thread.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use crossbeam_channel::{Receiver, TryRecvError};
use parking_lot::Mutex;
use void_asset::files::source_modified_time;
use void_asset::{AssetKind, AssetMeta, BuildTarget, Guid, ImportSettings};

use crate::compilable::{compiler_for, CompileContext};
use crate::error::{PipelineError, Result};

/// Snapshot of one compile
#[derive(Debug, Clone)]
pub struct CompileJob {
    pub guid: Guid,
    /// Canonical source path
    pub source: PathBuf,
    pub kind: AssetKind,
    pub import: ImportSettings,
    pub target: BuildTarget,
    pub output: PathBuf,
}

/// Output of a successful compile job
#[derive(Debug, Clone)]
pub struct CompiledArtifact {
    pub guid: Guid,
    pub source: PathBuf,
    pub kind: AssetKind,
    /// Import settings as recorded by the compiler
    pub import: ImportSettings,
    pub target: BuildTarget,
    pub compiled: PathBuf,
    /// Source fingerprint taken before compiling
    pub source_modified: SystemTime,
}

/// Run one job on the current thread
pub fn run_job(job: &CompileJob) -> Result<CompiledArtifact> {
    let compiler = compiler_for(job.kind, &job.import)
        .ok_or_else(|| PipelineError::UnsupportedExtension(job.source.clone()))?;

    // Taken first so an edit racing the compile leaves the record stale
    let source_modified = source_modified_time(&job.source).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PipelineError::SourceMissing(job.source.clone())
        } else {
            PipelineError::io(&job.source, e)
        }
    })?;

    let ctx = CompileContext {
        source: &job.source,
        output: &job.output,
        target: job.target,
    };
    let compiled = compiler.compile_to_resource(&ctx)?;

    let produced = std::fs::metadata(&compiled).map(|m| m.is_file() && m.len() > 0);
    if compiled.as_os_str().is_empty() || !produced.unwrap_or(false) {
        return Err(PipelineError::EmptyOutput(job.source.clone()));
    }

    let mut scratch = AssetMeta::new(job.guid, job.kind, &job.source);
    scratch.import = job.import.clone();
    compiler.extend_meta(&mut scratch);

    Ok(CompiledArtifact {
        guid: job.guid,
        source: job.source.clone(),
        kind: job.kind,
        import: scratch.import,
        target: job.target,
        compiled,
        source_modified,
    })
}

/// Progress shared between a bulk task and its worker
#[derive(Debug, Default)]
pub struct BulkProgress {
    finished_jobs: AtomicUsize,
    done: AtomicBool,
    cancelled: AtomicBool,
    failures: Mutex<Vec<(PathBuf, String)>>,
}

impl BulkProgress {
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

/// Handle to a running bulk compile.
///
/// Dropping the task cancels it: the worker finishes the job it is on,
/// skips the rest and exits. Artifacts already written stay on disk but are
/// never recorded.
pub struct BulkCompileTask {
    target: BuildTarget,
    total: usize,
    progress: Arc<BulkProgress>,
    rx: Receiver<Vec<CompiledArtifact>>,
    thread: Option<JoinHandle<()>>,
}

impl BulkCompileTask {
    /// Start compiling `jobs` on a worker thread
    pub fn spawn(jobs: Vec<CompileJob>, target: BuildTarget) -> Result<Self> {
        let total = jobs.len();
        let progress = Arc::new(BulkProgress::default());
        let (tx, rx) = crossbeam_channel::bounded(1);

        let worker_progress = Arc::clone(&progress);
        let thread = thread::Builder::new()
            .name(format!("asset-bulk-{}", target))
            .spawn(move || {
                let artifacts = Self::compile_loop(&jobs, &worker_progress);
                worker_progress.done.store(true, Ordering::Release);
                // Receiver gone means the task was abandoned
                let _ = tx.send(artifacts);
            })
            .map_err(|e| PipelineError::io("asset-bulk thread", e))?;

        log::info!("Bulk {} compile started ({} assets)", target, total);

        Ok(Self {
            target,
            total,
            progress,
            rx,
            thread: Some(thread),
        })
    }

    fn compile_loop(jobs: &[CompileJob], progress: &BulkProgress) -> Vec<CompiledArtifact> {
        let mut artifacts = Vec::with_capacity(jobs.len());

        for job in jobs {
            if progress.cancelled.load(Ordering::Acquire) {
                log::info!(
                    "Bulk compile cancelled after {}/{} assets",
                    progress.finished_jobs.load(Ordering::Acquire),
                    jobs.len()
                );
                break;
            }
            match run_job(job) {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => {
                    log::error!("Failed to compile {:?}: {}", job.source, e);
                    progress.failures.lock().push((job.source.clone(), e.to_string()));
                }
            }
            progress.finished_jobs.fetch_add(1, Ordering::AcqRel);
        }

        artifacts
    }

    pub fn target(&self) -> BuildTarget {
        self.target
    }

    /// Jobs finished so far, failed ones included
    pub fn num_compiled_assets(&self) -> usize {
        self.progress.finished_jobs.load(Ordering::Acquire)
    }

    pub fn total_assets(&self) -> usize {
        self.total
    }

    pub fn is_compiling(&self) -> bool {
        !self.progress.is_done()
    }

    pub fn finished_compiling(&self) -> bool {
        self.progress.is_done()
    }

    /// Sources that failed, with the error message
    pub fn failures(&self) -> Vec<(PathBuf, String)> {
        self.progress.failures.lock().clone()
    }

    /// Stop after the job in progress. The result will be empty of the
    /// skipped jobs.
    pub fn cancel(&self) {
        self.progress.cancelled.store(true, Ordering::Release);
    }

    pub(crate) fn progress(&self) -> Weak<BulkProgress> {
        Arc::downgrade(&self.progress)
    }

    /// Artifacts, once the worker is done. Returns `None` while compiling
    /// and after the result was taken.
    pub fn try_take(&mut self) -> Option<Vec<CompiledArtifact>> {
        match self.rx.try_recv() {
            Ok(artifacts) => {
                self.join();
                Some(artifacts)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.join();
                None
            }
        }
    }

    /// Block until the worker is done
    pub fn wait(mut self) -> Vec<CompiledArtifact> {
        let artifacts = match self.rx.recv() {
            Ok(artifacts) => artifacts,
            Err(_) => {
                log::error!("Bulk {} compile worker exited without a result", self.target);
                Vec::new()
            }
        };
        self.join();
        artifacts
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Bulk {} compile worker panicked", self.target);
            }
        }
    }
}

impl Drop for BulkCompileTask {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn material_job(dir: &std::path::Path, name: &str, body: &str) -> CompileJob {
        let source = dir.join(format!("{}.mat", name));
        fs::write(&source, body).unwrap();
        CompileJob {
            guid: Guid::generate(),
            output: source.with_extension("material"),
            source,
            kind: AssetKind::Material,
            import: ImportSettings::Base,
            target: BuildTarget::Desktop,
        }
    }

    #[test]
    fn test_run_job_reports_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let job = material_job(dir.path(), "wood", r#"{ "name": "wood" }"#);

        let artifact = run_job(&job).unwrap();
        assert_eq!(artifact.guid, job.guid);
        assert_eq!(artifact.compiled, job.output);
        assert!(artifact.compiled.is_file());
    }

    #[test]
    fn test_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let job = material_job(dir.path(), "gone", "{}");
        fs::remove_file(&job.source).unwrap();

        assert!(matches!(run_job(&job), Err(PipelineError::SourceMissing(_))));
    }

    #[test]
    fn test_bulk_progress_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = vec![
            material_job(dir.path(), "a", "{}"),
            material_job(dir.path(), "b", "not json"),
            material_job(dir.path(), "c", r#"{ "metallic": 1.0 }"#),
        ];

        let task = BulkCompileTask::spawn(jobs, BuildTarget::Desktop).unwrap();
        assert_eq!(task.total_assets(), 3);

        while task.is_compiling() {
            thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(task.num_compiled_assets(), 3);
        assert_eq!(task.failures().len(), 1);
        assert_eq!(task.failures()[0].0, dir.path().join("b.mat"));

        let artifacts = task.wait();
        assert_eq!(artifacts.len(), 2);
    }

    #[test]
    fn test_cancelled_loop_skips_remaining_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = vec![material_job(dir.path(), "a", "{}"), material_job(dir.path(), "b", "{}")];
        let progress = BulkProgress::default();
        progress.cancelled.store(true, Ordering::Release);

        let artifacts = BulkCompileTask::compile_loop(&jobs, &progress);
        assert!(artifacts.is_empty());
        assert_eq!(progress.finished_jobs.load(Ordering::Acquire), 0);
        assert!(!dir.path().join("a.material").exists());
    }

    #[test]
    fn test_dropped_task_worker_exits() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = (0..64)
            .map(|i| material_job(dir.path(), &format!("m{}", i), "{}"))
            .collect();
        let task = BulkCompileTask::spawn(jobs, BuildTarget::Desktop).unwrap();
        let progress = task.progress();
        drop(task);

        // The worker holds the last strong reference until it returns
        while progress.upgrade().is_some() {
            thread::sleep(std::time::Duration::from_millis(5));
        }
    }

    #[test]
    fn test_try_take_after_completion() {
        let dir = tempfile::tempdir().unwrap();
        let mut task =
            BulkCompileTask::spawn(vec![material_job(dir.path(), "a", "{}")], BuildTarget::Desktop).unwrap();

        let artifacts = loop {
            if let Some(artifacts) = task.try_take() {
                break artifacts;
            }
            thread::sleep(std::time::Duration::from_millis(5));
        };
        assert_eq!(artifacts.len(), 1);
        assert!(task.finished_compiling());
        assert_eq!(task.num_compiled_assets(), 1);
        assert!(task.failures().is_empty());
        assert!(task.try_take().is_none());
    }
}
