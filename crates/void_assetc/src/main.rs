//! Void asset compiler
//!
//! Command-line front end for `void_asset_pipeline`: compiles single assets,
//! runs whole-tree desktop or Android builds, cleans orphaned sidecars and
//! watches the asset root for changes.
//!
//! Run with: cargo run -p void_assetc -- --root Resources build

mod args;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use void_asset_pipeline::{AssetPipeline, CompileOptions, CompileOutcome, PipelineConfig, PipelineError};

use crate::args::{Args, Command, USAGE};

const WATCH_INTERVAL: Duration = Duration::from_millis(50);
const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}\n\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };

    if args.command == Command::Help {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(config, args.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<PipelineConfig, PipelineError> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = PipelineConfig::load_from_file(path)?;
            config.apply_env();
            config
        }
        None => PipelineConfig::load(),
    };
    if let Some(root) = &args.root {
        config.asset_root = root.clone();
    }

    // Only `watch` keeps the tree in step; the other commands do exactly what was asked
    let watching = args.command == Command::Watch;
    config.hot_reload = watching;
    config.compile_on_initialize = watching;
    Ok(config)
}

/// Run one command. `Ok(false)` means it ran but some asset failed.
fn run(config: PipelineConfig, command: Command) -> Result<bool, PipelineError> {
    let mut pipeline = AssetPipeline::new(config);
    let scan = pipeline.initialize()?;
    log::info!(
        "Scanned {:?}: {} registered, {} compiled, {} failed",
        pipeline.config().asset_root,
        scan.registered,
        scan.compiled,
        scan.failed
    );

    match command {
        Command::Compile { paths, force, android } => {
            let mut options = if android {
                CompileOptions::android()
            } else {
                CompileOptions::desktop()
            };
            if force {
                options = options.forced();
            }
            compile(&mut pipeline, &paths, options)
        }
        Command::Build { android } => build(&mut pipeline, android),
        Command::Clean => {
            let removed = pipeline.cleanup_orphans()?;
            for meta in &removed {
                println!("removed {}", meta.display());
            }
            log::info!("Removed {} orphaned sidecars", removed.len());
            Ok(true)
        }
        Command::Info { path } => Ok(info(&pipeline, &path)),
        Command::Watch => watch(&mut pipeline),
        Command::Help => Ok(true),
    }
}

fn compile(pipeline: &mut AssetPipeline, paths: &[PathBuf], options: CompileOptions) -> Result<bool, PipelineError> {
    let mut ok = true;
    for path in paths {
        match pipeline.compile_asset(path, options) {
            Ok(CompileOutcome::Compiled(guid)) => println!("compiled   {} {}", guid, path.display()),
            Ok(CompileOutcome::UpToDate(guid)) => println!("up to date {} {}", guid, path.display()),
            Err(e) => {
                log::error!("{}", e);
                ok = false;
            }
        }
    }
    Ok(ok)
}

fn build(pipeline: &mut AssetPipeline, android: bool) -> Result<bool, PipelineError> {
    if android {
        pipeline.compile_all_assets_for_android()?;
    } else {
        pipeline.compile_all_assets_for_desktop()?;
    }

    let mut failures = Vec::new();
    let mut last_reported = usize::MAX;
    while let Some(task) = pipeline.bulk_compile() {
        let done = task.num_compiled_assets();
        if done != last_reported {
            log::info!("Compiled {}/{} {} assets", done, task.total_assets(), task.target());
            last_reported = done;
        }
        if task.finished_compiling() {
            failures = task.failures();
            break;
        }
        thread::sleep(PROGRESS_INTERVAL);
    }

    let committed = pipeline.wait_for_bulk_compile()?.unwrap_or(0);
    for (source, error) in &failures {
        log::error!("{}: {}", source.display(), error);
    }
    println!("{} assets compiled, {} failed", committed, failures.len());
    Ok(failures.is_empty())
}

fn info(pipeline: &AssetPipeline, path: &Path) -> bool {
    let compiler = pipeline.compiler();
    let Some(meta) = compiler.guid_for_path(path).and_then(|guid| compiler.asset_meta(guid)) else {
        println!("{} has no compiled record", path.display());
        return false;
    };

    println!("guid:     {}", meta.guid);
    println!("kind:     {}", meta.kind);
    println!("source:   {}", meta.source.display());
    println!("revision: {}", meta.revision);
    if let Some(compiled) = &meta.compiled {
        println!("desktop:  {}", compiled.display());
    }
    if let Some(compiled) = &meta.android_compiled {
        println!("android:  {}", compiled.display());
    }
    true
}

fn watch(pipeline: &mut AssetPipeline) -> Result<bool, PipelineError> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst)) {
        log::warn!("Could not install Ctrl-C handler: {}", e);
    }

    log::info!("Watching {:?}; press Ctrl-C to stop", pipeline.config().asset_root);
    while running.load(Ordering::SeqCst) {
        let report = pipeline.tick()?;
        if report.handled > 0 {
            log::debug!("Handled {} change events", report.handled);
        }
        thread::sleep(WATCH_INTERVAL);
    }

    pipeline.shutdown();
    Ok(true)
}
