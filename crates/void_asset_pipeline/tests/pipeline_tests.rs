//! Integration tests for void_asset_pipeline

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use image::{Rgba, RgbaImage};
use void_asset::{BuildTarget, MetaFiles};
use void_asset::Loadable;
use void_asset_pipeline::payloads::{Model, Shader, ShaderStage, Texture};
use void_asset_pipeline::*;

const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

const VERT: &str = "#version 450
layout(location = 0) in vec3 a_position;
void main() { gl_Position = vec4(a_position, 1.0); }
";

const FRAG: &str = "#version 450
layout(location = 0) out vec4 o_color;
void main() { o_color = vec4(1.0); }
";

fn config_in(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        asset_root: dir.join("Resources"),
        android_root: dir.join("android/assets"),
        hot_reload: false,
        ..PipelineConfig::default()
    }
}

fn write_png(path: &Path, color: [u8; 4]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbaImage::from_pixel(4, 4, Rgba(color)).save(path).unwrap();
}

/// Push the mtime forward so the edit is seen even on coarse timestamps
fn touch_later(path: &Path) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(10)).unwrap();
}

fn write_font(path: &Path) {
    let mut bytes = vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0, 0, 0, 0, 0, 0];
    for tag in [b"cmap", b"head"] {
        bytes.extend_from_slice(tag);
        bytes.extend_from_slice(&[0u8; 12]);
    }
    fs::write(path, bytes).unwrap();
}

fn started(dir: &Path) -> (AssetPipeline, PathBuf) {
    let config = config_in(dir);
    let root = config.asset_root.clone();
    fs::create_dir_all(&root).unwrap();
    (AssetPipeline::new(config), root)
}

#[test]
fn test_texture_hot_reload_keeps_handle() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let tex = root.join("tex.png");
    write_png(&tex, RED);
    pipeline.initialize().unwrap();

    let guid = pipeline.compiler().guid_for_path(&tex).unwrap();
    assert!(root.join("tex.dds").is_file());

    let handle = pipeline.get_resource::<Texture>(tex.as_path()).unwrap().unwrap();
    assert_eq!(handle.guid(), guid);
    assert_eq!(handle.read().pixel(0, 0), Some(RED));

    write_png(&tex, BLUE);
    touch_later(&tex);
    let outcome = pipeline.compile_asset(&tex, CompileOptions::desktop()).unwrap();
    assert_eq!(outcome, CompileOutcome::Compiled(guid));

    assert_eq!(handle.read().pixel(0, 0), Some(BLUE));
    assert_eq!(handle.generation(), 1);

    let again = pipeline.get_resource::<Texture>(tex.as_path()).unwrap().unwrap();
    assert!(again.ptr_eq(&handle));
}

#[test]
fn test_cache_singularity() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let tex = root.join("tex.png");
    write_png(&tex, RED);
    pipeline.initialize().unwrap();

    let first = pipeline.get_resource::<Texture>(tex.as_path()).unwrap().unwrap();
    let by_guid = pipeline.get_resource::<Texture>(first.guid()).unwrap().unwrap();
    assert!(first.ptr_eq(&by_guid));
    assert_eq!(pipeline.cache().resident_count(), 1);
    assert!(pipeline.is_resource_loaded(first.guid()).unwrap());
}

#[test]
fn test_identity_stable_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let tex = dir.path().join("Resources/tex.png");
    write_png(&tex, RED);

    let guid = {
        let (mut pipeline, _) = started(dir.path());
        pipeline.initialize().unwrap();
        pipeline.compiler().guid_for_path(&tex).unwrap()
    };

    let (mut pipeline, _) = started(dir.path());
    let report = pipeline.initialize().unwrap();
    assert_eq!(report.registered, 1);
    assert_eq!(pipeline.compiler().compile_count(), 0);
    assert_eq!(pipeline.compiler().guid_for_path(&tex), Some(guid));
}

#[test]
fn test_stale_model_recompiles_with_same_guid() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let obj = root.join("tri.obj");
    fs::write(&obj, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
    pipeline.initialize().unwrap();

    let guid = pipeline.compiler().guid_for_path(&obj).unwrap();
    let before = pipeline.compiler().asset_meta(guid).unwrap().clone();

    fs::write(&obj, "v 0 0 0\nv 2 0 0\nv 0 2 0\nf 1 2 3\n").unwrap();
    touch_later(&obj);
    assert!(pipeline.compile_asset(&obj, CompileOptions::desktop()).unwrap().did_compile());

    let after = pipeline.compiler().asset_meta(guid).unwrap();
    assert_eq!(after.guid, before.guid);
    assert_eq!(after.revision, before.revision + 1);
    assert!(after.source_modified > before.source_modified);

    let model = pipeline.get_resource::<Model>(guid).unwrap().unwrap();
    assert_eq!(model.read().bounds.max, [2.0, 2.0, 0.0]);
}

#[test]
fn test_shader_program_addressed_by_any_stage() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    fs::write(root.join("basic.vert"), VERT).unwrap();
    fs::write(root.join("basic.frag"), FRAG).unwrap();
    pipeline.initialize().unwrap();

    assert!(root.join("basic.meta").is_file());
    assert!(root.join("basic.shader").is_file());
    assert_eq!(pipeline.compiler().asset_meta_count(), 1);

    let from_vert = pipeline.get_resource::<Shader>(root.join("basic.vert")).unwrap().unwrap();
    let from_frag = pipeline.get_resource::<Shader>(root.join("basic.frag")).unwrap().unwrap();
    assert!(from_vert.ptr_eq(&from_frag));
    assert!(from_vert.read().entry_point(ShaderStage::Vertex).is_some());
}

#[test]
fn test_wrong_resource_type_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let tex = root.join("tex.png");
    write_png(&tex, RED);
    pipeline.initialize().unwrap();

    assert!(pipeline.get_resource::<Model>(tex.as_path()).unwrap().is_none());
    assert_eq!(pipeline.cache().resident_count(), 0);
}

#[test]
fn test_corrupt_artifact_recompiled_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let tex = root.join("tex.png");
    write_png(&tex, RED);
    pipeline.initialize().unwrap();

    fs::write(root.join("tex.dds"), b"garbage").unwrap();
    let handle = pipeline.get_resource::<Texture>(tex.as_path()).unwrap().unwrap();
    assert_eq!(handle.read().pixel(3, 3), Some(RED));
    assert_eq!(pipeline.compiler().compile_count(), 2);
}

#[test]
fn test_font_sizes_are_separate_resources() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let ttf = root.join("ui.ttf");
    write_font(&ttf);
    pipeline.initialize().unwrap();

    let small = pipeline.get_font_resource(ttf.as_path(), 12, false).unwrap().unwrap();
    let large = pipeline.get_font_resource(ttf.as_path(), 24, false).unwrap().unwrap();
    let small_again = pipeline.get_font_resource(ttf.as_path(), 12, false).unwrap().unwrap();

    assert!(!small.ptr_eq(&large));
    assert!(small.ptr_eq(&small_again));
    assert_eq!(large.read().pixel_size, 24);

    let reloaded = pipeline.get_font_resource(ttf.as_path(), 12, true).unwrap().unwrap();
    assert!(reloaded.ptr_eq(&small));
    assert_eq!(small.generation(), 1);
}

#[test]
fn test_meta_deletion_event_removes_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let tex = root.join("tex.png");
    write_png(&tex, RED);
    pipeline.initialize().unwrap();
    let guid = pipeline.compiler().guid_for_path(&tex).unwrap();
    pipeline.get_resource::<Texture>(guid).unwrap().unwrap();

    let meta = MetaFiles::meta_path(&tex);
    fs::remove_file(&meta).unwrap();
    pipeline.add_change_event(ChangeKind::Removed, &meta).unwrap();

    let report = pipeline.tick().unwrap();
    assert_eq!(report.handled, 1);
    assert!(!root.join("tex.dds").exists());
    assert!(!pipeline.is_resource_loaded(guid).unwrap());
}

#[test]
fn test_resource_deletion_event_removes_meta() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let tex = root.join("tex.png");
    write_png(&tex, RED);
    pipeline.initialize().unwrap();

    fs::remove_file(root.join("tex.dds")).unwrap();
    pipeline.add_change_event(ChangeKind::Removed, root.join("tex.dds")).unwrap();
    pipeline.tick().unwrap();

    assert!(!MetaFiles::meta_path(&tex).exists());
    assert_eq!(pipeline.compiler().guid_for_path(&tex), None);
}

#[test]
fn test_source_removal_unloads() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let tex = root.join("tex.png");
    write_png(&tex, RED);
    pipeline.initialize().unwrap();
    let handle = pipeline.get_resource::<Texture>(tex.as_path()).unwrap().unwrap();

    fs::remove_file(&tex).unwrap();
    pipeline.add_change_event(ChangeKind::Removed, &tex).unwrap();
    pipeline.tick().unwrap();

    assert!(!pipeline.is_resource_loaded(handle.guid()).unwrap());
    assert!(!root.join("tex.dds").exists());
    assert!(!MetaFiles::meta_path(&tex).exists());
    // Outstanding handles keep their last contents
    assert_eq!(handle.read().pixel(0, 0), Some(RED));
}

#[test]
fn test_event_burst_compiles_once() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let tex = root.join("tex.png");
    write_png(&tex, RED);
    pipeline.initialize().unwrap();
    assert_eq!(pipeline.compiler().compile_count(), 1);

    write_png(&tex, BLUE);
    pipeline.add_change_event(ChangeKind::Added, &tex).unwrap();
    pipeline.add_change_event(ChangeKind::Modified, &tex).unwrap();
    pipeline.add_change_event(ChangeKind::Modified, &tex).unwrap();

    let report = pipeline.tick().unwrap();
    assert_eq!(report.handled, 1);
    assert_eq!(pipeline.compiler().compile_count(), 2);
}

#[test]
fn test_rename_unloads_old_and_compiles_new() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let old = root.join("old.png");
    let new = root.join("new.png");
    write_png(&old, RED);
    pipeline.initialize().unwrap();
    let old_guid = pipeline.compiler().guid_for_path(&old).unwrap();

    fs::rename(&old, &new).unwrap();
    pipeline.add_change_event(ChangeKind::RenamedOld, &old).unwrap();
    pipeline.add_change_event(ChangeKind::RenamedNew, &new).unwrap();
    assert_eq!(pipeline.tick().unwrap().handled, 2);

    assert!(!root.join("old.dds").exists());
    assert!(root.join("new.dds").is_file());
    let new_guid = pipeline.compiler().guid_for_path(&new).unwrap();
    assert_ne!(new_guid, old_guid);
}

#[test]
fn test_texture_import_settings_persist() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let tex = root.join("tex.png");
    write_png(&tex, RED);
    pipeline.initialize().unwrap();

    let import = void_asset::TextureImport {
        slot: 2,
        generate_mipmaps: false,
        ..Default::default()
    };
    let guid = pipeline.compile_texture(&tex, import.clone(), CompileOptions::desktop()).unwrap();
    let handle = pipeline.get_resource::<Texture>(guid).unwrap().unwrap();
    assert_eq!(handle.read().mip_count(), 1);

    // A plain recompile keeps the edited settings
    pipeline.compile_asset(&tex, CompileOptions::desktop().forced()).unwrap();
    let meta = pipeline.compiler().asset_meta(guid).unwrap();
    assert_eq!(meta.import.texture(), Some(&import));
    assert_eq!(handle.read().mip_count(), 1);
}

#[test]
fn test_bulk_android_compile() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    write_png(&root.join("ui/_icon.png"), RED);
    write_font(&root.join("ui/ui.ttf"));
    pipeline.initialize().unwrap();

    pipeline.compile_all_assets_for_android().unwrap();
    let task = pipeline.bulk_compile().unwrap();
    assert_eq!(task.total_assets(), 2);
    assert_eq!(task.target(), BuildTarget::Android);

    assert_eq!(pipeline.wait_for_bulk_compile().unwrap(), Some(2));

    let android = dir.path().join("android/assets/ui");
    assert!(android.join("icon.dds").is_file());
    assert!(android.join("ui.font").is_file());

    let guid = pipeline.compiler().guid_for_path(&root.join("ui/_icon.png")).unwrap();
    let meta = pipeline.compiler().asset_meta(guid).unwrap();
    assert!(meta.has_artifact(BuildTarget::Android));
    assert!(meta.has_artifact(BuildTarget::Desktop));
}

#[test]
fn test_bulk_compile_committed_by_tick() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    write_png(&root.join("a.png"), RED);
    pipeline.initialize().unwrap();

    pipeline.compile_all_assets_for_desktop().unwrap();
    let committed = loop {
        if let Some(committed) = pipeline.tick().unwrap().bulk_committed {
            break committed;
        }
        std::thread::sleep(Duration::from_millis(5));
    };
    assert_eq!(committed, 1);
    assert!(pipeline.bulk_compile().is_none());

    let guid = pipeline.compiler().guid_for_path(&root.join("a.png")).unwrap();
    assert_eq!(pipeline.compiler().asset_meta(guid).unwrap().revision, 2);
}

#[test]
fn test_cleanup_orphans() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let tex = root.join("tex.png");
    write_png(&tex, RED);
    pipeline.initialize().unwrap();

    fs::remove_file(&tex).unwrap();
    let removed = pipeline.cleanup_orphans().unwrap();
    assert_eq!(removed, vec![MetaFiles::meta_path(&tex)]);
    assert!(!root.join("tex.dds").exists());
}

#[test]
fn test_relative_and_absolute_paths_share_resource() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let tex = root.join("tex.png");
    write_png(&tex, RED);
    pipeline.initialize().unwrap();
    let guid = pipeline.compiler().guid_for_path(&tex).unwrap();

    // Only this test changes the working directory; the others use absolute paths
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let relative = Path::new("Resources/tex.png");
    let outcome = pipeline.compile_asset(relative, CompileOptions::desktop()).unwrap();
    let by_relative = pipeline.get_resource::<Texture>(relative).unwrap().unwrap();
    let by_dotted = pipeline
        .get_resource::<Texture>(Path::new("./Resources/../Resources/tex.png"))
        .unwrap()
        .unwrap();
    let by_absolute = pipeline.get_resource::<Texture>(tex.as_path()).unwrap().unwrap();

    std::env::set_current_dir(previous).unwrap();

    assert_eq!(outcome, CompileOutcome::UpToDate(guid));
    assert!(by_relative.ptr_eq(&by_absolute));
    assert!(by_dotted.ptr_eq(&by_absolute));
    assert_eq!(pipeline.cache().resident_count(), 1);
    assert_eq!(pipeline.compiler().asset_meta_count(), 1);
    assert_eq!(pipeline.compiler().compile_count(), 1);
}

#[test]
fn test_android_build_then_desktop_sees_edit() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let tex = root.join("tex.png");
    write_png(&tex, RED);
    pipeline.initialize().unwrap();
    let guid = pipeline.compiler().guid_for_path(&tex).unwrap();

    write_png(&tex, BLUE);
    touch_later(&tex);
    pipeline.compile_all_assets_for_android().unwrap();
    assert_eq!(pipeline.wait_for_bulk_compile().unwrap(), Some(1));

    let android = Texture::load_resource(&dir.path().join("android/assets/tex.dds"), &tex).unwrap();
    assert_eq!(android.pixel(0, 0), Some(BLUE));

    let outcome = pipeline.compile_asset(&tex, CompileOptions::desktop()).unwrap();
    assert_eq!(outcome, CompileOutcome::Compiled(guid));
    let desktop = pipeline.get_resource::<Texture>(guid).unwrap().unwrap();
    assert_eq!(desktop.read().pixel(0, 0), Some(BLUE));

    let again = pipeline.compile_asset(&tex, CompileOptions::android()).unwrap();
    assert_eq!(again, CompileOutcome::UpToDate(guid));
}

#[test]
fn test_texture_stem_collision_refused() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let png = root.join("tex.png");
    let bmp = root.join("tex.bmp");
    write_png(&png, RED);
    pipeline.initialize().unwrap();

    write_png(&bmp, BLUE);
    match pipeline.compile_asset(&bmp, CompileOptions::desktop()) {
        Err(PipelineError::ArtifactCollision { path, owner }) => {
            assert_eq!(path, bmp);
            assert_eq!(owner, png);
        }
        other => panic!("expected a collision, got {:?}", other),
    }
    assert!(pipeline.get_resource::<Texture>(bmp.as_path()).unwrap().is_none());
    assert!(!MetaFiles::meta_path(&bmp).exists());

    let handle = pipeline.get_resource::<Texture>(png.as_path()).unwrap().unwrap();
    assert_eq!(handle.read().pixel(0, 0), Some(RED));
    drop(handle);
    drop(pipeline);

    // The recorded owner still wins after a restart, even though tex.bmp sorts first
    let (mut restarted, _) = started(dir.path());
    let report = restarted.initialize().unwrap();
    assert_eq!(report.registered, 1);
    assert_eq!(report.failed, 1);
    let texture = Texture::load_resource(&root.join("tex.dds"), &png).unwrap();
    assert_eq!(texture.pixel(0, 0), Some(RED));
}

#[test]
fn test_malformed_shader_and_audio_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let shader = root.join("broken.wgsl");
    let clip = root.join("music.ogg");
    fs::write(&shader, "@vertex fn main( { this is not wgsl !!!").unwrap();
    fs::write(&clip, b"OggS\0\x02 not really a vorbis stream").unwrap();

    let report = pipeline.initialize().unwrap();
    assert_eq!(report.failed, 2);

    assert!(matches!(
        pipeline.compile_asset(&shader, CompileOptions::desktop()),
        Err(PipelineError::ShaderParse { .. })
    ));
    assert!(matches!(
        pipeline.compile_asset(&clip, CompileOptions::desktop()),
        Err(PipelineError::Decode { .. })
    ));

    assert!(!root.join("broken.shader").exists());
    assert!(!root.join("music.audio").exists());
    assert!(!MetaFiles::meta_path(&shader).exists());
    assert!(!MetaFiles::meta_path(&clip).exists());
    assert_eq!(pipeline.compiler().asset_meta_count(), 0);
}

#[test]
fn test_obj_groups_survive_compile() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pipeline, root) = started(dir.path());
    let obj = root.join("crate.obj");
    fs::write(
        &obj,
        "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\no Body\nusemtl Wood\nf 1 2 3\ng Lid\nusemtl Metal\nf 2 4 3\n",
    )
    .unwrap();
    pipeline.initialize().unwrap();

    let model = pipeline.get_resource::<Model>(obj.as_path()).unwrap().unwrap();
    let model = model.read();
    assert_eq!(model.meshes.len(), 2);
    assert_eq!(model.meshes[0].name.as_deref(), Some("Body"));
    assert_eq!(model.meshes[0].material.as_deref(), Some("Wood"));
    assert_eq!(model.meshes[1].name.as_deref(), Some("Lid"));
    assert_eq!(model.meshes[1].material.as_deref(), Some("Metal"));
}
