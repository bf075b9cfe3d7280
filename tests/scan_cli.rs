#[path = "../src/fixture.rs"]
mod fixture;

use fixture::{ACC_PUBLIC, ACC_STATIC, ACC_SUPER, ClassFileBuilder, PATH, PROVIDER};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "annotation_scanner_it_{}_{}_{}",
        std::process::id(),
        nanos,
        name
    ))
}

fn write_file(path: &Path, content: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

fn write_jar(path: &Path, entries: &[(&str, Vec<u8>)]) -> anyhow::Result<()> {
    use std::io::Write;
    use zip::write::FileOptions;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(content)?;
    }
    zip.finish()?;
    Ok(())
}

fn run(args: &[&str]) -> anyhow::Result<Output> {
    let bin = env!("CARGO_BIN_EXE_annotation-scanner");
    Ok(Command::new(bin).args(args).output()?)
}

fn run_json(args: &[&str]) -> anyhow::Result<Value> {
    let out = run(args)?;
    if !out.status.success() {
        return Err(anyhow::anyhow!(
            "command failed: status={:?}, stderr={}",
            out.status.code(),
            String::from_utf8_lossy(&out.stderr)
        ));
    }
    Ok(serde_json::from_slice(&out.stdout)?)
}

fn match_names(report: &Value) -> Vec<String> {
    report["matches"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|m| m["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Class directory with the resource/provider mix, plus a jar of providers.
fn build_classpath(base: &Path) -> anyhow::Result<PathBuf> {
    let classes = base.join("classes");
    write_file(
        &classes.join("app/PublicResourceTopLevel.class"),
        &ClassFileBuilder::new("app/PublicResourceTopLevel")
            .annotation(PATH)
            .build(),
    )?;
    write_file(
        &classes.join("app/PackagePrivateResource.class"),
        &ClassFileBuilder::new("app/PackagePrivateResource")
            .access(ACC_SUPER)
            .annotation(PATH)
            .build(),
    )?;
    write_file(
        &classes.join("app/PlainClass.class"),
        &ClassFileBuilder::new("app/PlainClass").build(),
    )?;
    write_file(&classes.join("app/Zero.class"), b"")?;

    write_jar(
        &classes.join("lib/providers.jar"),
        &[
            (
                "ext/Outer$PublicNestedStatic.class",
                ClassFileBuilder::new("ext/Outer$PublicNestedStatic")
                    .access(ACC_SUPER)
                    .annotation(PROVIDER)
                    .inner_class("ext/Outer$PublicNestedStatic", ACC_PUBLIC | ACC_STATIC)
                    .build(),
            ),
            (
                "ext/Outer$PublicNestedInstance.class",
                ClassFileBuilder::new("ext/Outer$PublicNestedInstance")
                    .annotation(PROVIDER)
                    .inner_class("ext/Outer$PublicNestedInstance", ACC_PUBLIC)
                    .build(),
            ),
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n".to_vec()),
        ],
    )?;
    Ok(classes)
}

#[test]
fn scan_reports_eligible_classes_in_discovery_order() -> anyhow::Result<()> {
    let base = temp_dir("scan_order");
    let classes = build_classpath(&base)?;
    let classes_arg = classes.to_string_lossy().to_string();

    let report = run_json(&["--no-cache", "scan", &classes_arg])?;
    assert_eq!(
        match_names(&report),
        vec!["app.PublicResourceTopLevel", "ext.Outer$PublicNestedStatic"]
    );
    assert_eq!(report["scanned"], Value::from(6));

    let errors = report["errors"].as_array().cloned().unwrap_or_default();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["kind"], Value::from("malformed_record"));
    assert_eq!(errors[0]["candidate"], Value::from("app/Zero.class"));

    let again = run_json(&["--no-cache", "scan", &classes_arg, "--threads", "1"])?;
    assert_eq!(match_names(&report), match_names(&again));

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn custom_annotations_replace_the_default_set() -> anyhow::Result<()> {
    let base = temp_dir("custom_annotations");
    let classes = build_classpath(&base)?;
    let classes_arg = classes.to_string_lossy().to_string();

    let report = run_json(&[
        "--no-cache",
        "scan",
        &classes_arg,
        "-a",
        "javax.ws.rs.ext.Provider",
    ])?;
    assert_eq!(match_names(&report), vec!["ext.Outer$PublicNestedStatic"]);

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn unresolvable_match_is_fatal_unless_lenient() -> anyhow::Result<()> {
    let base = temp_dir("unresolvable");
    let classes = build_classpath(&base)?;
    // declared name does not match where the file sits, so it cannot be found
    write_file(
        &classes.join("app/Misplaced.class"),
        &ClassFileBuilder::new("elsewhere/Misplaced")
            .annotation(PATH)
            .build(),
    )?;
    let classes_arg = classes.to_string_lossy().to_string();

    let strict = run(&["--no-cache", "scan", &classes_arg])?;
    assert!(!strict.status.success());
    assert!(String::from_utf8_lossy(&strict.stderr).contains("elsewhere.Misplaced"));

    let explicit = run(&["--no-cache", "scan", &classes_arg, "--policy", "strict"])?;
    assert!(!explicit.status.success());

    let lenient = run_json(&["--no-cache", "scan", &classes_arg, "--policy", "lenient"])?;
    assert_eq!(
        match_names(&lenient),
        vec!["app.PublicResourceTopLevel", "ext.Outer$PublicNestedStatic"]
    );
    let kinds: Vec<String> = lenient["errors"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .filter_map(|e| e["kind"].as_str().map(str::to_string))
        .collect();
    assert_eq!(kinds, vec!["name_resolution", "malformed_record"]);

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[test]
fn verdict_cache_serves_repeat_scans() -> anyhow::Result<()> {
    let base = temp_dir("cache");
    let classes = build_classpath(&base)?;
    let classes_arg = classes.to_string_lossy().to_string();
    let db = base.join("verdicts.lmdb");
    let db_arg = db.to_string_lossy().to_string();

    let first = run_json(&["--db", &db_arg, "scan", &classes_arg])?;
    assert_eq!(first["cache_hits"], Value::from(0));

    let second = run_json(&["--db", &db_arg, "scan", &classes_arg])?;
    // every readable record is cached; the zero-byte file is not
    assert_eq!(second["cache_hits"], Value::from(5));
    assert_eq!(match_names(&first), match_names(&second));

    let stats = run_json(&["--db", &db_arg, "stats"])?;
    assert_eq!(stats["verdict_entries"], Value::from(5));
    assert_eq!(stats["matched_entries"], Value::from(2));
    assert_eq!(stats["scans"], Value::from(2));

    let cleared = run(&["--db", &db_arg, "clear"])?;
    assert!(cleared.status.success());
    assert!(!db.exists());

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}
