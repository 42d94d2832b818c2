#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use hanko::{BuildInfo, Hash32, HankoError, Project, TaskState, pipeline};
use serde_json::{Value, json};

const LISTING: &str = r#"{"dependencies":{"b":{"version":"2.1.0"},"a":{"version":"1.0.2"}}}"#;

/// Stands in for esbuild: writes a tiny script to the requested outfile.
const FAKE_ESBUILD: &str = r#"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    --outfile=*) out="${arg#--outfile=}" ;;
  esac
done
printf '(function () {})();\n' > "$out"
"#;

struct Fixture {
    _dir: tempfile::TempDir,
    root: Utf8PathBuf,
}

impl Fixture {
    fn new(package_manager: &str) -> Self {
        Self::with_settings(package_manager, json!({ "esbuild": "no/such/esbuild" }))
    }

    fn with_settings(package_manager: &str, mut settings: Value) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap().to_path_buf();

        settings["package_manager"] = json!({ "program": "sh", "args": ["-c", package_manager] });
        let manifest = json!({
            "name": "app",
            "dependencies": { "a": "^1.0.0", "b": "^2.0.0" },
            "hanko": settings,
        });
        fs::write(root.join("package.json"), manifest.to_string()).unwrap();

        fs::create_dir_all(root.join("src/about")).unwrap();
        fs::write(
            root.join("src/index.html"),
            "<span>BUNDLE_VERSION</span><script src=\"/scripts/vendor.js?v=DEPENDENCIES_VERSION\"></script>",
        )
        .unwrap();
        fs::write(root.join("src/about/index.html"), "<p>about</p>").unwrap();

        Self { _dir: dir, root }
    }

    fn working() -> Self {
        Self::new(&format!("printf '%s' '{LISTING}'"))
    }

    fn with_esbuild(settings: Value) -> Self {
        let fixture = Self::with_settings(&format!("printf '%s' '{LISTING}'"), settings);

        let esbuild = fixture.root.join("bin/esbuild");
        fs::create_dir_all(esbuild.parent().unwrap()).unwrap();
        fs::write(&esbuild, FAKE_ESBUILD).unwrap();
        fs::set_permissions(&esbuild, fs::Permissions::from_mode(0o755)).unwrap();

        fixture
    }

    fn project(&self) -> Arc<Project> {
        Arc::new(Project::load(&self.root).unwrap())
    }

    fn read(&self, path: &str) -> String {
        fs::read_to_string(self.root.join(path)).unwrap()
    }
}

#[test]
fn html_is_stamped_with_fingerprint_and_timestamp() {
    let fixture = Fixture::working();
    let project = fixture.project();
    let website = pipeline::website(project.clone());
    let build = BuildInfo {
        bundle_version: 1_700_000_000_123,
    };

    let diagnostics = website
        .build(build, project.dist_dir(), &[pipeline::HTML])
        .unwrap();

    let digest = Hash32::hash(r#"{"a":"1.0.2","b":"2.1.0"}"#).to_hex();
    assert_eq!(
        fixture.read("dist/index.html"),
        format!(
            "<span>1700000000123</span><script src=\"/scripts/vendor.js?v={digest}\"></script>"
        )
    );
    assert_eq!(fixture.read("dist/about/index.html"), "<p>about</p>");

    let config = website.find(pipeline::CONFIG).unwrap();
    let html = website.find(pipeline::HTML).unwrap();
    let script = website.find(pipeline::SCRIPT).unwrap();
    assert_eq!(diagnostics.state(config), Some(TaskState::Done));
    assert_eq!(diagnostics.state(html), Some(TaskState::Done));
    assert_eq!(diagnostics.state(script), None);
    assert!(!fixture.root.join("dist/scripts").exists());
}

#[test]
fn failing_package_manager_blocks_html() {
    let fixture = Fixture::new("echo 'npm ERR! missing: a' >&2; exit 1");
    let project = fixture.project();
    let website = pipeline::website(project.clone());

    let err = website
        .build(BuildInfo::now(), project.dist_dir(), &[pipeline::HTML])
        .unwrap_err();

    match err {
        HankoError::Build(err, diagnostics) => {
            assert_eq!(err.failed_tasks(), [pipeline::CONFIG]);
            let html = website.find(pipeline::HTML).unwrap();
            assert_eq!(diagnostics.state(html), Some(TaskState::Skipped));
            assert!(diagnostics.render_mermaid(&website).contains(r#"["html\nSkipped"]"#));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!fixture.root.join("dist").exists());
}

#[test]
fn malformed_listing_blocks_html() {
    let fixture = Fixture::new("echo 'not json'");
    let project = fixture.project();
    let website = pipeline::website(project.clone());

    let err = website
        .build(BuildInfo::now(), project.dist_dir(), &[pipeline::HTML])
        .unwrap_err();

    assert!(err.to_string().contains("not a valid dependency listing"));
    assert!(!fixture.root.join("dist").exists());
}

#[test]
fn bundle_failure_does_not_block_html() {
    let fixture = Fixture::working();
    let project = fixture.project();
    let website = pipeline::website(project.clone());
    let build = BuildInfo { bundle_version: 7 };

    let no_targets: &[&str] = &[];
    let err = website
        .build(build, project.dist_dir(), no_targets)
        .unwrap_err();

    match err {
        HankoError::Build(err, _) => {
            let mut failed = err.failed_tasks();
            failed.sort();
            assert_eq!(failed, [pipeline::SCRIPT_MAIN, pipeline::SCRIPT_VENDOR]);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(fixture.read("dist/index.html").starts_with("<span>7</span>"));
}

#[test]
fn unknown_task_runs_nothing() {
    let fixture = Fixture::working();
    let project = fixture.project();
    let website = pipeline::website(project.clone());

    let err = website
        .build(BuildInfo::now(), project.dist_dir(), &["styles"])
        .unwrap_err();

    assert!(matches!(err, HankoError::UnknownTask(ref name, _) if name == "styles"));
    assert!(!fixture.root.join("dist").exists());
}

#[test]
fn everything_lands_in_overridden_dist() {
    let fixture = Fixture::with_esbuild(json!({ "dist": "public", "esbuild": "bin/esbuild" }));
    let project = fixture.project();
    let website = pipeline::website(project.clone());
    let no_targets: &[&str] = &[];

    let diagnostics = website
        .build(BuildInfo { bundle_version: 3 }, project.dist_dir(), no_targets)
        .unwrap();

    let script = website.find(pipeline::SCRIPT).unwrap();
    assert_eq!(diagnostics.state(script), Some(TaskState::Done));
    assert_eq!(fixture.read("public/scripts/vendor.js"), "(function () {})();\n");
    assert_eq!(fixture.read("public/scripts/main.js"), "(function () {})();\n");
    assert!(fixture.read("public/index.html").starts_with("<span>3</span>"));
    assert!(!fixture.root.join("dist").exists());
    assert!(fixture.root.join(".cache/hanko/shims/main/external-jquery.js").exists());
}
