//! Script bundling through esbuild.
//!
//! Every bundle is emitted as a single immediately-invoked function
//! expression. Modules declared as externals are not inlined: each one is
//! aliased to a generated shim that reads the library from a global variable
//! supplied by the host page.

use std::fs;
use std::process::{Command, Stdio};

use camino::{Utf8Path, Utf8PathBuf};

use crate::core::Hash32;
use crate::error::BundleError;
use crate::settings::{BundleSettings, Project};

/// Node globals provided to vendor code that expects to run under Node.
const PROCESS_SHIM: &str = r#"export var process = {
  env: {},
  browser: true,
  argv: [],
  version: "",
  versions: {},
  nextTick: function (fn) {
    var args = Array.prototype.slice.call(arguments, 1);
    Promise.resolve().then(function () { fn.apply(null, args); });
  },
};
"#;

/// Represents an emitted script bundle.
#[derive(Debug, Clone)]
pub struct Bundle {
    /// Path to the emitted script, relative to the project root.
    pub script: Utf8PathBuf,
    /// Path to the emitted source map, if one was requested.
    pub sourcemap: Option<Utf8PathBuf>,
    /// Content hash of the emitted script.
    pub hash: Hash32,
}

impl std::fmt::Display for Bundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.script, self.hash)?;
        if let Some(sourcemap) = &self.sourcemap {
            write!(f, " with {sourcemap}")?;
        }
        Ok(())
    }
}

/// Bundles one entry module with esbuild.
///
/// `key` names the bundle's scratch directory and must differ between
/// bundles that run at the same time.
///
/// **Note:** This requires the `esbuild` binary, either installed in the
/// project's `node_modules` or available in the system PATH.
pub fn bundle(project: &Project, key: &str, settings: &BundleSettings) -> Result<Bundle, BundleError> {
    let shims = write_shims(project, key, settings)?;
    let args = esbuild_args(project, settings, &shims);
    let program = resolve_esbuild(project);
    let outfile = project.outfile(settings);

    if let Some(parent) = project.path(&outfile).parent() {
        fs::create_dir_all(parent)?;
    }

    tracing::debug!("Running {program} {}", args.join(" "));

    let output = Command::new(program.as_str())
        .args(&args)
        .current_dir(&project.root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| BundleError::Spawn(program.to_string(), e))?;

    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        return Err(BundleError::Esbuild(stderr.into_owned()));
    }

    if !stderr.trim().is_empty() {
        tracing::debug!("{}", stderr.trim());
    }

    let hash = Hash32::hash_file(project.path(&outfile))?;
    let sourcemap = settings
        .sourcemap
        .then(|| Utf8PathBuf::from(format!("{outfile}.map")));

    tracing::info!("Bundled {} -> {outfile}", settings.entry);

    Ok(Bundle {
        script: outfile,
        sourcemap,
        hash,
    })
}

/// Shim modules written for a bundle, as paths relative to the project root.
#[derive(Debug, Default)]
struct Shims {
    /// Module name and the shim it is aliased to.
    externals: Vec<(String, Utf8PathBuf)>,
    process: Option<Utf8PathBuf>,
}

fn shim_dir(project: &Project, key: &str) -> Utf8PathBuf {
    project.settings.cache.join("shims").join(key)
}

/// Body of the module standing in for an external library.
fn external_shim(global: &str) -> String {
    // A JSON string literal is also a valid JavaScript string literal.
    let global = serde_json::Value::String(global.to_string());
    format!("module.exports = globalThis[{global}];\n")
}

fn shim_file_name(module: &str) -> String {
    let stem: String = module
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    format!("external-{stem}.js")
}

fn write_shims(
    project: &Project,
    key: &str,
    settings: &BundleSettings,
) -> Result<Shims, BundleError> {
    let mut shims = Shims::default();

    if settings.externals.is_empty() && !settings.node_globals {
        return Ok(shims);
    }

    let dir = shim_dir(project, key);
    fs::create_dir_all(project.path(&dir))?;

    for (module, global) in &settings.externals {
        let path = dir.join(shim_file_name(module));
        fs::write(project.path(&path), external_shim(global))?;
        shims.externals.push((module.clone(), path));
    }

    if settings.node_globals {
        let path = dir.join("process.js");
        fs::write(project.path(&path), PROCESS_SHIM)?;
        shims.process = Some(path);
    }

    Ok(shims)
}

/// esbuild resolves aliased and injected paths against its working
/// directory, and wants them spelled as `./relative`.
fn dot_relative(path: &Utf8Path) -> String {
    format!("./{path}")
}

fn esbuild_args(project: &Project, settings: &BundleSettings, shims: &Shims) -> Vec<String> {
    let mut args = vec![
        settings.entry.to_string(),
        "--bundle".to_string(),
        "--format=iife".to_string(),
        format!("--global-name={}", settings.name),
        "--platform=browser".to_string(),
        format!("--target={}", project.esbuild_targets().join(",")),
        format!("--outfile={}", project.outfile(settings)),
        "--log-level=warning".to_string(),
    ];

    if settings.sourcemap {
        args.push("--sourcemap".to_string());
    }

    if settings.minify {
        args.push("--minify".to_string());
    }

    if settings.node_globals {
        args.push("--main-fields=browser,module,main".to_string());
        args.push("--define:global=globalThis".to_string());
    }

    if let Some(process) = &shims.process {
        args.push(format!("--inject:{}", dot_relative(process)));
    }

    for (module, shim) in &shims.externals {
        args.push(format!("--alias:{module}={}", dot_relative(shim)));
    }

    args
}

/// Prefers the project's own esbuild over whatever is on `PATH`.
fn resolve_esbuild(project: &Project) -> Utf8PathBuf {
    if let Some(path) = &project.settings.esbuild {
        return project.path(path);
    }

    let local = project.path("node_modules/.bin/esbuild");
    if local.exists() {
        local
    } else {
        Utf8PathBuf::from("esbuild")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::PackageManifest;
    use crate::settings::Settings;

    fn project(root: &Utf8Path) -> Project {
        Project::new(root, PackageManifest::default(), Settings::default())
    }

    fn temp_project() -> (tempfile::TempDir, Project) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap().to_path_buf();
        (dir, project(&root))
    }

    #[test]
    fn test_main_externals_are_shimmed() {
        let (_dir, project) = temp_project();
        let settings = BundleSettings::main();

        let shims = write_shims(&project, "main", &settings).unwrap();
        let args = esbuild_args(&project, &settings, &shims);

        assert!(args.contains(&"--alias:jquery=./.cache/hanko/shims/main/external-jquery.js".to_string()));
        assert!(args.contains(&"--alias:axios=./.cache/hanko/shims/main/external-axios.js".to_string()));
        assert!(args.contains(&"--sourcemap".to_string()));
        assert!(!args.iter().any(|arg| arg.starts_with("--inject")));

        let jquery = fs::read_to_string(
            project.path(".cache/hanko/shims/main/external-jquery.js"),
        )
        .unwrap();
        assert_eq!(jquery, "module.exports = globalThis[\"$\"];\n");
    }

    #[test]
    fn test_vendor_is_self_contained_iife() {
        let (_dir, project) = temp_project();
        let settings = BundleSettings::vendor();

        let shims = write_shims(&project, "vendor", &settings).unwrap();
        let args = esbuild_args(&project, &settings, &shims);

        assert_eq!(args[0], "src/scripts/vendor.js");
        assert!(args.contains(&"--bundle".to_string()));
        assert!(args.contains(&"--format=iife".to_string()));
        assert!(args.contains(&"--global-name=vendor".to_string()));
        assert!(args.contains(&"--outfile=dist/scripts/vendor.js".to_string()));
        assert!(args.contains(&"--target=es2015".to_string()));
        assert!(args.contains(&"--define:global=globalThis".to_string()));
        assert!(args.contains(&"--inject:./.cache/hanko/shims/vendor/process.js".to_string()));
        assert!(!args.iter().any(|arg| arg.starts_with("--alias")));
        assert!(!args.iter().any(|arg| arg.starts_with("--external")));
        assert!(project.path(".cache/hanko/shims/vendor/process.js").exists());
    }

    #[test]
    fn test_nothing_to_shim() {
        let (_dir, project) = temp_project();
        let mut settings = BundleSettings::vendor();
        settings.node_globals = false;

        write_shims(&project, "vendor", &settings).unwrap();

        assert!(!project.path(".cache").exists());
    }

    #[test]
    fn test_shims_keyed_by_bundle() {
        let (_dir, project) = temp_project();
        let mut vendor = BundleSettings::vendor();
        vendor.name = "app".into();
        vendor.externals.insert("jquery".into(), "jQuery".into());
        let mut main = BundleSettings::main();
        main.name = "app".into();

        let vendor_shims = write_shims(&project, "vendor", &vendor).unwrap();
        let main_shims = write_shims(&project, "main", &main).unwrap();

        assert_ne!(vendor_shims.externals[0].1, main_shims.externals[1].1);
        let read = |path: &Utf8Path| fs::read_to_string(project.path(path)).unwrap();
        assert_eq!(read(&vendor_shims.externals[0].1), "module.exports = globalThis[\"jQuery\"];\n");
        assert_eq!(read(&main_shims.externals[1].1), "module.exports = globalThis[\"$\"];\n");
    }

    #[test]
    fn test_outfile_follows_dist() {
        let (_dir, mut project) = temp_project();
        project.settings.dist = "public".into();
        let settings = BundleSettings::main();

        let args = esbuild_args(&project, &settings, &Shims::default());

        assert!(args.contains(&"--outfile=public/scripts/main.js".to_string()));
    }

    #[test]
    fn test_display() {
        let bundle = Bundle {
            script: "dist/scripts/main.js".into(),
            sourcemap: Some("dist/scripts/main.js.map".into()),
            hash: Hash32::hash("main"),
        };

        assert_eq!(
            bundle.to_string(),
            format!("dist/scripts/main.js ({}) with dist/scripts/main.js.map", Hash32::hash("main"))
        );
    }

    #[test]
    fn test_shim_names() {
        assert_eq!(shim_file_name("@scope/pkg"), "external-_scope_pkg.js");
        assert_eq!(
            external_shim("weird\"name"),
            "module.exports = globalThis[\"weird\\\"name\"];\n"
        );
    }

    #[test]
    fn test_resolve_esbuild() {
        let (_dir, mut project) = temp_project();
        assert_eq!(resolve_esbuild(&project), "esbuild");

        let bin = project.path("node_modules/.bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("esbuild"), "").unwrap();
        assert_eq!(resolve_esbuild(&project), bin.join("esbuild"));

        project.settings.esbuild = Some("tools/esbuild".into());
        assert_eq!(resolve_esbuild(&project), project.path("tools/esbuild"));
    }

    #[test]
    fn test_missing_esbuild_binary() {
        let (_dir, mut project) = temp_project();
        project.settings.esbuild = Some("no/such/esbuild".into());

        let err = bundle(&project, "main", &BundleSettings::main()).unwrap_err();
        assert!(matches!(err, BundleError::Spawn(..)));
    }
}
