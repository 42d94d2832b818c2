//! HTML stamping.
//!
//! Templates are copied from the source tree to the output tree with two
//! placeholder tokens replaced verbatim, wherever they appear.

use camino::{Utf8Path, Utf8PathBuf};
use glob::glob;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::core::BuildInfo;
use crate::error::TemplateError;
use crate::fingerprint::Fingerprint;
use crate::output::Output;
use crate::settings::Project;

/// Replaced with the dependency fingerprint.
pub const DEPENDENCIES_VERSION: &str = "DEPENDENCIES_VERSION";
/// Replaced with the build timestamp.
pub const BUNDLE_VERSION: &str = "BUNDLE_VERSION";

/// Literal replacements, applied in order, each in a single pass.
pub fn substitute(text: &str, replacements: &[(&str, &str)]) -> String {
    replacements
        .iter()
        .fold(text.to_string(), |text, (token, value)| {
            text.replace(token, value)
        })
}

/// Renders every HTML template under the source tree.
pub fn render(
    project: &Project,
    fingerprint: &Fingerprint,
    build: &BuildInfo,
) -> Result<Vec<Output>, TemplateError> {
    let dependencies_version = fingerprint.to_hex();
    let bundle_version = build.bundle_version.to_string();
    let replacements = [
        (DEPENDENCIES_VERSION, dependencies_version.as_str()),
        (BUNDLE_VERSION, bundle_version.as_str()),
    ];

    let src = project.src_dir();
    let paths = find_templates(&src, &project.settings.html)?;

    let outputs = paths
        .into_par_iter()
        .map(|path| {
            let relative = path
                .strip_prefix(&src)
                .map_err(|_| TemplateError::OutsideSource(path.to_string(), src.to_string()))?
                .to_path_buf();

            let text = std::fs::read_to_string(&path)
                .map_err(|e| TemplateError::Read(path.to_string(), e))?;

            Ok(Output::text(relative, substitute(&text, &replacements)))
        })
        .collect::<Result<Vec<_>, TemplateError>>()?;

    tracing::info!("Stamped {} HTML files", outputs.len());

    Ok(outputs)
}

fn find_templates(src: &Utf8Path, pattern: &str) -> Result<Vec<Utf8PathBuf>, TemplateError> {
    let pattern = format!("{}/{}", glob::Pattern::escape(src.as_str()), pattern);

    let mut paths = Vec::new();
    for path in glob(&pattern)? {
        let path = Utf8PathBuf::try_from(path?)?;
        if path.is_file() {
            paths.push(path);
        }
    }

    Ok(paths)
}
