//! The project's `package.json`.

use std::collections::BTreeMap;

use camino::Utf8Path;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ManifestError;

/// The subset of `package.json` the build cares about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    /// Declared runtime dependencies, in the order they appear in the file.
    #[serde(default)]
    pub dependencies: Map<String, Value>,
    #[serde(default)]
    pub browserslist: Option<Browserslist>,
    /// Overrides for [`Settings`](crate::Settings).
    #[serde(default)]
    pub hanko: Option<Value>,
}

impl PackageManifest {
    pub fn load(path: &Utf8Path) -> Result<Self, ManifestError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ManifestError::Io(path.to_string(), e))?;

        Self::parse(path, &text)
    }

    pub(crate) fn parse(path: &Utf8Path, text: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(text).map_err(|e| ManifestError::Json(path.to_string(), e))
    }

    /// Names of the declared runtime dependencies, in manifest order.
    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }
}

/// The `browserslist` field, which may be a single comma separated query, a
/// list of queries, or a map of environments to query lists.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Browserslist {
    One(String),
    Many(Vec<String>),
    Envs(BTreeMap<String, Vec<String>>),
}

impl Browserslist {
    /// Flattens the field into individual queries. For the environment form
    /// only the `production` queries are used.
    pub fn queries(&self) -> Vec<String> {
        let split = |query: &String| -> Vec<String> {
            query
                .split(',')
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(String::from)
                .collect()
        };

        match self {
            Browserslist::One(query) => split(query),
            Browserslist::Many(queries) => queries.iter().flat_map(split).collect(),
            Browserslist::Envs(envs) => envs
                .get("production")
                .map(|queries| queries.iter().flat_map(split).collect())
                .unwrap_or_default(),
        }
    }

    /// Maps the queries onto esbuild targets.
    ///
    /// Queries that name a browser and a minimum version (`chrome >= 58`,
    /// `firefox 60`, `ios_saf 11.0-11.2`) are kept, everything else
    /// (`> 1%`, `last 2 versions`, `not dead`) has no esbuild equivalent and is
    /// ignored. When an engine is listed more than once the lowest version wins.
    pub fn esbuild_targets(&self) -> Vec<String> {
        let mut engines: BTreeMap<&'static str, Vec<u32>> = BTreeMap::new();

        for query in self.queries() {
            let Some((engine, version)) = parse_query(&query) else {
                tracing::debug!("Ignoring browserslist query '{query}'");
                continue;
            };

            engines
                .entry(engine)
                .and_modify(|current| {
                    if version < *current {
                        *current = version.clone();
                    }
                })
                .or_insert(version);
        }

        engines
            .into_iter()
            .map(|(engine, version)| {
                let version: Vec<String> = version.iter().map(u32::to_string).collect();
                format!("{engine}{}", version.join("."))
            })
            .collect()
    }
}

fn parse_query(query: &str) -> Option<(&'static str, Vec<u32>)> {
    let query = query.to_ascii_lowercase();
    let mut parts = query.split_whitespace();

    let engine = match parts.next()? {
        "chrome" | "and_chr" | "chromeandroid" => "chrome",
        "firefox" | "ff" | "and_ff" | "firefoxandroid" => "firefox",
        "safari" => "safari",
        "ios_saf" | "ios" => "ios",
        "edge" => "edge",
        "opera" => "opera",
        "ie" | "explorer" => "ie",
        "node" => "node",
        _ => return None,
    };

    let version = match parts.next()? {
        ">=" => parts.next()?,
        "<" | "<=" | ">" => return None,
        version => version,
    };

    if parts.next().is_some() {
        return None;
    }

    // Ranges such as `11.0-11.2` start at their lower bound.
    let version = version.split('-').next()?;
    let version = version
        .split('.')
        .map(str::parse::<u32>)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;

    Some((engine, version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependencies_keep_manifest_order() {
        let manifest = PackageManifest::parse(
            Utf8Path::new("package.json"),
            r#"{"dependencies": {"zeta": "^1.0.0", "alpha": "^2.0.0", "mid": "3"}}"#,
        )
        .unwrap();

        let names: Vec<_> = manifest.dependency_names().collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_missing_fields_default() {
        let manifest = PackageManifest::parse(Utf8Path::new("package.json"), "{}").unwrap();
        assert!(manifest.dependencies.is_empty());
        assert!(manifest.browserslist.is_none());
        assert!(manifest.hanko.is_none());
    }

    #[test]
    fn test_invalid_json() {
        let err = PackageManifest::parse(Utf8Path::new("package.json"), "{").unwrap_err();
        assert!(matches!(err, ManifestError::Json(..)));
    }

    #[test]
    fn test_browserslist_forms() {
        let one = Browserslist::One("chrome >= 58, > 1%".into());
        assert_eq!(one.queries(), ["chrome >= 58", "> 1%"]);

        let mut envs = BTreeMap::new();
        envs.insert("production".to_string(), vec!["firefox 60".to_string()]);
        envs.insert("development".to_string(), vec!["last 1 chrome version".to_string()]);
        assert_eq!(Browserslist::Envs(envs).queries(), ["firefox 60"]);
    }

    #[test]
    fn test_parse_browserslist_field() {
        let parse = |text| PackageManifest::parse(Utf8Path::new("package.json"), text).unwrap();

        let one = parse(r#"{"browserslist": "safari >= 10, > 1%"}"#);
        assert!(matches!(one.browserslist, Some(Browserslist::One(_))));
        assert_eq!(one.browserslist.unwrap().esbuild_targets(), ["safari10"]);

        let many = parse(r#"{"browserslist": ["firefox 60", "not dead"]}"#);
        assert!(matches!(many.browserslist, Some(Browserslist::Many(_))));

        let envs = parse(r#"{"browserslist": {"production": ["edge 18"], "development": ["chrome 100"]}}"#);
        assert_eq!(envs.browserslist.unwrap().esbuild_targets(), ["edge18"]);
    }

    #[test]
    fn test_esbuild_targets() {
        let list = Browserslist::Many(vec![
            "Chrome >= 58".into(),
            "chrome 61".into(),
            "ios_saf 11.0-11.2".into(),
            "last 2 versions".into(),
            "> 1%".into(),
            "ie > 10".into(),
        ]);

        assert_eq!(list.esbuild_targets(), ["chrome58", "ios11.0"]);
    }
}
