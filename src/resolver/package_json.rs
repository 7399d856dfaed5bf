use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

/// Entry point tried when `main` is absent or does not resolve.
const DEFAULT_ENTRY: &str = "index";

/// The parts of a `package.json` that matter for resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    /// Path of the `package.json` file itself.
    pub manifest_path: PathBuf,
    /// Directory containing the manifest.
    pub base_path: PathBuf,
    pub name: Option<String>,
    /// Entry points relative to `base_path`, in probing order.
    pub entry_point_candidates: Vec<String>,
    /// `exports` is declared, so legacy package-relative lookups are off.
    pub has_explicit_export_map: bool,
    /// `workspaces` globs, from either the array or `{ packages: [...] }` form.
    pub workspaces: Option<Vec<String>>,
}

impl PackageDescriptor {
    pub fn parse_from_str(content: &str, manifest_path: &Path) -> Result<Self> {
        let json: Value = serde_json::from_str(content)
            .with_context(|| format!("invalid JSON in {}", manifest_path.display()))?;

        let base_path = manifest_path
            .parent()
            .unwrap_or(Path::new("/"))
            .to_path_buf();

        let name = json
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let mut entry_point_candidates = Vec::new();
        if let Some(main) = json.get("main").and_then(|v| v.as_str()) {
            if !main.trim().is_empty() {
                entry_point_candidates.push(main.to_string());
            }
        }
        entry_point_candidates.push(DEFAULT_ENTRY.to_string());

        let has_explicit_export_map = json.get("exports").is_some_and(|v| !v.is_null());

        let workspaces = json.get("workspaces").and_then(parse_workspace_globs);

        Ok(PackageDescriptor {
            manifest_path: manifest_path.to_path_buf(),
            base_path,
            name,
            entry_point_candidates,
            has_explicit_export_map,
            workspaces,
        })
    }

    /// Path a specifier refers to when resolved against this package.
    ///
    /// A self-reference (`"<name>/sub"`) drops the package name; any other
    /// specifier is taken relative to the package directory as-is.
    pub fn package_relative_path(&self, specifier: &str) -> PathBuf {
        if let Some(name) = &self.name {
            if specifier == name {
                return self.base_path.clone();
            }
            if let Some(rest) = specifier
                .strip_prefix(name.as_str())
                .and_then(|r| r.strip_prefix('/'))
            {
                return self.base_path.join(rest);
            }
        }
        self.base_path.join(specifier)
    }
}

/// Workspaces can be an array or an object with a "packages" field.
pub fn parse_workspace_globs(value: &Value) -> Option<Vec<String>> {
    let list = match value {
        Value::Array(arr) => arr,
        Value::Object(obj) => obj.get("packages")?.as_array()?,
        _ => return None,
    };
    Some(
        list.iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
    )
}
