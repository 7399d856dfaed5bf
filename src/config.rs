use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::collector::{MatchRule, ResolverOptions};

/// Default config file names, searched in order.
const CONFIG_FILENAMES: &[&str] = &[".depscope/config.toml", "depscope.toml"];

/// Top-level resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// External modules available in the execution sandbox.
    pub supported_modules: Vec<String>,
    pub check_unsupported_modules: bool,
    pub restricted: bool,
    /// Upper bound for descriptor lookups; relative paths are taken from the project root.
    pub root: Option<PathBuf>,
    pub max_files: Option<usize>,
    pub match_rules: Vec<MatchRule>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            supported_modules: Vec::new(),
            check_unsupported_modules: true,
            restricted: false,
            root: None,
            max_files: None,
            match_rules: Vec::new(),
        }
    }
}

impl ResolverConfig {
    pub fn resolver_options(&self, project_root: &Path) -> ResolverOptions {
        ResolverOptions {
            supported_modules: self.supported_modules.clone(),
            check_unsupported_modules: self.check_unsupported_modules,
            restricted: self.restricted,
            root: self.root.as_ref().map(|root| project_root.join(root)),
            max_files: self.max_files,
        }
    }
}

/// Find the config file for a project.
///
/// If `config_override` is provided, use that path directly.
/// Otherwise, search for config files in the project root.
pub fn find_config_path(project_root: &Path, config_override: Option<&Path>) -> Option<PathBuf> {
    if let Some(override_path) = config_override {
        return override_path.exists().then(|| override_path.to_path_buf());
    }

    CONFIG_FILENAMES
        .iter()
        .map(|filename| project_root.join(filename))
        .find(|path| path.exists())
}

/// Load and parse a config from a TOML file.
pub fn load_config(path: &Path) -> Result<ResolverConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Parse a config from a TOML string.
pub fn parse_config(toml_str: &str) -> Result<ResolverConfig> {
    let config: ResolverConfig = toml::from_str(toml_str)?;
    Ok(config)
}

/// Load the project's config, or defaults when there is none.
///
/// An explicit `config_override` that does not exist is an error.
pub fn load_project_config(
    project_root: &Path,
    config_override: Option<&Path>,
) -> Result<ResolverConfig> {
    match find_config_path(project_root, config_override) {
        Some(path) => load_config(&path),
        None => match config_override {
            Some(path) => anyhow::bail!("config file not found: {}", path.display()),
            None => Ok(ResolverConfig::default()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
supported_modules = ["@playwright/test", "axios"]
check_unsupported_modules = false
restricted = true
root = "checks"
max_files = 500

[[match_rules]]
name = "chromium"
test_dir = "e2e"
test_match = ["**/*.e2e.ts"]
test_ignore = ["**/legacy/**"]
snapshot_path_template = "{testDir}/__snapshots__/{testFilePath}/{arg}{ext}"
"#;

        let config = parse_config(toml).unwrap();
        assert_eq!(config.supported_modules, vec!["@playwright/test", "axios"]);
        assert!(!config.check_unsupported_modules);
        assert!(config.restricted);
        assert_eq!(config.root, Some(PathBuf::from("checks")));
        assert_eq!(config.max_files, Some(500));
        assert_eq!(config.match_rules.len(), 1);
        let rule = &config.match_rules[0];
        assert_eq!(rule.name.as_deref(), Some("chromium"));
        assert_eq!(rule.test_dir, Some(PathBuf::from("e2e")));
        assert_eq!(rule.test_ignore, vec!["**/legacy/**"]);
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, ResolverConfig::default());
        assert!(config.check_unsupported_modules);
    }

    #[test]
    fn test_parse_wrong_type() {
        assert!(parse_config("restricted = \"yes\"").is_err());
    }

    #[test]
    fn test_resolver_options_join_root() {
        let config = parse_config("root = \"checks\"").unwrap();
        let options = config.resolver_options(Path::new("/repo"));
        assert_eq!(options.root, Some(PathBuf::from("/repo/checks")));
        assert!(options.check_unsupported_modules);
    }

    #[test]
    fn test_find_config_with_override() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("custom.toml");
        std::fs::write(&config_path, "").unwrap();

        let found = find_config_path(dir.path(), Some(&config_path));
        assert_eq!(found, Some(config_path));
    }

    #[test]
    fn test_find_config_search_order() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("depscope.toml"), "").unwrap();
        assert_eq!(
            find_config_path(dir.path(), None),
            Some(dir.path().join("depscope.toml"))
        );

        std::fs::create_dir_all(dir.path().join(".depscope")).unwrap();
        std::fs::write(dir.path().join(".depscope/config.toml"), "").unwrap();
        assert_eq!(
            find_config_path(dir.path(), None),
            Some(dir.path().join(".depscope/config.toml"))
        );
    }

    #[test]
    fn test_missing_override_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(load_project_config(dir.path(), Some(&dir.path().join("nope.toml"))).is_err());
        assert_eq!(
            load_project_config(dir.path(), None).unwrap(),
            ResolverConfig::default()
        );
    }
}
