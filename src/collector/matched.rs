//! Glob-driven collection: test files matched by runner rules, their
//! snapshot directories, and everything they import.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::resolver::normalize_path;

use super::DependencyResolver;

const DEFAULT_TEST_MATCH: &[&str] = &["**/*.spec.*", "**/*.test.*"];
const DEFAULT_SNAPSHOT_TEMPLATE: &str = "{testDir}/{testFileDir}/{testFileName}-snapshots/";

/// One test-runner project: where its tests live and how they are matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRule {
    #[serde(default)]
    pub name: Option<String>,
    /// Directory searched for tests, relative to the collection root.
    #[serde(default)]
    pub test_dir: Option<PathBuf>,
    #[serde(default)]
    pub test_match: Vec<String>,
    #[serde(default)]
    pub test_ignore: Vec<String>,
    #[serde(default)]
    pub snapshot_path_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchError {
    pub file: PathBuf,
    pub message: String,
}

/// Files gathered in glob-driven mode. Failures never abort the pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchedCollection {
    pub files: Vec<PathBuf>,
    pub errors: Vec<MatchError>,
}

impl DependencyResolver {
    /// Collect every test file matched by `rules` under `root`, plus its
    /// snapshot files and resolved local dependencies.
    pub fn collect_matched(&self, root: &Path, rules: &[MatchRule]) -> MatchedCollection {
        let mut files = BTreeSet::new();
        let mut errors = Vec::new();

        for rule in rules {
            let test_dir = match &rule.test_dir {
                Some(dir) => root.join(dir),
                None => root.to_path_buf(),
            };
            let tests = match find_test_files(&test_dir, rule) {
                Ok(tests) => tests,
                Err(err) => {
                    errors.push(MatchError {
                        file: test_dir.clone(),
                        message: format!("{:#}", err),
                    });
                    continue;
                }
            };
            debug!(project = ?rule.name, dir = %test_dir.display(), count = tests.len(), "matched test files");

            for test_file in tests {
                let snapshot_dir = snapshot_dir(&test_dir, &test_file, rule);
                if snapshot_dir.is_dir() {
                    files.extend(files_under(&snapshot_dir));
                }

                match self.collect(&test_file) {
                    Ok(result) => {
                        let problems = result.problems();
                        if !problems.is_empty() {
                            errors.push(MatchError {
                                file: test_file.clone(),
                                message: problems.to_string(),
                            });
                        }
                        files.extend(result.resolved_files.iter().map(|f| f.path.clone()));
                        files.insert(test_file);
                    }
                    Err(err) => {
                        warn!(file = %test_file.display(), error = %err, "skipping test file");
                        errors.push(MatchError {
                            file: test_file,
                            message: err.to_string(),
                        });
                    }
                }
            }
        }

        MatchedCollection {
            files: files.into_iter().collect(),
            errors,
        }
    }
}

fn find_test_files(test_dir: &Path, rule: &MatchRule) -> Result<Vec<PathBuf>> {
    let include = if rule.test_match.is_empty() {
        build_globset(DEFAULT_TEST_MATCH.iter().copied())?
    } else {
        build_globset(rule.test_match.iter().map(String::as_str))?
    };
    let ignore = build_globset(rule.test_ignore.iter().map(String::as_str))?;

    let mut files = Vec::new();
    let walker = WalkBuilder::new(test_dir)
        .hidden(false)
        .git_ignore(true)
        .parents(true)
        .filter_entry(|entry| entry.file_name() != "node_modules")
        .build();
    for entry in walker {
        let entry = entry.with_context(|| format!("error walking {}", test_dir.display()))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(test_dir) else {
            continue;
        };
        if include.is_match(relative) && !ignore.is_match(relative) {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

fn build_globset<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid pattern: {}", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Directory holding a test file's snapshots, from the rule's template.
///
/// Known `{placeholders}` are substituted; the template is cut at the first
/// one left over (`{arg}`, `{ext}`), and the directory part of what remains
/// is the answer.
pub fn snapshot_dir(test_dir: &Path, test_file: &Path, rule: &MatchRule) -> PathBuf {
    let template = rule
        .snapshot_path_template
        .as_deref()
        .unwrap_or(DEFAULT_SNAPSHOT_TEMPLATE);

    let relative = test_file.strip_prefix(test_dir).unwrap_or(test_file);
    let file_dir = relative
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = relative
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let test_dir_str = test_dir.to_string_lossy();

    let substituted = template
        .replace("{testDir}", &test_dir_str)
        .replace("{snapshotDir}", &test_dir_str)
        .replace("{testFileDir}", &file_dir)
        .replace("{testFileName}", &file_name)
        .replace("{testFilePath}", &relative.to_string_lossy())
        .replace("{projectName}", rule.name.as_deref().unwrap_or(""))
        .replace("{platform}", platform());

    let kept = match substituted.find('{') {
        Some(index) => &substituted[..index],
        None => substituted.as_str(),
    };
    let directory = match kept.rfind('/') {
        Some(index) => &kept[..index],
        None => "",
    };
    let path = PathBuf::from(directory);
    if path.is_absolute() {
        normalize_path(&path)
    } else {
        normalize_path(&test_dir.join(path))
    }
}

fn platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    WalkBuilder::new(dir)
        .standard_filters(false)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ResolverOptions;
    use crate::source::SourceCache;
    use std::fs;
    use tempfile::TempDir;

    fn setup_test_project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&full, content).unwrap();
        }
        dir
    }

    fn session(dir: &TempDir) -> DependencyResolver {
        DependencyResolver::new(
            SourceCache::disk(),
            ResolverOptions {
                root: Some(dir.path().to_path_buf()),
                check_unsupported_modules: false,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_default_snapshot_dir() {
        let rule = MatchRule::default();
        let dir = snapshot_dir(
            Path::new("/p/tests"),
            Path::new("/p/tests/login/login.spec.ts"),
            &rule,
        );
        assert_eq!(dir, PathBuf::from("/p/tests/login/login.spec.ts-snapshots"));
    }

    #[test]
    fn test_custom_snapshot_template_cut_at_placeholder() {
        let rule = MatchRule {
            name: Some("chromium".to_string()),
            snapshot_path_template: Some(
                "{testDir}/__screenshots__/{projectName}/{testFilePath}/{arg}{ext}".to_string(),
            ),
            ..Default::default()
        };
        let dir = snapshot_dir(Path::new("/p/e2e"), Path::new("/p/e2e/home.spec.ts"), &rule);
        assert_eq!(
            dir,
            PathBuf::from("/p/e2e/__screenshots__/chromium/home.spec.ts")
        );
    }

    #[test]
    fn test_collects_tests_snapshots_and_dependencies() {
        let dir = setup_test_project(&[
            ("tests/login.spec.js", "const h = require('./helpers');"),
            ("tests/helpers.js", ""),
            ("tests/login.spec.js-snapshots/page.png", "png"),
            ("tests/readme.md", ""),
            ("tests/skip.spec.js", ""),
        ]);
        let rule = MatchRule {
            test_dir: Some(PathBuf::from("tests")),
            test_ignore: vec!["skip.*".to_string()],
            ..Default::default()
        };
        let collection = session(&dir).collect_matched(dir.path(), &[rule]);
        assert!(collection.errors.is_empty(), "{:?}", collection.errors);
        assert_eq!(
            collection.files,
            vec![
                dir.path().join("tests/helpers.js"),
                dir.path().join("tests/login.spec.js"),
                dir.path().join("tests/login.spec.js-snapshots/page.png"),
            ]
        );
    }

    #[test]
    fn test_failures_are_collected_not_fatal() {
        let dir = setup_test_project(&[
            ("a.test.js", "require('./gone')"),
            ("b.test.js", "require('./style.css')"),
            ("style.css", ""),
            ("c.test.js", ""),
        ]);
        let collection = session(&dir).collect_matched(dir.path(), &[MatchRule::default()]);
        assert_eq!(collection.errors.len(), 2);
        assert!(collection.files.contains(&dir.path().join("a.test.js")));
        assert!(collection.files.contains(&dir.path().join("c.test.js")));
        assert!(!collection.files.contains(&dir.path().join("b.test.js")));
    }
}
