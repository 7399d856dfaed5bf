use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::resolver::package_json::parse_workspace_globs;
use crate::resolver::tsconfig::to_strict_json;

use super::{Package, Workspace, WorkspaceResolver};

const MANIFEST_FILE: &str = "package.json";
const DENO_CONFIG_FILES: &[&str] = &["deno.json", "deno.jsonc"];

/// npm, yarn and bun: `workspaces` in the root `package.json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PackageJsonWorkspaces;

impl WorkspaceResolver for PackageJsonWorkspaces {
    fn resolve(&self, root: &Path) -> Result<Workspace> {
        let manifest = read_json(&root.join(MANIFEST_FILE))?;
        let globs = manifest
            .get("workspaces")
            .and_then(parse_workspace_globs)
            .unwrap_or_default();

        let members = expand_member_globs(root, &globs)?
            .into_iter()
            .filter_map(|dir| read_member(&dir))
            .collect();

        Ok(Workspace {
            root: Package {
                name: manifest_name(&manifest, root),
                path: root.to_path_buf(),
                workspace_globs: Some(globs),
            },
            members,
        })
    }

    fn is_root(&self, dir: &Path) -> bool {
        read_json(&dir.join(MANIFEST_FILE))
            .map(|manifest| manifest.get("workspaces").is_some())
            .unwrap_or(false)
    }
}

/// Deno: the `workspace` field of `deno.json` / `deno.jsonc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenoWorkspaces;

impl DenoWorkspaces {
    fn config(dir: &Path) -> Option<(PathBuf, Value)> {
        DENO_CONFIG_FILES.iter().find_map(|name| {
            let path = dir.join(name);
            let content = fs::read_to_string(&path).ok()?;
            match serde_json::from_str(&to_strict_json(&content)) {
                Ok(value) => Some((path, value)),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "ignoring malformed deno config");
                    None
                }
            }
        })
    }
}

impl WorkspaceResolver for DenoWorkspaces {
    fn resolve(&self, root: &Path) -> Result<Workspace> {
        let Some((config_path, config)) = Self::config(root) else {
            bail!("no deno.json in {}", root.display());
        };
        // `"workspace": ["./a"]` or `"workspace": { "members": ["./a"] }`
        let globs: Vec<String> = match config.get("workspace") {
            Some(Value::Array(arr)) => arr.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
            Some(Value::Object(obj)) => obj
                .get("members")
                .and_then(|m| m.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                .unwrap_or_default(),
            _ => bail!("{} declares no workspace", config_path.display()),
        };

        let members = expand_member_globs(root, &globs)?
            .into_iter()
            .filter_map(|dir| match Self::config(&dir) {
                Some((_, member_config)) => member_config
                    .get("name")
                    .and_then(|n| n.as_str())
                    .map(|name| Package {
                        name: name.to_string(),
                        path: dir.clone(),
                        workspace_globs: None,
                    })
                    .or_else(|| read_member(&dir)),
                None => read_member(&dir),
            })
            .collect();

        Ok(Workspace {
            root: Package {
                name: manifest_name(&config, root),
                path: root.to_path_buf(),
                workspace_globs: Some(globs),
            },
            members,
        })
    }

    fn is_root(&self, dir: &Path) -> bool {
        Self::config(dir).is_some_and(|(_, config)| config.get("workspace").is_some())
    }
}

/// Runs an external program and returns its stdout.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<String>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<String> {
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .with_context(|| format!("failed to run {}", program))?;
        if !output.status.success() {
            bail!(
                "{} {} exited with {}: {}",
                program,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        String::from_utf8(output.stdout).with_context(|| format!("{} printed invalid UTF-8", program))
    }
}

/// A manager that reports its own workspace projects as JSON.
pub struct CliWorkspaces {
    program: &'static str,
    args: &'static [&'static str],
    root_marker: &'static str,
    runner: Box<dyn CommandRunner>,
}

#[derive(Debug, Deserialize)]
struct ListedProject {
    name: Option<String>,
    path: PathBuf,
}

impl CliWorkspaces {
    pub fn pnpm(runner: Box<dyn CommandRunner>) -> Self {
        Self {
            program: "pnpm",
            args: &["list", "--recursive", "--depth", "-1", "--json"],
            root_marker: "pnpm-workspace.yaml",
            runner,
        }
    }
}

impl WorkspaceResolver for CliWorkspaces {
    fn resolve(&self, root: &Path) -> Result<Workspace> {
        let stdout = self.runner.run(self.program, self.args, root)?;
        let projects: Vec<ListedProject> = serde_json::from_str(&stdout)
            .with_context(|| format!("unexpected `{} list` output", self.program))?;
        debug!(program = self.program, count = projects.len(), "listed workspace projects");

        let mut root_package = None;
        let mut members = Vec::new();
        for project in projects {
            let name = project
                .name
                .unwrap_or_else(|| dir_name(&project.path));
            let package = Package {
                name,
                path: project.path,
                workspace_globs: None,
            };
            if package.path == root {
                root_package = Some(package);
            } else {
                members.push(package);
            }
        }

        let root_package = root_package.unwrap_or_else(|| Package {
            name: dir_name(root),
            path: root.to_path_buf(),
            workspace_globs: None,
        });
        Ok(Workspace {
            root: root_package,
            members,
        })
    }

    fn is_root(&self, dir: &Path) -> bool {
        dir.join(self.root_marker).is_file()
    }
}

/// Directories under `root` matching the member globs, in path order.
///
/// `!pattern` entries exclude. `node_modules` is never descended into.
pub fn expand_member_globs(root: &Path, globs: &[String]) -> Result<Vec<PathBuf>> {
    let include = build_globset(globs.iter().filter(|g| !g.starts_with('!')).map(String::as_str))?;
    let exclude = build_globset(globs.iter().filter_map(|g| g.strip_prefix('!')))?;

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .filter_entry(|entry| entry.file_name() != "node_modules" && entry.file_name() != ".git")
        .build();

    let mut dirs = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(error = %err, "skipping unreadable workspace entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_dir()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        if include.is_match(relative) && !exclude.is_match(relative) {
            dirs.push(entry.path().to_path_buf());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn build_globset<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.trim_start_matches("./").trim_end_matches('/');
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid workspace glob: {}", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

fn read_member(dir: &Path) -> Option<Package> {
    let manifest = read_json(&dir.join(MANIFEST_FILE)).ok()?;
    let Some(name) = manifest.get("name").and_then(|n| n.as_str()) else {
        debug!(dir = %dir.display(), "workspace member has no name");
        return None;
    };
    Some(Package {
        name: name.to_string(),
        path: dir.to_path_buf(),
        workspace_globs: manifest.get("workspaces").and_then(parse_workspace_globs),
    })
}

fn read_json(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn manifest_name(manifest: &Value, dir: &Path) -> String {
    manifest
        .get("name")
        .and_then(|n| n.as_str())
        .map(String::from)
        .unwrap_or_else(|| dir_name(dir))
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
