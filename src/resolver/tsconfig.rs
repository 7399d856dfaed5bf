use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::alias::{AliasMatcher, PathAliasResolver};
use super::normalize_path;

/// Config file names probed in each directory, in order.
pub const PROJECT_CONFIG_FILES: &[&str] = &["tsconfig.json", "jsconfig.json"];

/// Guard against `extends` cycles.
const MAX_EXTENDS_DEPTH: usize = 16;

/// `compilerOptions.moduleResolution`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleResolution {
    Classic,
    #[default]
    Node10,
    Node16,
    NodeNext,
    Bundler,
}

impl ModuleResolution {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "classic" => Some(ModuleResolution::Classic),
            "node" | "node10" => Some(ModuleResolution::Node10),
            "node16" => Some(ModuleResolution::Node16),
            "nodenext" => Some(ModuleResolution::NodeNext),
            "bundler" => Some(ModuleResolution::Bundler),
            _ => None,
        }
    }

    /// Classic resolution never looks at `package.json` inside directories.
    pub fn allows_directory_packages(&self) -> bool {
        !matches!(self, ModuleResolution::Classic)
    }
}

/// Parsed tsconfig.json / jsconfig.json relevant to import resolution.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub config_path: PathBuf,
    /// The directory containing the config file.
    pub base_path: PathBuf,
    /// `compilerOptions.baseUrl`, resolved to an absolute path.
    pub base_url: Option<PathBuf>,
    /// `compilerOptions.paths`, most specific first.
    pub aliases: PathAliasResolver,
    pub module_resolution: ModuleResolution,
    pub out_dir: Option<PathBuf>,
    pub root_dir: Option<PathBuf>,
    pub root_dirs: Vec<PathBuf>,
    pub composite: bool,
}

/// Options from one config file, before `extends` merging.
#[derive(Debug, Default)]
struct RawOptions {
    base_url: Option<PathBuf>,
    /// The `paths` object plus the directory of the config that declared it.
    paths: Option<(Map<String, Value>, PathBuf)>,
    module_resolution: Option<ModuleResolution>,
    out_dir: Option<PathBuf>,
    root_dir: Option<PathBuf>,
    root_dirs: Option<Vec<PathBuf>>,
    composite: Option<bool>,
}

impl RawOptions {
    /// Child options win; anything unset falls back to the parent.
    fn over(self, parent: RawOptions) -> RawOptions {
        RawOptions {
            base_url: self.base_url.or(parent.base_url),
            paths: self.paths.or(parent.paths),
            module_resolution: self.module_resolution.or(parent.module_resolution),
            out_dir: self.out_dir.or(parent.out_dir),
            root_dir: self.root_dir.or(parent.root_dir),
            root_dirs: self.root_dirs.or(parent.root_dirs),
            composite: self.composite.or(parent.composite),
        }
    }
}

impl ProjectConfig {
    /// Load a config file, following relative `extends` through `read`.
    pub fn load(config_path: &Path, read: &dyn Fn(&Path) -> io::Result<String>) -> Result<Self> {
        let content = read(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        Self::parse_with(&content, config_path, read)
    }

    /// Parse config content from a string. `extends` is not followed.
    pub fn parse_from_str(content: &str, config_path: &Path) -> Result<Self> {
        let no_parent = |p: &Path| -> io::Result<String> {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("not loading {}", p.display()),
            ))
        };
        Self::parse_with(content, config_path, &no_parent)
    }

    fn parse_with(
        content: &str,
        config_path: &Path,
        read: &dyn Fn(&Path) -> io::Result<String>,
    ) -> Result<Self> {
        let raw = load_raw(content, config_path, read, 0)?;
        let base_path = config_dir(config_path);

        let aliases = match &raw.paths {
            Some((paths, declaring_dir)) => {
                // The base for path resolution: baseUrl if set, otherwise the
                // directory of the config that declared `paths`.
                let resolution_base = raw.base_url.as_deref().unwrap_or(declaring_dir);
                parse_paths(paths, resolution_base)
            }
            None => PathAliasResolver::default(),
        };

        Ok(ProjectConfig {
            config_path: config_path.to_path_buf(),
            base_path,
            base_url: raw.base_url,
            aliases,
            module_resolution: raw.module_resolution.unwrap_or_default(),
            out_dir: raw.out_dir,
            root_dir: raw.root_dir,
            root_dirs: raw.root_dirs.unwrap_or_default(),
            composite: raw.composite.unwrap_or(false),
        })
    }

    /// Source locations to probe for a path, compiled-output mapping first.
    ///
    /// A path under `outDir` is mapped back into `rootDir` and every
    /// `rootDirs` entry (the config directory when neither is set); the
    /// original path is always the last candidate.
    pub fn source_paths_for(&self, path: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(out_dir) = &self.out_dir {
            if let Ok(relative) = path.strip_prefix(out_dir) {
                let mut roots: Vec<&PathBuf> = self.root_dir.iter().collect();
                roots.extend(self.root_dirs.iter());
                if roots.is_empty() {
                    paths.push(self.base_path.join(relative));
                } else {
                    paths.extend(roots.into_iter().map(|root| root.join(relative)));
                }
            }
        }
        paths.push(path.to_path_buf());
        paths.dedup();
        paths
    }
}

fn config_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap_or(Path::new("."))
        .to_path_buf()
}

fn load_raw(
    content: &str,
    config_path: &Path,
    read: &dyn Fn(&Path) -> io::Result<String>,
    depth: usize,
) -> Result<RawOptions> {
    let dir = config_dir(config_path);
    let json: Value = serde_json::from_str(&to_strict_json(content))
        .with_context(|| format!("invalid JSON in {}", config_path.display()))?;

    let own = parse_compiler_options(json.get("compilerOptions"), &dir);

    let parents: Vec<&str> = match json.get("extends") {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(arr)) => arr.iter().filter_map(|v| v.as_str()).collect(),
        _ => Vec::new(),
    };

    // Later entries in an `extends` array override earlier ones.
    let mut inherited = RawOptions::default();
    for parent in parents {
        if depth >= MAX_EXTENDS_DEPTH {
            warn!(config = %config_path.display(), "extends chain too deep, ignoring parent");
            break;
        }
        let Some(parent_path) = extends_path(parent, &dir) else {
            debug!(config = %config_path.display(), extends = parent, "skipping package extends");
            continue;
        };
        let parent_options = read(&parent_path)
            .map_err(anyhow::Error::from)
            .and_then(|text| load_raw(&text, &parent_path, read, depth + 1));
        match parent_options {
            Ok(options) => inherited = options.over(inherited),
            Err(err) => {
                debug!(config = %config_path.display(), extends = parent, error = %err, "cannot load parent config")
            }
        }
    }

    Ok(own.over(inherited))
}

/// Only file-path `extends` values are followed.
fn extends_path(value: &str, dir: &Path) -> Option<PathBuf> {
    if !(value.starts_with('.') || Path::new(value).is_absolute()) {
        return None;
    }
    let mut path = normalize_path(&dir.join(value));
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        let mut name = path.into_os_string();
        name.push(".json");
        path = PathBuf::from(name);
    }
    Some(path)
}

fn parse_compiler_options(compiler_options: Option<&Value>, dir: &Path) -> RawOptions {
    let Some(options) = compiler_options else {
        return RawOptions::default();
    };
    let dir_option = |key: &str| {
        options
            .get(key)
            .and_then(|v| v.as_str())
            .map(|p| normalize_path(&dir.join(p)))
    };

    RawOptions {
        base_url: dir_option("baseUrl"),
        paths: options
            .get("paths")
            .and_then(|p| p.as_object())
            .map(|obj| (obj.clone(), dir.to_path_buf())),
        module_resolution: options
            .get("moduleResolution")
            .and_then(|v| v.as_str())
            .and_then(ModuleResolution::parse),
        out_dir: dir_option("outDir"),
        root_dir: dir_option("rootDir"),
        root_dirs: options.get("rootDirs").and_then(|v| v.as_array()).map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|p| normalize_path(&dir.join(p)))
                .collect()
        }),
        composite: options.get("composite").and_then(|v| v.as_bool()),
    }
}

fn parse_paths(paths: &Map<String, Value>, resolution_base: &Path) -> PathAliasResolver {
    let matchers = paths
        .iter()
        .filter_map(|(pattern, targets)| {
            let targets: Vec<String> = targets
                .as_array()?
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect();
            Some(AliasMatcher::new(pattern, &targets, resolution_base))
        })
        .collect();
    PathAliasResolver::new(matchers)
}

/// Turn JSON-with-comments into strict JSON: drop `//` and `/* */` comments
/// and trailing commas, leaving string contents untouched.
pub fn to_strict_json(source: &str) -> String {
    let without_comments = strip_comments(source);
    strip_trailing_commas(&without_comments)
}

fn strip_comments(source: &str) -> String {
    let mut result = String::with_capacity(source.len());
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut i = 0;
    let mut in_string = false;

    while i < len {
        if in_string {
            result.push(chars[i]);
            if chars[i] == '\\' && i + 1 < len {
                result.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if chars[i] == '"' {
                in_string = false;
            }
            i += 1;
        } else if i + 1 < len && chars[i] == '/' && chars[i + 1] == '/' {
            while i < len && chars[i] != '\n' {
                i += 1;
            }
        } else if i + 1 < len && chars[i] == '/' && chars[i + 1] == '*' {
            i += 2;
            while i + 1 < len && !(chars[i] == '*' && chars[i + 1] == '/') {
                // Preserve newlines so error positions stay meaningful
                if chars[i] == '\n' {
                    result.push('\n');
                }
                i += 1;
            }
            i += 2;
        } else {
            if chars[i] == '"' {
                in_string = true;
            }
            result.push(chars[i]);
            i += 1;
        }
    }

    result
}

fn strip_trailing_commas(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut result = String::with_capacity(source.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            result.push(c);
            if c == '\\' && i + 1 < chars.len() {
                result.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if !matches!(next, Some('}') | Some(']')) {
                result.push(c);
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            result.push(c);
        }
        i += 1;
    }

    result
}
