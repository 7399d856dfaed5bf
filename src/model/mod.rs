use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Extensions parsed with the plain JavaScript grammar.
pub const PLAIN_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "jsx"];

/// Extensions parsed with the TypeScript grammar.
pub const TYPED_EXTENSIONS: &[&str] = &["ts", "mts", "cts", "tsx"];

/// Extensions that carry data only and never contain specifiers.
pub const DATA_EXTENSIONS: &[&str] = &["json"];

/// Syntactic kind of a source file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    /// JavaScript (`.js`, `.mjs`, `.cjs`, `.jsx`).
    Plain,
    /// TypeScript (`.ts`, `.mts`, `.cts`, `.tsx`).
    Typed,
    /// JSON data files.
    Data,
}

impl FileKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        if PLAIN_EXTENSIONS.contains(&ext) {
            Some(FileKind::Plain)
        } else if TYPED_EXTENSIONS.contains(&ext) {
            Some(FileKind::Typed)
        } else if DATA_EXTENSIONS.contains(&ext) {
            Some(FileKind::Data)
        } else {
            None
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Plain => "javascript",
            FileKind::Typed => "typescript",
            FileKind::Data => "json",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable source file as read from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub directory: PathBuf,
    pub basename: String,
    pub contents: String,
}

impl SourceFile {
    pub fn new(path: PathBuf, contents: String) -> Self {
        let directory = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            directory,
            basename,
            contents,
        }
    }

    pub fn kind(&self) -> Option<FileKind> {
        FileKind::from_path(&self.path)
    }
}

/// A specifier that resolved to a local file, tagged with the rule that matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedDependency {
    /// `./foo`, `../bar`, or an absolute path.
    RelativePath { specifier: String, path: PathBuf },
    /// Matched a `compilerOptions.paths` alias.
    AliasResolvedPath {
        specifier: String,
        path: PathBuf,
        pattern: String,
        target: String,
    },
    /// Resolved against `compilerOptions.baseUrl`.
    BasePathRelativePath { specifier: String, path: PathBuf },
    /// Resolved against the directory of the nearest `package.json`.
    PackageRelativePath { specifier: String, path: PathBuf },
    /// Named a member package of the current workspace.
    WorkspacePackagePath {
        specifier: String,
        path: PathBuf,
        package: String,
    },
}

impl ResolvedDependency {
    pub fn specifier(&self) -> &str {
        match self {
            ResolvedDependency::RelativePath { specifier, .. }
            | ResolvedDependency::AliasResolvedPath { specifier, .. }
            | ResolvedDependency::BasePathRelativePath { specifier, .. }
            | ResolvedDependency::PackageRelativePath { specifier, .. }
            | ResolvedDependency::WorkspacePackagePath { specifier, .. } => specifier,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ResolvedDependency::RelativePath { path, .. }
            | ResolvedDependency::AliasResolvedPath { path, .. }
            | ResolvedDependency::BasePathRelativePath { path, .. }
            | ResolvedDependency::PackageRelativePath { path, .. }
            | ResolvedDependency::WorkspacePackagePath { path, .. } => path,
        }
    }

    pub fn rule(&self) -> &'static str {
        match self {
            ResolvedDependency::RelativePath { .. } => "relative",
            ResolvedDependency::AliasResolvedPath { .. } => "alias",
            ResolvedDependency::BasePathRelativePath { .. } => "base_path",
            ResolvedDependency::PackageRelativePath { .. } => "package",
            ResolvedDependency::WorkspacePackagePath { .. } => "workspace",
        }
    }
}

/// A specifier that looked local but matched no file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingDependency {
    pub specifier: String,
    pub attempted_path: PathBuf,
}

/// A specifier assumed to name a third-party module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalDependency {
    pub specifier: String,
}

/// The outcome of classifying one specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Local(ResolvedDependency),
    Missing(MissingDependency),
    External(ExternalDependency),
}

/// Every classified specifier of one file, in source order per bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileDependencies {
    pub local: Vec<ResolvedDependency>,
    pub missing: Vec<MissingDependency>,
    pub external: Vec<ExternalDependency>,
}

impl FileDependencies {
    pub fn push(&mut self, classification: Classification) {
        match classification {
            Classification::Local(dep) => self.local.push(dep),
            Classification::Missing(dep) => self.missing.push(dep),
            Classification::External(dep) => self.external.push(dep),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.missing.is_empty() && self.external.is_empty()
    }
}

/// Extract the package name from a bare specifier.
///
/// `"react"` -> `"react"`, `"@types/node"` -> `"@types/node"`,
/// `"lodash/debounce"` -> `"lodash"`, `"node:fs"` -> `"fs"`.
pub fn package_name(specifier: &str) -> &str {
    let specifier = specifier.strip_prefix("node:").unwrap_or(specifier);
    if specifier.starts_with('@') {
        match specifier.find('/') {
            Some(first_slash) => match specifier[first_slash + 1..].find('/') {
                Some(second_slash) => &specifier[..first_slash + 1 + second_slash],
                None => specifier,
            },
            None => specifier,
        }
    } else {
        match specifier.find('/') {
            Some(slash) => &specifier[..slash],
            None => specifier,
        }
    }
}

/// Whether a specifier is syntactically a local path.
pub fn is_local_path(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || Path::new(specifier).is_absolute()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kind_from_path() {
        assert_eq!(FileKind::from_path(Path::new("a.ts")), Some(FileKind::Typed));
        assert_eq!(FileKind::from_path(Path::new("a.mts")), Some(FileKind::Typed));
        assert_eq!(FileKind::from_path(Path::new("a.cjs")), Some(FileKind::Plain));
        assert_eq!(FileKind::from_path(Path::new("a.json")), Some(FileKind::Data));
        assert_eq!(FileKind::from_path(Path::new("a.css")), None);
        assert_eq!(FileKind::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_source_file_parts() {
        let file = SourceFile::new(PathBuf::from("/p/src/a.ts"), String::new());
        assert_eq!(file.directory, PathBuf::from("/p/src"));
        assert_eq!(file.basename, "a.ts");
    }

    #[test]
    fn test_package_name() {
        assert_eq!(package_name("react"), "react");
        assert_eq!(package_name("lodash/debounce"), "lodash");
        assert_eq!(package_name("@types/node"), "@types/node");
        assert_eq!(package_name("@angular/core/testing"), "@angular/core");
        assert_eq!(package_name("@scope"), "@scope");
        assert_eq!(package_name("node:fs/promises"), "fs");
    }

    #[test]
    fn test_is_local_path() {
        assert!(is_local_path("./a"));
        assert!(is_local_path("../a"));
        assert!(is_local_path("/abs/a"));
        assert!(!is_local_path("react"));
        assert!(!is_local_path(".hidden"));
        assert!(!is_local_path("@/alias"));
    }
}
