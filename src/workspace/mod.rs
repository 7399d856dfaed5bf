//! Package manager detection and monorepo workspace membership.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

pub mod detect;
pub mod members;

pub use detect::{detect_package_manager, Detection, DetectionEnv, DetectionSource, PackageManager};
pub use members::{CliWorkspaces, CommandRunner, DenoWorkspaces, PackageJsonWorkspaces, SystemCommandRunner};

/// One package of a workspace (the root or a member).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub name: String,
    pub path: PathBuf,
    /// Member globs, only set on a root that declares them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_globs: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workspace {
    pub root: Package,
    pub members: Vec<Package>,
}

impl Workspace {
    /// Member with the given package name. The root is also matched.
    pub fn by_name(&self, name: &str) -> Option<&Package> {
        self.members
            .iter()
            .find(|p| p.name == name)
            .or_else(|| (self.root.name == name).then_some(&self.root))
    }

    /// The innermost package whose directory contains `path`.
    pub fn by_path(&self, path: &Path) -> Option<&Package> {
        self.members
            .iter()
            .filter(|p| path.starts_with(&p.path))
            .max_by_key(|p| p.path.components().count())
            .or_else(|| self.contains(path).then_some(&self.root))
    }

    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root.path)
    }
}

/// Lists the packages of a workspace rooted at a directory.
///
/// One implementation per package manager family; tests substitute fakes.
pub trait WorkspaceResolver {
    fn resolve(&self, root: &Path) -> Result<Workspace>;

    /// Whether `dir` is the root of a workspace for this manager.
    fn is_root(&self, dir: &Path) -> bool;
}

/// Walk up from `start` to the first directory the resolver accepts as root.
pub fn find_workspace_root(start: &Path, resolver: &dyn WorkspaceResolver) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| resolver.is_root(dir))
        .map(Path::to_path_buf)
}

/// Detect the package manager for `start`, find its workspace root and list
/// the members. `Ok(None)` when `start` is not inside a workspace.
pub fn locate_workspace(start: &Path, env: &DetectionEnv) -> Result<Option<(Detection, Workspace)>> {
    let detection = detect_package_manager(start, env);
    let resolver = detection.manager.workspace_resolver();
    let Some(root) = find_workspace_root(start, resolver.as_ref()) else {
        debug!(start = %start.display(), manager = %detection.manager, "no workspace root found");
        return Ok(None);
    };
    let workspace = resolver.resolve(&root)?;
    debug!(
        root = %workspace.root.path.display(),
        members = workspace.members.len(),
        "resolved workspace"
    );
    Ok(Some((detection, workspace)))
}
