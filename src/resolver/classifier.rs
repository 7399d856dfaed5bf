use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::model::{
    is_local_path, package_name, Classification, ExternalDependency, MissingDependency,
    ResolvedDependency, SourceFile,
};
use crate::source::SourceCache;
use crate::workspace::Workspace;

use super::descriptors::DescriptorCache;
use super::extensions::{candidates_for, Candidate};
use super::normalize_path;
use super::tsconfig::ProjectConfig;

/// Limits `main` -> directory -> `package.json` -> `main` chains.
const MAX_MANIFEST_DEPTH: usize = 8;

/// Decides what a specifier refers to, from the point of view of one file.
///
/// Rules are tried in a fixed order and the first one that finds an existing
/// file wins:
///
/// 1. local paths (`./x`, `../x`, absolute), relative to the importing file
/// 2. `compilerOptions.paths` aliases
/// 3. `compilerOptions.baseUrl`
/// 4. the nearest `package.json` directory, unless it declares `exports`
/// 5. a member package of the workspace, when one is known
///
/// Anything else is external. A local path that matches nothing is missing.
pub struct DependencyClassifier<'a> {
    sources: &'a SourceCache,
    descriptors: &'a DescriptorCache,
    workspace: Option<&'a Workspace>,
    boundary: Option<PathBuf>,
}

impl<'a> DependencyClassifier<'a> {
    pub fn new(sources: &'a SourceCache, descriptors: &'a DescriptorCache) -> Self {
        Self {
            sources,
            descriptors,
            workspace: None,
            boundary: None,
        }
    }

    pub fn with_workspace(mut self, workspace: Option<&'a Workspace>) -> Self {
        self.workspace = workspace;
        self
    }

    /// Reject every resolution that lands outside `boundary`.
    pub fn restricted_to(mut self, boundary: Option<PathBuf>) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn classify(&self, file: &SourceFile, specifier: &str) -> Classification {
        let classification = self.classify_inner(file, specifier);
        match &classification {
            Classification::Local(dep) => {
                trace!(file = %file.path.display(), specifier, rule = dep.rule(), path = %dep.path().display(), "resolved")
            }
            Classification::Missing(dep) => {
                debug!(file = %file.path.display(), specifier, attempted = %dep.attempted_path.display(), "missing")
            }
            Classification::External(_) => {
                trace!(file = %file.path.display(), specifier, "external")
            }
        }
        classification
    }

    fn classify_inner(&self, file: &SourceFile, specifier: &str) -> Classification {
        if specifier.starts_with("node:") {
            return external(specifier);
        }

        let config = self
            .descriptors
            .project_config_for(&file.directory, self.sources);
        let config = config.as_deref();

        if is_local_path(specifier) {
            let target = normalize_path(&file.directory.join(specifier));
            return match self.lookup(&target, config, 0) {
                Some(path) => Classification::Local(ResolvedDependency::RelativePath {
                    specifier: specifier.to_string(),
                    path,
                }),
                None => Classification::Missing(MissingDependency {
                    specifier: specifier.to_string(),
                    attempted_path: target,
                }),
            };
        }

        if let Some(config) = config {
            for candidate in config.aliases.candidates(specifier) {
                let target = normalize_path(&candidate.path);
                if let Some(path) = self.lookup(&target, Some(config), 0) {
                    return Classification::Local(ResolvedDependency::AliasResolvedPath {
                        specifier: specifier.to_string(),
                        path,
                        pattern: candidate.pattern,
                        target: candidate.target,
                    });
                }
            }

            if let Some(base_url) = &config.base_url {
                let target = normalize_path(&base_url.join(specifier));
                if let Some(path) = self.lookup(&target, Some(config), 0) {
                    return Classification::Local(ResolvedDependency::BasePathRelativePath {
                        specifier: specifier.to_string(),
                        path,
                    });
                }
            }
        }

        if let Some(package) = self.descriptors.package_for(&file.directory, self.sources) {
            if !package.has_explicit_export_map {
                let target = normalize_path(&package.package_relative_path(specifier));
                if let Some(path) = self.lookup(&target, config, 0) {
                    return Classification::Local(ResolvedDependency::PackageRelativePath {
                        specifier: specifier.to_string(),
                        path,
                    });
                }
            }
        }

        if let Some(resolved) = self.workspace_member(specifier) {
            return Classification::Local(resolved);
        }

        external(specifier)
    }

    /// `@scope/pkg` or `@scope/pkg/sub/path` naming a workspace member.
    fn workspace_member(&self, specifier: &str) -> Option<ResolvedDependency> {
        let workspace = self.workspace?;
        let name = package_name(specifier);
        let member = workspace.by_name(name)?;
        let subpath = specifier[name.len()..].trim_start_matches('/');
        let target = if subpath.is_empty() {
            member.path.clone()
        } else {
            normalize_path(&member.path.join(subpath))
        };
        let config = self
            .descriptors
            .project_config_for(&member.path, self.sources);
        // Restricted lookups through a package name stay inside that member.
        let scoped = DependencyClassifier {
            boundary: self.boundary.as_ref().map(|_| member.path.clone()),
            ..*self
        };
        let path = scoped.lookup(&target, config.as_deref(), 0)?;
        Some(ResolvedDependency::WorkspacePackagePath {
            specifier: specifier.to_string(),
            path,
            package: member.name.clone(),
        })
    }

    /// First existing, permitted file for `target`.
    ///
    /// Paths under the config's `outDir` are mapped back to their sources
    /// before extension substitution. A directory's `package.json` resolves
    /// through its entry points.
    fn lookup(&self, target: &Path, config: Option<&ProjectConfig>, depth: usize) -> Option<PathBuf> {
        let roots = match config {
            Some(config) => config.source_paths_for(target),
            None => vec![target.to_path_buf()],
        };
        let directory_packages =
            config.map_or(true, |c| c.module_resolution.allows_directory_packages());

        for root in roots {
            for candidate in candidates_for(&root) {
                match candidate {
                    Candidate::File(path) => {
                        if self.sources.is_file(&path) && self.permitted(&path) {
                            return Some(path);
                        }
                    }
                    Candidate::PackageManifest(manifest) => {
                        if !directory_packages || depth >= MAX_MANIFEST_DEPTH {
                            continue;
                        }
                        if let Some(path) = self.resolve_manifest(&manifest, depth) {
                            return Some(path);
                        }
                    }
                }
            }
        }
        None
    }

    fn resolve_manifest(&self, manifest: &Path, depth: usize) -> Option<PathBuf> {
        if !self.sources.is_file(manifest) {
            return None;
        }
        let dir = manifest.parent()?;
        let package = self.descriptors.package_for(dir, self.sources)?;
        // A malformed manifest leaves the nearest descriptor somewhere above.
        if package.manifest_path != manifest {
            return None;
        }
        let config = self.descriptors.project_config_for(dir, self.sources);
        package.entry_point_candidates.iter().find_map(|entry| {
            let target = normalize_path(&dir.join(entry));
            self.lookup(&target, config.as_deref(), depth + 1)
        })
    }

    fn permitted(&self, path: &Path) -> bool {
        match &self.boundary {
            Some(boundary) => {
                let inside = path.starts_with(boundary);
                if !inside {
                    debug!(path = %path.display(), boundary = %boundary.display(), "outside restricted boundary");
                }
                inside
            }
            None => true,
        }
    }
}

fn external(specifier: &str) -> Classification {
    Classification::External(ExternalDependency {
        specifier: specifier.to_string(),
    })
}
