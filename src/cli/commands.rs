use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::warn;

use crate::collector::DependencyResolver;
use crate::config::{load_project_config, ResolverConfig};
use crate::error::ResolveError;
use crate::resolver::normalize_path;
use crate::source::SourceCache;
use crate::workspace::{detect_package_manager, locate_workspace, DetectionEnv, Workspace};

use super::output::{format_collection, format_resolve_reports, format_workspace, ResolveReport};
use super::{OutputFormat, SessionArgs};

/// Load the project config and apply command-line overrides.
pub fn load_settings(project_path: &Path, args: &SessionArgs) -> Result<ResolverConfig> {
    let mut config = load_project_config(project_path, args.config.as_deref())?;
    config
        .supported_modules
        .extend(args.supported_modules.iter().cloned());
    if args.no_check_external {
        config.check_unsupported_modules = false;
    }
    if args.restricted {
        config.restricted = true;
    }
    Ok(config)
}

/// Build a resolver session for the project.
///
/// Workspace detection failures are logged and the session continues
/// without workspace information.
pub fn build_session(project_path: &Path, args: &SessionArgs) -> Result<DependencyResolver> {
    let config = load_settings(project_path, args)?;
    let workspace = if args.no_workspace {
        None
    } else {
        detect_workspace(project_path)
    };
    Ok(
        DependencyResolver::new(SourceCache::disk(), config.resolver_options(project_path))
            .with_workspace(workspace),
    )
}

fn detect_workspace(project_path: &Path) -> Option<Workspace> {
    match locate_workspace(project_path, &DetectionEnv::from_process()) {
        Ok(found) => found.map(|(_, workspace)| workspace),
        Err(err) => {
            warn!(error = %format!("{:#}", err), "workspace detection failed");
            None
        }
    }
}

/// Run the `resolve` command. Returns the output and whether any entrypoint failed.
pub fn run_resolve(
    project_path: &Path,
    entrypoints: &[PathBuf],
    args: &SessionArgs,
    format: &OutputFormat,
) -> Result<(String, bool)> {
    let session = build_session(project_path, args)?;
    let entrypoints: Vec<PathBuf> = entrypoints
        .iter()
        .map(|entry| normalize_path(&project_path.join(entry)))
        .collect();

    let reports: Vec<ResolveReport> = entrypoints
        .iter()
        .zip(session.resolve_all(&entrypoints))
        .map(|(entry, result)| match result {
            Ok(resolved) => ResolveReport::resolved(&resolved),
            Err(ResolveError::Dependencies(problems)) => ResolveReport::problems(entry, problems),
            Err(err) => ResolveReport::failed(entry, &err),
        })
        .collect();

    let has_problems = reports.iter().any(|r| !r.is_ok());
    Ok((format_resolve_reports(&reports, format), has_problems))
}

/// Run the `collect` command.
pub fn run_collect(
    project_path: &Path,
    root: &Path,
    args: &SessionArgs,
    format: &OutputFormat,
) -> Result<(String, bool)> {
    let root = normalize_path(&project_path.join(root));
    let config = load_settings(&root, args)?;
    if config.match_rules.is_empty() {
        anyhow::bail!(
            "No match rules configured. Add [[match_rules]] to .depscope/config.toml or depscope.toml."
        );
    }
    let session = build_session(&root, args)?;
    let collection = session.collect_matched(&root, &config.match_rules);
    let has_errors = !collection.errors.is_empty();
    Ok((format_collection(&collection, format), has_errors))
}

/// Run the `workspace` command.
pub fn run_workspace(project_path: &Path, path: &Path, format: &OutputFormat) -> Result<String> {
    let dir = normalize_path(&project_path.join(path));
    let env = DetectionEnv::from_process();
    match locate_workspace(&dir, &env)? {
        Some((detection, workspace)) => Ok(format_workspace(&detection, Some(&workspace), format)),
        None => {
            let detection = detect_package_manager(&dir, &env);
            Ok(format_workspace(&detection, None, format))
        }
    }
}
