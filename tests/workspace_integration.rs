use std::fs;
use std::path::{Path, PathBuf};

use depscope::collector::{DependencyResolver, ResolverOptions};
use depscope::error::ResolveError;
use depscope::model::ResolvedDependency;
use depscope::source::SourceCache;
use depscope::workspace::{
    find_workspace_root, locate_workspace, CliWorkspaces, CommandRunner, DetectionEnv,
    DetectionSource, PackageManager, Workspace, WorkspaceResolver,
};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// An npm monorepo under `<tmp>/repo` with a sibling directory outside it:
///
///   repo/packages/core   (@acme/core, main src/index.ts)
///   repo/apps/web        (web, with checks/ importing @acme/core)
///   shared/outside.js    (not part of the workspace)
fn setup_monorepo() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(
        root,
        "repo/package.json",
        r#"{ "name": "monorepo", "private": true, "workspaces": ["packages/*", "apps/*"] }"#,
    );
    write(root, "repo/package-lock.json", "{}");
    write(
        root,
        "repo/packages/core/package.json",
        r#"{ "name": "@acme/core", "main": "src/index.ts" }"#,
    );
    write(
        root,
        "repo/packages/core/src/index.ts",
        "export { add } from './math';\n",
    );
    write(
        root,
        "repo/packages/core/src/math.ts",
        "export const add = (a: number, b: number): number => a + b;\n",
    );
    write(root, "repo/apps/web/package.json", r#"{ "name": "web" }"#);
    write(
        root,
        "repo/apps/web/checks/home.spec.ts",
        "import { add } from '@acme/core';\nimport * as math from '@acme/core/src/math';\n\nadd(1, 2);\n",
    );
    write(
        root,
        "repo/apps/web/checks/escape.spec.js",
        "module.exports = require('../../../../shared/outside');\n",
    );
    write(root, "shared/outside.js", "module.exports = 42;\n");
    tmp
}

fn detect(start: &Path) -> Workspace {
    let (detection, workspace) = locate_workspace(start, &DetectionEnv::default())
        .unwrap()
        .expect("workspace should be found");
    assert_eq!(detection.manager, PackageManager::Npm);
    assert_eq!(detection.source, DetectionSource::Lockfile);
    workspace
}

#[test]
fn test_locate_workspace_from_member() {
    let tmp = setup_monorepo();
    let repo = tmp.path().join("repo");
    let workspace = detect(&repo.join("apps/web"));

    assert_eq!(workspace.root.path, repo);
    assert_eq!(workspace.root.name, "monorepo");
    let members: Vec<(&str, PathBuf)> = workspace
        .members
        .iter()
        .map(|m| (m.name.as_str(), m.path.clone()))
        .collect();
    assert_eq!(
        members,
        vec![
            ("web", repo.join("apps/web")),
            ("@acme/core", repo.join("packages/core")),
        ]
    );
}

#[test]
fn test_no_workspace_outside_monorepo() {
    let tmp = setup_monorepo();
    let found = locate_workspace(&tmp.path().join("shared"), &DetectionEnv::default()).unwrap();
    assert!(found.is_none());
}

#[test]
fn test_member_package_resolves_to_its_sources() {
    let tmp = setup_monorepo();
    let repo = tmp.path().join("repo");
    let workspace = detect(&repo);
    let resolver = DependencyResolver::new(SourceCache::disk(), ResolverOptions::default())
        .with_workspace(Some(workspace));

    let entry = repo.join("apps/web/checks/home.spec.ts");
    let resolved = resolver.resolve(&entry).unwrap();
    let mut files: Vec<PathBuf> = resolved.files.iter().map(|f| f.path.clone()).collect();
    files.sort();
    assert_eq!(
        files,
        vec![
            repo.join("packages/core/src/index.ts"),
            repo.join("packages/core/src/math.ts"),
        ]
    );

    let entry_file = resolver.sources().load(&entry).unwrap();
    let analysis = resolver.analyze(&entry_file).unwrap();
    for dep in &analysis.dependencies.local {
        match dep {
            ResolvedDependency::WorkspacePackagePath { package, .. } => {
                assert_eq!(package, "@acme/core")
            }
            other => panic!("expected workspace resolution, got {:?}", other),
        }
    }
}

#[test]
fn test_without_workspace_member_is_external() {
    let tmp = setup_monorepo();
    let repo = tmp.path().join("repo");
    let resolver = DependencyResolver::new(
        SourceCache::disk(),
        ResolverOptions {
            check_unsupported_modules: false,
            ..Default::default()
        },
    );
    let resolved = resolver
        .resolve(&repo.join("apps/web/checks/home.spec.ts"))
        .unwrap();
    assert!(resolved.files.is_empty());
}

#[test]
fn test_restricted_rejects_files_outside_workspace() {
    let tmp = setup_monorepo();
    let repo = tmp.path().join("repo");
    let entry = repo.join("apps/web/checks/escape.spec.js");

    let open = DependencyResolver::new(SourceCache::disk(), ResolverOptions::default())
        .with_workspace(Some(detect(&repo)));
    let resolved = open.resolve(&entry).unwrap();
    assert_eq!(resolved.files.len(), 1);
    assert_eq!(resolved.files[0].path, tmp.path().join("shared/outside.js"));

    let restricted = DependencyResolver::new(
        SourceCache::disk(),
        ResolverOptions {
            restricted: true,
            ..Default::default()
        },
    )
    .with_workspace(Some(detect(&repo)));
    match restricted.resolve(&entry) {
        Err(ResolveError::Dependencies(problems)) => {
            assert_eq!(problems.missing_files, vec![tmp.path().join("shared/outside")]);
        }
        other => panic!("expected missing file, got {:?}", other.map(|r| r.files.len())),
    }
}

struct FakePnpm {
    output: String,
}

impl CommandRunner for FakePnpm {
    fn run(&self, program: &str, args: &[&str], _cwd: &Path) -> anyhow::Result<String> {
        assert_eq!(program, "pnpm");
        assert!(args.contains(&"--json"));
        Ok(self.output.clone())
    }
}

#[test]
fn test_pnpm_workspace_listed_by_command() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "pnpm-workspace.yaml", "packages:\n  - 'packages/*'\n");
    write(root, "pnpm-lock.yaml", "lockfileVersion: '9.0'\n");
    write(root, "packages/ui/src/button.ts", "export const button = 1;\n");

    let detection = depscope::workspace::detect_package_manager(
        &root.join("packages/ui"),
        &DetectionEnv::default(),
    );
    assert_eq!(detection.manager, PackageManager::Pnpm);

    let output = serde_json::json!([
        { "name": "pnpm-root", "path": root },
        { "name": "@acme/ui", "path": root.join("packages/ui") },
    ])
    .to_string();
    let resolver = CliWorkspaces::pnpm(Box::new(FakePnpm { output }));

    let found = find_workspace_root(&root.join("packages/ui/src"), &resolver).unwrap();
    assert_eq!(found, root);

    let workspace = resolver.resolve(&found).unwrap();
    assert_eq!(workspace.root.name, "pnpm-root");
    assert_eq!(workspace.members.len(), 1);
    assert_eq!(
        workspace.by_path(&root.join("packages/ui/src/button.ts")).unwrap().name,
        "@acme/ui"
    );
}

#[test]
fn test_user_agent_overrides_lockfile() {
    let tmp = setup_monorepo();
    let env = DetectionEnv {
        user_agent: Some("yarn/1.22.19 npm/? node/v20.11.0 linux x64".to_string()),
        ..Default::default()
    };
    let (detection, workspace) = locate_workspace(&tmp.path().join("repo/apps/web"), &env)
        .unwrap()
        .unwrap();
    assert_eq!(detection.manager, PackageManager::Yarn);
    assert_eq!(detection.source, DetectionSource::UserAgent);
    assert_eq!(workspace.members.len(), 2);
}
