use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use depscope::collector::{DependencyResolver, ResolverOptions};
use depscope::error::{DependencyProblems, ParseFailure, ResolveError, UnsupportedExternal};
use depscope::model::ResolvedDependency;
use depscope::parser::{ExtractorRegistry, TypedSyntax};
use depscope::source::{DiskLoader, SourceCache, SourceLoader};

fn fixture_source() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/checks_project")
}

/// Copy the fixture project to a temporary directory so tests don't conflict.
fn setup_project() -> tempfile::TempDir {
    let tmp = tempfile::TempDir::new().unwrap();
    copy_dir_recursive(&fixture_source(), tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let dst_path = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &dst_path)?;
        } else {
            std::fs::copy(entry.path(), &dst_path)?;
        }
    }
    Ok(())
}

/// Loader that records how often each path is read.
#[derive(Clone, Default)]
struct CountingLoader {
    reads: Rc<RefCell<HashMap<PathBuf, usize>>>,
}

impl CountingLoader {
    fn reads_of(&self, path: &Path) -> usize {
        self.reads.borrow().get(path).copied().unwrap_or(0)
    }
}

impl SourceLoader for CountingLoader {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        *self.reads.borrow_mut().entry(path.to_path_buf()).or_insert(0) += 1;
        DiskLoader.read_to_string(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        DiskLoader.is_file(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        DiskLoader.is_dir(path)
    }
}

fn options(root: &Path) -> ResolverOptions {
    ResolverOptions {
        supported_modules: vec!["axios".to_string()],
        root: Some(root.to_path_buf()),
        ..Default::default()
    }
}

fn session(root: &Path) -> DependencyResolver {
    DependencyResolver::new(SourceCache::disk(), options(root))
}

fn relative_files(root: &Path, files: &[Rc<depscope::model::SourceFile>]) -> Vec<String> {
    let mut paths: Vec<String> = files
        .iter()
        .map(|f| {
            f.path
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    paths.sort();
    paths
}

fn problems(err: ResolveError) -> DependencyProblems {
    match err {
        ResolveError::Dependencies(problems) => problems,
        other => panic!("expected aggregated dependency error, got {:?}", other),
    }
}

#[test]
fn test_chain_yields_each_dependency_once() {
    let tmp = setup_project();
    let root = tmp.path();
    let resolved = session(root)
        .resolve(&root.join("checks/chain/a.spec.ts"))
        .unwrap();
    assert_eq!(
        relative_files(root, &resolved.files),
        vec!["checks/chain/b.ts", "checks/chain/c.ts", "checks/chain/d.ts"]
    );
    assert_eq!(resolved.entrypoint.path, root.join("checks/chain/a.spec.ts"));
}

#[test]
fn test_cycle_terminates() {
    let tmp = setup_project();
    let root = tmp.path();
    let resolved = session(root)
        .resolve(&root.join("checks/cycle/a.spec.js"))
        .unwrap();
    assert_eq!(
        relative_files(root, &resolved.files),
        vec!["checks/cycle/b.js"]
    );
}

#[test]
fn test_non_literal_specifiers_are_ignored() {
    let tmp = setup_project();
    let root = tmp.path();
    let resolved = session(root)
        .resolve(&root.join("checks/dynamic.spec.js"))
        .unwrap();
    assert!(resolved.files.is_empty());
}

#[test]
fn test_alias_prefers_specific_pattern() {
    let tmp = setup_project();
    let root = tmp.path();
    let resolver = session(root);
    let resolved = resolver.resolve(&root.join("checks/alias.spec.ts")).unwrap();
    assert_eq!(
        relative_files(root, &resolved.files),
        vec!["src/app/session.ts", "src/utils/index.ts"]
    );

    let entry = resolver
        .sources()
        .load(&root.join("checks/alias.spec.ts"))
        .unwrap();
    let analysis = resolver.analyze(&entry).unwrap();
    match &analysis.dependencies.local[0] {
        ResolvedDependency::AliasResolvedPath {
            specifier, pattern, ..
        } => {
            assert_eq!(specifier, "@app/utils");
            assert_eq!(pattern, "@app/utils");
        }
        other => panic!("expected alias resolution, got {:?}", other),
    }
}

#[test]
fn test_source_form_is_preferred_over_compiled() {
    let tmp = setup_project();
    let root = tmp.path();
    let resolved = session(root)
        .resolve(&root.join("checks/prefer.spec.ts"))
        .unwrap();
    assert_eq!(relative_files(root, &resolved.files), vec!["checks/dep.ts"]);
}

#[test]
fn test_base_path_and_data_files() {
    let tmp = setup_project();
    let root = tmp.path();
    let resolver = session(root);
    let resolved = resolver.resolve(&root.join("checks/legacy.spec.js")).unwrap();
    assert_eq!(
        relative_files(root, &resolved.files),
        vec!["checks/fixtures.json", "lib/legacy/index.js"]
    );

    let entry = resolver
        .sources()
        .load(&root.join("checks/legacy.spec.js"))
        .unwrap();
    let analysis = resolver.analyze(&entry).unwrap();
    assert_eq!(analysis.dependencies.local[0].rule(), "base_path");
    assert_eq!(analysis.dependencies.local[1].rule(), "relative");
}

#[test]
fn test_syntax_error_does_not_hide_missing_file() {
    let tmp = setup_project();
    let root = tmp.path();
    let err = session(root)
        .resolve(&root.join("checks/broken/entry.spec.js"))
        .unwrap_err();
    let problems = problems(err);
    assert_eq!(problems.entrypoint, root.join("checks/broken/entry.spec.js"));
    assert_eq!(
        problems.missing_files,
        vec![root.join("checks/broken/missing-thing")]
    );
    assert_eq!(problems.parse_errors.len(), 1);
    let ParseFailure { file, message } = &problems.parse_errors[0];
    assert_eq!(file, &root.join("checks/broken/bad.js"));
    assert!(message.contains("syntax error"), "got {}", message);
}

#[test]
fn test_unsupported_external_dependencies() {
    let tmp = setup_project();
    let root = tmp.path();
    let entry = root.join("checks/external.spec.js");
    let problems = problems(session(root).resolve(&entry).unwrap_err());
    assert_eq!(
        problems.unsupported_external_dependencies,
        vec![UnsupportedExternal {
            file: entry.clone(),
            names: vec!["left-pad".to_string()],
        }]
    );
    assert!(problems.missing_files.is_empty());

    let unchecked = DependencyResolver::new(
        SourceCache::disk(),
        ResolverOptions {
            check_unsupported_modules: false,
            ..options(root)
        },
    );
    let resolved = unchecked.resolve(&entry).unwrap();
    assert!(resolved.files.is_empty());
}

#[test]
fn test_missing_entrypoint_is_fatal() {
    let tmp = setup_project();
    let root = tmp.path();
    let err = session(root)
        .resolve(&root.join("checks/nope.spec.js"))
        .unwrap_err();
    assert!(matches!(err, ResolveError::EntrypointUnreadable { .. }));
}

#[test]
fn test_typed_syntax_unavailable_is_fatal() {
    let tmp = setup_project();
    let root = tmp.path();
    let resolver = session(root)
        .with_extractors(ExtractorRegistry::with_typed_syntax(TypedSyntax::Unavailable));

    let err = resolver
        .resolve(&root.join("checks/chain/a.spec.ts"))
        .unwrap_err();
    assert!(matches!(err, ResolveError::TypedSyntaxUnavailable { .. }));

    // Plain files still work.
    assert!(resolver.resolve(&root.join("checks/cycle/a.spec.js")).is_ok());
}

#[test]
fn test_shared_file_is_read_once_per_session() {
    let tmp = setup_project();
    let root = tmp.path();
    let loader = CountingLoader::default();
    let resolver =
        DependencyResolver::new(SourceCache::new(Box::new(loader.clone())), options(root));

    let results = resolver.resolve_all(&[
        root.join("checks/one.spec.ts"),
        root.join("checks/two.spec.ts"),
    ]);
    for result in &results {
        let resolved = result.as_ref().unwrap();
        assert_eq!(
            relative_files(root, &resolved.files),
            vec!["checks/shared/helper.ts"]
        );
    }
    assert_eq!(loader.reads_of(&root.join("checks/shared/helper.ts")), 1);
    assert_eq!(resolver.sources().read_count(), 3);
}

#[test]
fn test_errors_are_reported_per_entrypoint() {
    let tmp = setup_project();
    let root = tmp.path();
    let results = session(root).resolve_all(&[
        root.join("checks/chain/a.spec.ts"),
        root.join("checks/broken/entry.spec.js"),
        root.join("checks/missing.spec.js"),
    ]);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(ResolveError::Dependencies(_))));
    assert!(matches!(
        results[2],
        Err(ResolveError::EntrypointUnreadable { .. })
    ));
}
