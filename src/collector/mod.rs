//! Breadth-first traversal of the local dependency graph.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, info_span};

use crate::error::{DependencyProblems, ParseFailure, ResolveError, UnsupportedExternal};
use crate::model::{FileDependencies, SourceFile};
use crate::parser::{Extraction, ExtractorRegistry};
use crate::resolver::{normalize_path, DependencyClassifier, DescriptorCache};
use crate::source::SourceCache;
use crate::workspace::Workspace;

pub mod external;
pub mod matched;

pub use external::ExternalPolicy;
pub use matched::{MatchRule, MatchedCollection};

/// Knobs for one resolver session.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// External modules the sandbox provides, besides the Node built-ins.
    pub supported_modules: Vec<String>,
    pub check_unsupported_modules: bool,
    /// Refuse local files outside the importing file's workspace package (or `root`).
    pub restricted: bool,
    /// Descriptor lookups never climb above this directory.
    pub root: Option<PathBuf>,
    /// Fail once a single traversal reaches more files than this.
    pub max_files: Option<usize>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            supported_modules: Vec::new(),
            check_unsupported_modules: true,
            restricted: false,
            root: None,
            max_files: None,
        }
    }
}

/// What was learned from one file. Computed once per session.
#[derive(Debug, Clone, Default)]
pub struct FileAnalysis {
    pub specifiers: Vec<String>,
    pub dependencies: FileDependencies,
    pub parse_error: Option<String>,
}

/// Everything one traversal found, before validation.
#[derive(Debug, Clone)]
pub struct AggregatedResult {
    pub entrypoint: Rc<SourceFile>,
    /// Local files reachable from the entrypoint, in discovery order.
    pub resolved_files: Vec<Rc<SourceFile>>,
    pub missing_files: Vec<PathBuf>,
    pub unsupported_external_dependencies: Vec<UnsupportedExternal>,
    pub parse_errors: Vec<ParseFailure>,
}

/// A successful resolve: the entrypoint and every local file it needs.
#[derive(Debug, Clone)]
pub struct ResolvedFiles {
    pub entrypoint: Rc<SourceFile>,
    pub files: Vec<Rc<SourceFile>>,
}

impl AggregatedResult {
    fn new(entrypoint: Rc<SourceFile>) -> Self {
        Self {
            entrypoint,
            resolved_files: Vec::new(),
            missing_files: Vec::new(),
            unsupported_external_dependencies: Vec::new(),
            parse_errors: Vec::new(),
        }
    }

    pub fn problems(&self) -> DependencyProblems {
        DependencyProblems {
            entrypoint: self.entrypoint.path.clone(),
            missing_files: self.missing_files.clone(),
            unsupported_external_dependencies: self.unsupported_external_dependencies.clone(),
            parse_errors: self.parse_errors.clone(),
        }
    }

    /// The full file set, or one error listing every problem.
    pub fn validate(self) -> Result<ResolvedFiles, ResolveError> {
        let problems = self.problems();
        if !problems.is_empty() {
            return Err(ResolveError::Dependencies(problems));
        }
        Ok(ResolvedFiles {
            entrypoint: self.entrypoint,
            files: self.resolved_files,
        })
    }
}

/// A resolver session.
///
/// Source files, descriptors and per-file analyses are cached for the life of
/// the session, so entrypoints resolved one after another share the work.
/// Not meant for concurrent use.
pub struct DependencyResolver {
    sources: SourceCache,
    descriptors: DescriptorCache,
    extractors: ExtractorRegistry,
    workspace: Option<Workspace>,
    options: ResolverOptions,
    policy: ExternalPolicy,
    analyses: RefCell<HashMap<PathBuf, Rc<FileAnalysis>>>,
}

impl DependencyResolver {
    pub fn new(sources: SourceCache, options: ResolverOptions) -> Self {
        Self {
            descriptors: DescriptorCache::new(options.root.clone()),
            policy: ExternalPolicy::new(&options.supported_modules),
            sources,
            extractors: ExtractorRegistry::default(),
            workspace: None,
            options,
            analyses: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_workspace(mut self, workspace: Option<Workspace>) -> Self {
        self.workspace = workspace;
        self
    }

    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn sources(&self) -> &SourceCache {
        &self.sources
    }

    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    /// Resolve one entrypoint to its full local file set.
    pub fn resolve(&self, entrypoint: &Path) -> Result<ResolvedFiles, ResolveError> {
        self.collect(entrypoint)?.validate()
    }

    /// Resolve several entrypoints in order, sharing this session's caches.
    pub fn resolve_all(&self, entrypoints: &[PathBuf]) -> Vec<Result<ResolvedFiles, ResolveError>> {
        entrypoints.iter().map(|entry| self.resolve(entry)).collect()
    }

    /// Walk the graph from `entrypoint` and gather files and problems.
    ///
    /// Only fatal errors are returned as `Err`; collected problems stay in the
    /// result until [`AggregatedResult::validate`].
    pub fn collect(&self, entrypoint: &Path) -> Result<AggregatedResult, ResolveError> {
        let _span = info_span!("resolve", entrypoint = %entrypoint.display()).entered();

        // `visited` holds normalized paths only.
        let entrypoint = normalize_path(entrypoint);
        let entry = self
            .sources
            .load(&entrypoint)
            .map_err(|source| ResolveError::EntrypointUnreadable {
                path: entrypoint.clone(),
                source,
            })?;

        let mut result = AggregatedResult::new(Rc::clone(&entry));
        let mut visited: HashSet<PathBuf> = HashSet::from([entry.path.clone()]);
        let mut queue = VecDeque::from([entry]);

        while let Some(file) = queue.pop_front() {
            let analysis = self.analyze(&file)?;

            if let Some(message) = &analysis.parse_error {
                result.parse_errors.push(ParseFailure {
                    file: file.path.clone(),
                    message: message.clone(),
                });
                continue;
            }

            for missing in &analysis.dependencies.missing {
                if !result.missing_files.contains(&missing.attempted_path) {
                    result.missing_files.push(missing.attempted_path.clone());
                }
            }

            if self.options.check_unsupported_modules {
                let names = self.policy.unsupported(&analysis.dependencies.external);
                if !names.is_empty() {
                    result.unsupported_external_dependencies.push(UnsupportedExternal {
                        file: file.path.clone(),
                        names,
                    });
                }
            }

            for dep in &analysis.dependencies.local {
                let path = dep.path();
                if !visited.insert(path.to_path_buf()) {
                    continue;
                }
                if let Some(limit) = self.options.max_files {
                    if result.resolved_files.len() >= limit {
                        return Err(ResolveError::TraversalLimitExceeded {
                            entrypoint: result.entrypoint.path.clone(),
                            limit,
                        });
                    }
                }
                match self.sources.load(path) {
                    Ok(next) => {
                        result.resolved_files.push(Rc::clone(&next));
                        queue.push_back(next);
                    }
                    Err(err) => result.parse_errors.push(ParseFailure {
                        file: path.to_path_buf(),
                        message: format!("cannot read file: {}", err),
                    }),
                }
            }
        }

        debug!(
            files = result.resolved_files.len(),
            missing = result.missing_files.len(),
            parse_errors = result.parse_errors.len(),
            "traversal finished"
        );
        Ok(result)
    }

    /// Extract and classify one file's specifiers, once per session.
    pub fn analyze(&self, file: &SourceFile) -> Result<Rc<FileAnalysis>, ResolveError> {
        if let Some(analysis) = self.analyses.borrow().get(&file.path) {
            return Ok(Rc::clone(analysis));
        }

        let analysis = match self.extractors.extract(file)? {
            Extraction::SyntaxError(message) => {
                debug!(path = %file.path.display(), %message, "syntax error");
                FileAnalysis {
                    parse_error: Some(message),
                    ..Default::default()
                }
            }
            Extraction::Specifiers(specifiers) => {
                let classifier = self.classifier(file);
                let mut dependencies = FileDependencies::default();
                for specifier in &specifiers {
                    dependencies.push(classifier.classify(file, specifier));
                }
                FileAnalysis {
                    specifiers,
                    dependencies,
                    parse_error: None,
                }
            }
        };

        let analysis = Rc::new(analysis);
        self.analyses
            .borrow_mut()
            .insert(file.path.clone(), Rc::clone(&analysis));
        Ok(analysis)
    }

    fn classifier(&self, file: &SourceFile) -> DependencyClassifier<'_> {
        DependencyClassifier::new(&self.sources, &self.descriptors)
            .with_workspace(self.workspace.as_ref())
            .restricted_to(self.boundary(file))
    }

    /// Where restricted mode draws the line for imports made by `file`: the
    /// innermost workspace package holding it, else `root`.
    fn boundary(&self, file: &SourceFile) -> Option<PathBuf> {
        if !self.options.restricted {
            return None;
        }
        self.workspace
            .as_ref()
            .and_then(|ws| ws.by_path(&file.path))
            .map(|package| package.path.clone())
            .or_else(|| self.options.root.clone())
    }
}
