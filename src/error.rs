use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::parser::ExtractError;

/// Why a resolve call failed.
///
/// Everything except [`ResolveError::Dependencies`] aborts the traversal on
/// the spot. `Dependencies` is raised once, after the whole graph has been
/// walked, and carries every problem that was found.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot read entrypoint {}: {source}", path.display())]
    EntrypointUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported file kind: {}", path.display())]
    UnsupportedFileKind { path: PathBuf },

    #[error("cannot parse {}: TypeScript support is not available", path.display())]
    TypedSyntaxUnavailable { path: PathBuf },

    #[error("parser setup failed: {0}")]
    Parser(String),

    #[error("traversal from {} exceeded the limit of {limit} files", entrypoint.display())]
    TraversalLimitExceeded { entrypoint: PathBuf, limit: usize },

    #[error(transparent)]
    Dependencies(#[from] DependencyProblems),
}

impl From<ExtractError> for ResolveError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::UnsupportedFileKind { path } => ResolveError::UnsupportedFileKind { path },
            ExtractError::TypedSyntaxUnavailable { path } => {
                ResolveError::TypedSyntaxUnavailable { path }
            }
            ExtractError::Grammar(message) => ResolveError::Parser(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsupportedExternal {
    pub file: PathBuf,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    pub file: PathBuf,
    pub message: String,
}

/// Every collected problem of one resolve call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyProblems {
    pub entrypoint: PathBuf,
    pub missing_files: Vec<PathBuf>,
    pub unsupported_external_dependencies: Vec<UnsupportedExternal>,
    pub parse_errors: Vec<ParseFailure>,
}

impl DependencyProblems {
    pub fn is_empty(&self) -> bool {
        self.missing_files.is_empty()
            && self.unsupported_external_dependencies.is_empty()
            && self.parse_errors.is_empty()
    }

    pub fn count(&self) -> usize {
        self.missing_files.len()
            + self.unsupported_external_dependencies.len()
            + self.parse_errors.len()
    }
}

impl fmt::Display for DependencyProblems {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dependency problem(s) in {}",
            self.count(),
            self.entrypoint.display()
        )?;
        for missing in &self.missing_files {
            write!(f, "\n  missing file: {}", missing.display())?;
        }
        for unsupported in &self.unsupported_external_dependencies {
            write!(
                f,
                "\n  unsupported dependencies in {}: {}",
                unsupported.file.display(),
                unsupported.names.join(", ")
            )?;
        }
        for failure in &self.parse_errors {
            write!(
                f,
                "\n  parse error in {}: {}",
                failure.file.display(),
                failure.message
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for DependencyProblems {}
