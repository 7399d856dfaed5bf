use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::{FileKind, SourceFile};

pub mod typescript;

/// Result of extracting specifiers from one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Specifiers in source order. Duplicates are kept.
    Specifiers(Vec<String>),
    /// The file could not be parsed; no specifiers were extracted.
    SyntaxError(String),
}

/// Extraction failures that abort a whole resolve call.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file kind: {}", path.display())]
    UnsupportedFileKind { path: PathBuf },

    #[error("cannot parse {}: TypeScript support is not available", path.display())]
    TypedSyntaxUnavailable { path: PathBuf },

    #[error("failed to load grammar: {0}")]
    Grammar(String),
}

/// Trait for per-syntax specifier extractors.
///
/// Each implementation walks one kind of syntax tree and returns the raw
/// import/require/export-from specifiers it contains.
pub trait SpecifierExtractor {
    fn extract(&self, source: &str, path: &Path) -> Result<Extraction, ExtractError>;

    /// Which file kinds does this extractor handle?
    fn supported_kinds(&self) -> &[FileKind];
}

/// Whether the typed-syntax (TypeScript) parser can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypedSyntax {
    #[default]
    Available,
    Unavailable,
}

/// Data-only files (JSON) never import anything.
#[derive(Debug, Default)]
pub struct DataExtractor;

impl SpecifierExtractor for DataExtractor {
    fn extract(&self, _source: &str, _path: &Path) -> Result<Extraction, ExtractError> {
        Ok(Extraction::Specifiers(Vec::new()))
    }

    fn supported_kinds(&self) -> &[FileKind] {
        &[FileKind::Data]
    }
}

/// Stand-in used when typed syntax is disabled; fails every request clearly.
#[derive(Debug, Default)]
pub struct UnavailableTypedSyntax;

impl SpecifierExtractor for UnavailableTypedSyntax {
    fn extract(&self, _source: &str, path: &Path) -> Result<Extraction, ExtractError> {
        Err(ExtractError::TypedSyntaxUnavailable {
            path: path.to_path_buf(),
        })
    }

    fn supported_kinds(&self) -> &[FileKind] {
        &[FileKind::Typed]
    }
}

/// Registry of specifier extractors, selected by file kind.
pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn SpecifierExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Create a registry with the plain, data and (optionally) typed extractors.
    pub fn with_typed_syntax(typed: TypedSyntax) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(typescript::TreeSitterExtractor::plain()));
        registry.register(Box::new(DataExtractor));
        match typed {
            TypedSyntax::Available => {
                registry.register(Box::new(typescript::TreeSitterExtractor::typed()))
            }
            TypedSyntax::Unavailable => registry.register(Box::new(UnavailableTypedSyntax)),
        }
        registry
    }

    pub fn register(&mut self, extractor: Box<dyn SpecifierExtractor>) {
        self.extractors.push(extractor);
    }

    /// Find an extractor that supports the given kind.
    pub fn extractor_for(&self, kind: FileKind) -> Option<&dyn SpecifierExtractor> {
        self.extractors
            .iter()
            .find(|e| e.supported_kinds().contains(&kind))
            .map(|e| e.as_ref())
    }

    /// Extract the specifiers of a source file using the extractor for its kind.
    pub fn extract(&self, file: &SourceFile) -> Result<Extraction, ExtractError> {
        let unsupported = || ExtractError::UnsupportedFileKind {
            path: file.path.clone(),
        };
        let kind = file.kind().ok_or_else(unsupported)?;
        let extractor = self.extractor_for(kind).ok_or_else(unsupported)?;
        extractor.extract(&file.contents, &file.path)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_typed_syntax(TypedSyntax::Available)
    }
}
