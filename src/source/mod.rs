use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::trace;

use crate::model::SourceFile;

/// Filesystem access used by the resolver.
///
/// Everything the resolver reads or probes goes through this trait so tests
/// can count reads or serve files from memory.
pub trait SourceLoader {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    fn is_file(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;
}

/// Reads straight from the local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiskLoader;

impl SourceLoader for DiskLoader {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// Memoizing front for a [`SourceLoader`].
///
/// Source files are read at most once per cache, and existence probes are
/// remembered. The cache lives for one resolver session.
pub struct SourceCache {
    loader: Box<dyn SourceLoader>,
    files: RefCell<HashMap<PathBuf, Rc<SourceFile>>>,
    existence: RefCell<HashMap<PathBuf, bool>>,
    reads: Cell<usize>,
}

impl SourceCache {
    pub fn new(loader: Box<dyn SourceLoader>) -> Self {
        Self {
            loader,
            files: RefCell::new(HashMap::new()),
            existence: RefCell::new(HashMap::new()),
            reads: Cell::new(0),
        }
    }

    pub fn disk() -> Self {
        Self::new(Box::new(DiskLoader))
    }

    /// Load a source file, reading it from the loader on first access only.
    pub fn load(&self, path: &Path) -> io::Result<Rc<SourceFile>> {
        if let Some(file) = self.files.borrow().get(path) {
            trace!(path = %path.display(), "source cache hit");
            return Ok(Rc::clone(file));
        }

        let contents = self.loader.read_to_string(path)?;
        self.reads.set(self.reads.get() + 1);
        let file = Rc::new(SourceFile::new(path.to_path_buf(), contents));
        self.files
            .borrow_mut()
            .insert(path.to_path_buf(), Rc::clone(&file));
        self.existence.borrow_mut().insert(path.to_path_buf(), true);
        Ok(file)
    }

    /// Read a file without memoizing its contents (package manifests, configs).
    pub fn read_uncached(&self, path: &Path) -> io::Result<String> {
        self.loader.read_to_string(path)
    }

    /// Check if a regular file exists, caching the answer.
    pub fn is_file(&self, path: &Path) -> bool {
        if let Some(&exists) = self.existence.borrow().get(path) {
            return exists;
        }
        let exists = self.loader.is_file(path);
        self.existence
            .borrow_mut()
            .insert(path.to_path_buf(), exists);
        exists
    }

    pub fn is_dir(&self, path: &Path) -> bool {
        self.loader.is_dir(path)
    }

    /// Number of source reads that went through to the loader.
    pub fn read_count(&self) -> usize {
        self.reads.get()
    }
}
