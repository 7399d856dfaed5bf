use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::source::SourceCache;

use super::package_json::PackageDescriptor;
use super::tsconfig::{ProjectConfig, PROJECT_CONFIG_FILES};

const MANIFEST_FILE: &str = "package.json";

type Memo<T> = RefCell<HashMap<PathBuf, Option<Rc<T>>>>;

/// Nearest `package.json` and nearest project config for a directory.
///
/// The two are looked up independently: a file may pick up its own
/// `package.json` while sharing a `tsconfig.json` several levels up. Lookups
/// never climb past `root`, and every directory visited on the way remembers
/// the answer.
pub struct DescriptorCache {
    root: Option<PathBuf>,
    packages: Memo<PackageDescriptor>,
    configs: Memo<ProjectConfig>,
}

impl DescriptorCache {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            packages: RefCell::new(HashMap::new()),
            configs: RefCell::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn package_for(&self, dir: &Path, sources: &SourceCache) -> Option<Rc<PackageDescriptor>> {
        self.nearest(&self.packages, dir, |candidate_dir| {
            let manifest = candidate_dir.join(MANIFEST_FILE);
            if !sources.is_file(&manifest) {
                return None;
            }
            let parsed = sources
                .read_uncached(&manifest)
                .map_err(anyhow::Error::from)
                .and_then(|content| PackageDescriptor::parse_from_str(&content, &manifest));
            match parsed {
                Ok(descriptor) => Some(descriptor),
                Err(err) => {
                    warn!(path = %manifest.display(), error = %err, "ignoring unreadable package.json");
                    None
                }
            }
        })
    }

    pub fn project_config_for(
        &self,
        dir: &Path,
        sources: &SourceCache,
    ) -> Option<Rc<ProjectConfig>> {
        self.nearest(&self.configs, dir, |candidate_dir| {
            // tsconfig.json shadows jsconfig.json in the same directory.
            let config_path = PROJECT_CONFIG_FILES
                .iter()
                .map(|name| candidate_dir.join(name))
                .find(|path| sources.is_file(path))?;
            let read = |path: &Path| sources.read_uncached(path);
            match ProjectConfig::load(&config_path, &read) {
                Ok(config) => Some(config),
                Err(err) => {
                    warn!(path = %config_path.display(), error = %err, "ignoring unreadable project config");
                    None
                }
            }
        })
    }

    fn nearest<T>(
        &self,
        memo: &Memo<T>,
        dir: &Path,
        probe: impl Fn(&Path) -> Option<T>,
    ) -> Option<Rc<T>> {
        let mut visited = Vec::new();
        let mut current = Some(dir);
        let mut found = None;

        while let Some(candidate_dir) = current {
            if let Some(known) = memo.borrow().get(candidate_dir) {
                found = known.clone();
                break;
            }
            visited.push(candidate_dir.to_path_buf());
            if let Some(value) = probe(candidate_dir) {
                debug!(dir = %candidate_dir.display(), "found descriptor");
                found = Some(Rc::new(value));
                break;
            }
            if self.root.as_deref() == Some(candidate_dir) {
                break;
            }
            current = candidate_dir.parent();
        }

        let mut memo = memo.borrow_mut();
        for visited_dir in visited {
            memo.insert(visited_dir, found.clone());
        }
        found
    }
}
