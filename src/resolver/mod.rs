use std::path::{Component, Path, PathBuf};

pub mod alias;
pub mod classifier;
pub mod descriptors;
pub mod extensions;
pub mod package_json;
pub mod tsconfig;

pub use classifier::DependencyClassifier;
pub use descriptors::DescriptorCache;

/// Normalize a path by resolving `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                // Only pop if there's a normal component to pop
                if components
                    .last()
                    .is_some_and(|c| matches!(c, Component::Normal(_)))
                {
                    components.pop();
                } else if !components
                    .last()
                    .is_some_and(|c| matches!(c, Component::RootDir | Component::Prefix(_)))
                {
                    components.push(component);
                }
            }
            Component::CurDir => {}
            other => components.push(other),
        }
    }
    components.iter().collect()
}
