use std::path::{Path, PathBuf};

/// A path to probe while resolving a specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// Resolves if this file exists.
    File(PathBuf),
    /// A directory's `package.json`; resolves through its entry points.
    PackageManifest(PathBuf),
}

impl Candidate {
    pub fn path(&self) -> &Path {
        match self {
            Candidate::File(p) | Candidate::PackageManifest(p) => p,
        }
    }
}

/// Compiled extensions and the source extensions that may stand behind them,
/// in probing order. An import of `./x.js` may really point at `./x.ts`.
const SUBSTITUTIONS: &[(&str, &[&str])] = &[
    ("js", &["ts", "tsx", "js"]),
    ("mjs", &["mts", "mjs"]),
    ("cjs", &["cts", "cjs"]),
    ("jsx", &["tsx", "jsx"]),
];

/// Extensions that only exist as sources; tried verbatim.
const SOURCE_ONLY: &[&str] = &["ts", "tsx", "mts", "cts", "json"];

/// Appended to extensionless specifiers, after the compiled set.
const DATA_EXTENSION: &str = "json";

/// Candidate paths for a specifier already joined onto its base directory.
pub fn candidates_for(path: &Path) -> Vec<Candidate> {
    let extension = path.extension().and_then(|e| e.to_str());
    match extension {
        Some(ext) => {
            if let Some(substitutes) = substitutes_for(ext) {
                return substitutes
                    .iter()
                    .map(|s| Candidate::File(path.with_extension(s)))
                    .collect();
            }
            if SOURCE_ONLY.contains(&ext) {
                return vec![Candidate::File(path.to_path_buf())];
            }
            // `./config.local` or `./v1.2`: try as written, then as a bare name.
            let mut candidates = vec![Candidate::File(path.to_path_buf())];
            candidates.extend(extensionless(path));
            candidates
        }
        None => extensionless(path),
    }
}

fn substitutes_for(ext: &str) -> Option<&'static [&'static str]> {
    SUBSTITUTIONS
        .iter()
        .find(|(compiled, _)| *compiled == ext)
        .map(|(_, subs)| *subs)
}

/// `x.<ext>` for each compiled extension, then `x.json`, then the directory
/// forms: `x/package.json` and `x/index.<ext>`.
fn extensionless(path: &Path) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = appended(path)
        .into_iter()
        .map(Candidate::File)
        .collect();
    candidates.push(Candidate::PackageManifest(path.join("package.json")));
    candidates.extend(appended(&path.join("index")).into_iter().map(Candidate::File));
    candidates
}

fn appended(path: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for (_, substitutes) in SUBSTITUTIONS {
        for ext in *substitutes {
            let candidate = with_appended_extension(path, ext);
            if !paths.contains(&candidate) {
                paths.push(candidate);
            }
        }
    }
    paths.push(with_appended_extension(path, DATA_EXTENSION));
    paths
}

/// `with_extension` would replace `.local` in `config.local`; this appends.
fn with_appended_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}
