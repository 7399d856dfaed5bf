use std::path::{Path, PathBuf};

/// One `compilerOptions.paths` entry.
///
/// A pattern holds at most one `*`. Without a wildcard the matcher is exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasMatcher {
    /// The pattern as written, e.g. `"@utils/*"`.
    pub pattern: String,
    /// Literal text before the wildcard (the whole pattern when exact).
    pub prefix: String,
    /// Literal text after the wildcard; `None` for exact patterns.
    pub suffix: Option<String>,
    /// Substitution targets in declared order.
    pub targets: Vec<AliasTarget>,
}

/// A single substitution target for an alias pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTarget {
    /// The target as written, e.g. `"src/utils/*"`.
    pub raw: String,
    /// The part before the wildcard, resolved against the alias base.
    pub prefix: PathBuf,
    /// The part after the wildcard (usually empty).
    pub suffix: String,
    pub has_wildcard: bool,
}

/// A candidate path produced by an alias match, not yet checked for existence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasCandidate {
    pub pattern: String,
    pub target: String,
    pub path: PathBuf,
}

impl AliasMatcher {
    pub fn new(pattern: &str, targets: &[String], base: &Path) -> Self {
        let (prefix, suffix) = split_on_wildcard(pattern);
        let targets = targets
            .iter()
            .map(|target| {
                let (t_prefix, t_suffix) = split_on_wildcard(target);
                AliasTarget {
                    raw: target.clone(),
                    prefix: base.join(t_prefix),
                    suffix: t_suffix.unwrap_or("").to_string(),
                    has_wildcard: t_suffix.is_some(),
                }
            })
            .collect();
        Self {
            pattern: pattern.to_string(),
            prefix: prefix.to_string(),
            suffix: suffix.map(str::to_string),
            targets,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.suffix.is_none()
    }

    /// Match a specifier, returning the fragment captured by the wildcard.
    /// Exact matchers capture the empty string.
    pub fn capture<'a>(&self, specifier: &'a str) -> Option<&'a str> {
        match &self.suffix {
            None => (specifier == self.prefix).then_some(""),
            Some(suffix) => match_pattern(specifier, &self.prefix, suffix),
        }
    }
}

/// Ordered set of alias matchers; the most specific pattern is tried first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathAliasResolver {
    matchers: Vec<AliasMatcher>,
}

impl PathAliasResolver {
    pub fn new(mut matchers: Vec<AliasMatcher>) -> Self {
        // Longest literal prefix first; on equal prefixes exact beats wildcard.
        matchers.sort_by(|a, b| {
            b.prefix
                .len()
                .cmp(&a.prefix.len())
                .then_with(|| b.is_exact().cmp(&a.is_exact()))
        });
        Self { matchers }
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn matchers(&self) -> &[AliasMatcher] {
        &self.matchers
    }

    /// All candidate paths for a specifier, in the order they should be probed.
    pub fn candidates(&self, specifier: &str) -> Vec<AliasCandidate> {
        let mut candidates = Vec::new();
        for matcher in &self.matchers {
            let Some(captured) = matcher.capture(specifier) else {
                continue;
            };
            for target in &matcher.targets {
                let path = if target.has_wildcard {
                    PathBuf::from(format!(
                        "{}{}{}",
                        target.prefix.display(),
                        captured,
                        target.suffix
                    ))
                } else {
                    target.prefix.clone()
                };
                candidates.push(AliasCandidate {
                    pattern: matcher.pattern.clone(),
                    target: target.raw.clone(),
                    path,
                });
            }
        }
        candidates
    }
}

/// Split a pattern string on the first "*" wildcard.
/// Returns (prefix, Some(suffix)), or (pattern, None) without a wildcard.
fn split_on_wildcard(pattern: &str) -> (&str, Option<&str>) {
    match pattern.find('*') {
        Some(pos) => (&pattern[..pos], Some(&pattern[pos + 1..])),
        None => (pattern, None),
    }
}

/// Match an import path against a wildcard pattern.
/// Returns the portion matched by the wildcard, or None if no match.
fn match_pattern<'a>(import_path: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    if !import_path.starts_with(prefix) || !import_path.ends_with(suffix) {
        return None;
    }
    let wildcard_end = import_path.len() - suffix.len();
    if prefix.len() <= wildcard_end {
        Some(&import_path[prefix.len()..wildcard_end])
    } else {
        None
    }
}
