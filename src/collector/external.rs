use crate::model::{package_name, ExternalDependency};

/// Modules that ship with the Node.js runtime.
pub const BUILTIN_MODULES: &[&str] = &[
    "assert",
    "assert/strict",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "test",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

/// Allow-list of external modules the execution sandbox provides.
#[derive(Debug, Clone, Default)]
pub struct ExternalPolicy {
    supported: Vec<String>,
}

impl ExternalPolicy {
    pub fn new(supported_modules: &[String]) -> Self {
        Self {
            supported: supported_modules.to_vec(),
        }
    }

    pub fn is_supported(&self, specifier: &str) -> bool {
        let name = package_name(specifier);
        BUILTIN_MODULES.contains(&name)
            || self.supported.iter().any(|s| s == name || s == specifier)
    }

    /// Specifiers of `externals` that are not allowed, in order, without repeats.
    pub fn unsupported(&self, externals: &[ExternalDependency]) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for dep in externals {
            if !self.is_supported(&dep.specifier) && !names.contains(&dep.specifier) {
                names.push(dep.specifier.clone());
            }
        }
        names
    }
}
