use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::members::{CliWorkspaces, DenoWorkspaces, PackageJsonWorkspaces, SystemCommandRunner};
use super::WorkspaceResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageManager {
    Npm,
    Pnpm,
    Yarn,
    Deno,
    Bun,
}

/// Order managers are tried in at every detection step.
pub const PRIORITY: &[PackageManager] = &[
    PackageManager::Npm,
    PackageManager::Pnpm,
    PackageManager::Yarn,
    PackageManager::Deno,
    PackageManager::Bun,
];

impl PackageManager {
    pub fn command(&self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::Deno => "deno",
            PackageManager::Bun => "bun",
        }
    }

    pub fn from_command(name: &str) -> Option<Self> {
        PRIORITY.iter().copied().find(|pm| pm.command() == name)
    }

    pub fn lockfiles(&self) -> &'static [&'static str] {
        match self {
            PackageManager::Npm => &["package-lock.json", "npm-shrinkwrap.json"],
            PackageManager::Pnpm => &["pnpm-lock.yaml"],
            PackageManager::Yarn => &["yarn.lock"],
            PackageManager::Deno => &["deno.lock"],
            PackageManager::Bun => &["bun.lockb", "bun.lock"],
        }
    }

    pub fn config_files(&self) -> &'static [&'static str] {
        match self {
            PackageManager::Npm => &[".npmrc"],
            PackageManager::Pnpm => &["pnpm-workspace.yaml"],
            PackageManager::Yarn => &[".yarnrc.yml", ".yarnrc"],
            PackageManager::Deno => &["deno.json", "deno.jsonc"],
            PackageManager::Bun => &["bunfig.toml"],
        }
    }

    /// How this manager lists the members of a workspace.
    pub fn workspace_resolver(&self) -> Box<dyn WorkspaceResolver> {
        match self {
            PackageManager::Npm | PackageManager::Yarn | PackageManager::Bun => {
                Box::new(PackageJsonWorkspaces)
            }
            PackageManager::Pnpm => Box::new(CliWorkspaces::pnpm(Box::new(SystemCommandRunner))),
            PackageManager::Deno => Box::new(DenoWorkspaces),
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command())
    }
}

/// The process environment consulted during detection.
#[derive(Debug, Clone, Default)]
pub struct DetectionEnv {
    /// `npm_config_user_agent`, e.g. `pnpm/9.1.0 npm/? node/v20.11.0 linux x64`.
    pub user_agent: Option<String>,
    /// `npm_execpath`: the script of the manager that launched us.
    pub exec_path: Option<PathBuf>,
    /// `PATH`, searched for manager executables.
    pub path_var: Option<OsString>,
}

impl DetectionEnv {
    pub fn from_process() -> Self {
        Self {
            user_agent: env::var("npm_config_user_agent").ok(),
            exec_path: env::var_os("npm_execpath").map(PathBuf::from),
            path_var: env::var_os("PATH"),
        }
    }
}

/// Which step identified the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    UserAgent,
    ExecPath,
    Lockfile,
    ConfigFile,
    Executable,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub manager: PackageManager,
    pub source: DetectionSource,
}

fn user_agent_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-z]+)/").expect("static regex"))
}

/// Identify the package manager for `dir`.
///
/// Steps, first match wins: tool identity from the environment, the host
/// runtime's exec path, a lockfile in `dir` or an ancestor, a manager config
/// file in the same lineage, a manager executable on `PATH`. Within each step
/// managers are tried in [`PRIORITY`] order. Falls back to npm.
pub fn detect_package_manager(dir: &Path, env: &DetectionEnv) -> Detection {
    let detection = from_user_agent(env)
        .map(|m| (m, DetectionSource::UserAgent))
        .or_else(|| from_exec_path(env).map(|m| (m, DetectionSource::ExecPath)))
        .or_else(|| {
            find_in_lineage(dir, PackageManager::lockfiles).map(|m| (m, DetectionSource::Lockfile))
        })
        .or_else(|| {
            find_in_lineage(dir, PackageManager::config_files)
                .map(|m| (m, DetectionSource::ConfigFile))
        })
        .or_else(|| from_executables(dir, env).map(|m| (m, DetectionSource::Executable)));

    let (manager, source) = detection.unwrap_or((PackageManager::Npm, DetectionSource::Default));
    debug!(%manager, ?source, dir = %dir.display(), "detected package manager");
    Detection { manager, source }
}

fn from_user_agent(env: &DetectionEnv) -> Option<PackageManager> {
    let agent = env.user_agent.as_deref()?;
    let captures = user_agent_regex().captures(agent)?;
    PackageManager::from_command(captures.get(1)?.as_str())
}

fn from_exec_path(env: &DetectionEnv) -> Option<PackageManager> {
    let exec_path = env.exec_path.as_deref()?;
    let file_name = exec_path.file_name()?.to_str()?.to_ascii_lowercase();
    // npm-cli.js, pnpm.cjs, yarn.js, bun, deno.exe ...
    PRIORITY.iter().copied().find(|pm| {
        let command = pm.command();
        file_name == command
            || file_name.starts_with(&format!("{}.", command))
            || file_name.starts_with(&format!("{}-", command))
    })
}

fn find_in_lineage(
    dir: &Path,
    markers: fn(&PackageManager) -> &'static [&'static str],
) -> Option<PackageManager> {
    dir.ancestors().find_map(|ancestor| {
        PRIORITY
            .iter()
            .copied()
            .find(|pm| markers(pm).iter().any(|name| ancestor.join(name).is_file()))
    })
}

fn from_executables(dir: &Path, env: &DetectionEnv) -> Option<PackageManager> {
    let path_var = env.path_var.as_ref()?;
    PRIORITY
        .iter()
        .copied()
        .find(|pm| which::which_in(pm.command(), Some(path_var), dir).is_ok())
}
