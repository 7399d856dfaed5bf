use std::path::PathBuf;

use serde::Serialize;

use super::OutputFormat;
use crate::collector::{MatchedCollection, ResolvedFiles};
use crate::error::{DependencyProblems, ResolveError};
use crate::workspace::{Detection, Workspace};

/// Outcome of resolving one entrypoint, as printed.
#[derive(Debug, Serialize)]
pub struct ResolveReport {
    pub entrypoint: PathBuf,
    pub status: ReportStatus,
    pub files: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problems: Option<DependencyProblems>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Ok,
    Problems,
    Error,
}

impl ResolveReport {
    pub fn resolved(resolved: &ResolvedFiles) -> Self {
        Self {
            entrypoint: resolved.entrypoint.path.clone(),
            status: ReportStatus::Ok,
            files: resolved.files.iter().map(|f| f.path.clone()).collect(),
            problems: None,
            error: None,
        }
    }

    pub fn problems(entrypoint: &std::path::Path, problems: DependencyProblems) -> Self {
        Self {
            entrypoint: entrypoint.to_path_buf(),
            status: ReportStatus::Problems,
            files: Vec::new(),
            problems: Some(problems),
            error: None,
        }
    }

    pub fn failed(entrypoint: &std::path::Path, err: &ResolveError) -> Self {
        Self {
            entrypoint: entrypoint.to_path_buf(),
            status: ReportStatus::Error,
            files: Vec::new(),
            problems: None,
            error: Some(err.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReportStatus::Ok
    }
}

/// Format any serializable value as JSON.
pub fn format_json<T: Serialize>(value: &T, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Compact => serde_json::to_string(value).unwrap_or_default(),
        OutputFormat::Json | OutputFormat::Text => {
            serde_json::to_string_pretty(value).unwrap_or_default()
        }
    }
}

pub fn format_resolve_reports(reports: &[ResolveReport], format: &OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Compact => format_json(&reports, format),
        OutputFormat::Text => {
            let mut output = String::new();
            for report in reports {
                match report.status {
                    ReportStatus::Ok => {
                        output.push_str(&format!(
                            "{}: {} file(s)\n",
                            report.entrypoint.display(),
                            report.files.len()
                        ));
                        for file in &report.files {
                            output.push_str(&format!("  {}\n", file.display()));
                        }
                    }
                    ReportStatus::Problems => {
                        if let Some(problems) = &report.problems {
                            output.push_str(&format!("{}\n", problems));
                        }
                    }
                    ReportStatus::Error => {
                        output.push_str(&format!(
                            "{}: error: {}\n",
                            report.entrypoint.display(),
                            report.error.as_deref().unwrap_or("unknown error")
                        ));
                    }
                }
            }
            output.trim_end().to_string()
        }
    }
}

pub fn format_collection(collection: &MatchedCollection, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Compact => format_json(collection, format),
        OutputFormat::Text => {
            let mut output = format!("Collected {} file(s)\n", collection.files.len());
            for file in &collection.files {
                output.push_str(&format!("  {}\n", file.display()));
            }
            if !collection.errors.is_empty() {
                output.push_str(&format!("\n{} error(s):\n", collection.errors.len()));
                for error in &collection.errors {
                    output.push_str(&format!("  {}: {}\n", error.file.display(), error.message));
                }
            }
            output.trim_end().to_string()
        }
    }
}

pub fn format_workspace(
    detection: &Detection,
    workspace: Option<&Workspace>,
    format: &OutputFormat,
) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Compact => {
            let value = serde_json::json!({
                "package_manager": detection.manager.command(),
                "detected_by": format!("{:?}", detection.source).to_lowercase(),
                "workspace": workspace,
            });
            format_json(&value, format)
        }
        OutputFormat::Text => {
            let mut output = format!(
                "Package manager: {} (detected by {:?})\n",
                detection.manager, detection.source
            );
            match workspace {
                Some(ws) => {
                    output.push_str(&format!(
                        "Workspace root: {} ({})\n",
                        ws.root.path.display(),
                        ws.root.name
                    ));
                    output.push_str(&format!("Members: {}\n", ws.members.len()));
                    for member in &ws.members {
                        output.push_str(&format!(
                            "  {:<30} {}\n",
                            member.name,
                            member.path.display()
                        ));
                    }
                }
                None => output.push_str("No workspace found\n"),
            }
            output.trim_end().to_string()
        }
    }
}
