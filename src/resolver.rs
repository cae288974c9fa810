//! Source file resolution
//!
//! Turns a naming pattern such as `A-brute.cpp` or `gen/A*` into exactly one
//! source file plus the code template that handles it.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use regex::Regex;
use tokio::fs;

use crate::config::CodeTemplate;
use crate::error::{AppError, AppResult};
use crate::runner::Role;
use crate::template::TemplateContext;

/// A resolved source file for one role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDescriptor {
    pub role: Role,
    /// Full path of the source file
    pub path: PathBuf,
    /// Directory part, including the trailing separator
    pub path_dir: String,
    /// File name with extension
    pub full_name: String,
    /// File name without extension
    pub file_stem: String,
    /// Extension without the dot
    pub extension: String,
    /// Index of the template handling this file
    pub template_index: usize,
}

impl ProgramDescriptor {
    /// Split a resolved path into its templating parts
    pub fn from_path(role: Role, path: PathBuf, template_index: usize) -> AppResult<Self> {
        let full_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                AppError::CodeResolution(format!("{} is not a valid file name", path.display()))
            })?
            .to_string();
        let file_stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&full_name)
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let path_dir = match path.parent().map(|p| p.to_string_lossy().into_owned()) {
            Some(dir) if !dir.is_empty() => format!("{}{}", dir.trim_end_matches(MAIN_SEPARATOR), MAIN_SEPARATOR),
            _ => String::new(),
        };

        Ok(Self {
            role,
            path,
            path_dir,
            full_name,
            file_stem,
            extension,
            template_index,
        })
    }

    /// Placeholder values for this program's scripts
    pub fn template_context(&self, task: &str, random_token: &str) -> TemplateContext {
        TemplateContext {
            path_dir: self.path_dir.clone(),
            full_name: self.full_name.clone(),
            file_stem: self.file_stem.clone(),
            task: task.to_string(),
            random_token: random_token.to_string(),
        }
    }
}

/// Compile the file-name part of a naming pattern.
///
/// `*` matches any run of characters and `?` exactly one; everything else
/// is literal.
fn pattern_regex(name_pattern: &str) -> AppResult<Regex> {
    let escaped = regex::escape(name_pattern)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    Regex::new(&format!("^{}$", escaped))
        .map_err(|e| AppError::CodeResolution(format!("invalid pattern `{}`: {}", name_pattern, e)))
}

/// Find the single source file matching `pattern` under `base_dir`.
///
/// Only files whose extension some template handles are considered. Returns
/// the file path and the index of the first template handling it.
pub async fn resolve(
    pattern: &str,
    templates: &[CodeTemplate],
    base_dir: &Path,
) -> AppResult<(PathBuf, usize)> {
    let pattern_path = Path::new(pattern);
    let name_pattern = pattern_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::CodeResolution(format!("`{}` does not name a file", pattern)))?;
    let dir = match pattern_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => base_dir.join(parent),
        _ => base_dir.to_path_buf(),
    };
    let matcher = pattern_regex(name_pattern)?;

    let mut entries = fs::read_dir(&dir).await.map_err(|e| {
        AppError::CodeResolution(format!("cannot read directory {}: {}", dir.display(), e))
    })?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !matcher.is_match(&name) {
            continue;
        }
        if !fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
            continue;
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        if let Some(index) = templates.iter().position(|t| t.handles_extension(ext)) {
            candidates.push((path, index));
        }
    }
    candidates.sort();

    match candidates.len() {
        0 => Err(AppError::CodeResolution(format!(
            "cannot find any code matching `{}` in {}; add a template for its extension or check the naming",
            pattern,
            dir.display()
        ))),
        1 => Ok(candidates.remove(0)),
        _ => {
            let names: Vec<String> = candidates
                .iter()
                .map(|(path, _)| path.display().to_string())
                .collect();
            Err(AppError::CodeResolution(format!(
                "multiple files match `{}`: {}",
                pattern,
                names.join(", ")
            )))
        }
    }
}
