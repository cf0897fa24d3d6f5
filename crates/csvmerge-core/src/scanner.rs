//! Directory scanner for selecting the CSV files to merge

use crate::error::{Error, Result};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Select files under `root` whose names match `pattern`, sorted by path
///
/// Without `recursive` only the files directly inside `root` are considered,
/// or as deep as the pattern reaches when it names subdirectories. A pattern
/// containing a path separator is matched against the path relative to
/// `root` instead of the bare file name.
pub fn select_files<P: AsRef<Path>>(root: P, pattern: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    let matcher = Pattern::new(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })?;
    let match_relative = pattern.contains('/') || pattern.contains(std::path::MAIN_SEPARATOR);

    let mut walker = WalkDir::new(root).min_depth(1).follow_links(true);
    if !recursive {
        walker = walker.max_depth(pattern_depth(pattern));
    }

    let mut files = Vec::new();
    for entry in walker.into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let matched = if match_relative {
            path.strip_prefix(root)
                .map(|rel| matcher.matches_path_with(rel, match_options(true)))
                .unwrap_or(false)
        } else {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| matcher.matches_with(name, match_options(false)))
        };

        if matched {
            files.push(path.to_path_buf());
        }
    }

    files.sort();

    if files.is_empty() {
        return Err(Error::NoInputFiles {
            root: root.to_path_buf(),
            pattern: pattern.to_string(),
        });
    }

    debug!(root = %root.display(), count = files.len(), "selected input files");
    Ok(files)
}

/// Number of path components a pattern spans
fn pattern_depth(pattern: &str) -> usize {
    pattern
        .split(|c| c == '/' || c == std::path::MAIN_SEPARATOR)
        .filter(|part| !part.is_empty())
        .count()
        .max(1)
}

fn match_options(literal_separator: bool) -> MatchOptions {
    MatchOptions {
        case_sensitive: !cfg!(windows),
        require_literal_separator: literal_separator,
        require_literal_leading_dot: true,
    }
}

/// Drop `output` from the selected files so a merge never reads its own result
pub fn exclude_output(files: Vec<PathBuf>, output: &Path) -> Vec<PathBuf> {
    let target = resolve_path(output);
    files
        .into_iter()
        .filter(|f| {
            let keep = resolve_path(f) != target;
            if !keep {
                debug!(path = %f.display(), "excluding output file from inputs");
            }
            keep
        })
        .collect()
}

/// Canonical form of a path that may not exist yet
fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            parent
                .canonicalize()
                .map(|p| p.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}
