use std::path::{Path, PathBuf};

use glob::glob;
use walkdir::WalkDir;

use crate::error::{Result, SpectrumError};

fn is_pattern(text: &str) -> bool {
    text.contains('*') || text.contains('?') || text.contains('[')
}

fn name_matches(path: &Path, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(needle) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.contains(needle)),
    }
}

fn extension_allowed(path: &Path, extensions: &[&str]) -> bool {
    extensions.is_empty()
        || path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.contains(&e.to_ascii_lowercase().as_str()))
}

/// Resolve `input` into a sorted, de-duplicated file list.
///
/// * a glob pattern expands to the files it matches;
/// * a directory is walked recursively, keeping files whose extension is in
///   `extensions` (all files when empty) and skipping hidden entries;
/// * a plain file is taken as-is.
///
/// `name_filter` keeps only files whose name contains the given substring.
/// Finding nothing is an error.
pub fn discover_inputs(
    input: &Path,
    name_filter: Option<&str>,
    extensions: &[&str],
) -> Result<Vec<PathBuf>> {
    let text = input.to_string_lossy();
    let mut found = Vec::new();

    if is_pattern(&text) {
        for entry in glob(&text)? {
            let path = entry?;
            if path.is_file() {
                found.push(path);
            }
        }
    } else if input.is_dir() {
        let walker = WalkDir::new(input)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.')
            });
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_file() && extension_allowed(entry.path(), extensions) {
                found.push(entry.into_path());
            }
        }
    } else if input.is_file() {
        found.push(input.to_path_buf());
    }

    found.retain(|p| name_matches(p, name_filter));
    found.sort();
    found.dedup();

    if found.is_empty() {
        let pattern = match name_filter {
            Some(f) => format!("{text} (name containing '{f}')"),
            None => text.into_owned(),
        };
        return Err(SpectrumError::EmptyInput { pattern });
    }
    Ok(found)
}
