//! Case-insensitive path handling for archive-internal paths
//!
//! Resource paths in the mod list are lowercase with forward slashes, but the
//! files on disk may have been written by tools that preserve other casing.

use std::path::{Component, Path, PathBuf};

/// Normalize a path for lookups and comparisons (lowercase, forward slashes, trimmed)
pub fn normalize_for_lookup(path: &str) -> String {
    path.to_lowercase()
        .replace('\\', "/")
        .trim_matches('/')
        .to_string()
}

/// True when joining `path` onto a directory stays inside it: not empty, no
/// root or drive prefix, no `.` or `..` segments under either separator
pub fn is_safe_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        && path.split(['\\', '/']).all(|s| s != "." && s != "..")
}

/// Find a file case-insensitively within a directory
///
/// Given a base directory and a relative path like `chara/equipment/e0201/x.tex`,
/// finds the actual file even if the real path is `Chara/EQUIPMENT/e0201/X.tex`
pub fn resolve_case_insensitive(base: &Path, relative: &str) -> Option<PathBuf> {
    let components: Vec<&str> = relative
        .split(['\\', '/'])
        .filter(|s| !s.is_empty())
        .collect();

    if components.is_empty() {
        return Some(base.to_path_buf());
    }

    let mut current = base.to_path_buf();

    for component in components {
        // Exact match first, avoids a directory scan
        let direct = current.join(component);
        if direct.exists() {
            current = direct;
            continue;
        }

        let target_lower = component.to_lowercase();
        let found = std::fs::read_dir(&current).ok()?.find_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name();
            if name.to_string_lossy().to_lowercase() == target_lower {
                Some(entry.path())
            } else {
                None
            }
        });

        current = found?;
    }

    Some(current)
}

/// Create parent directories for a path if they don't exist
pub fn ensure_parent_dirs(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Relative path as a lookup key: `Chara\Equipment\X.tex` -> `chara/equipment/x.tex`
pub fn relative_key(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    Some(normalize_for_lookup(&relative.to_string_lossy()))
}
