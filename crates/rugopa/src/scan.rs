// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Flattened directory listings.

use path_clean::PathClean;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lists every file under `root` as a path relative to `root`.
///
/// Directories themselves are not listed. The result is sorted so callers
/// get the same order on every platform. A missing or unreadable root, and
/// unreadable subdirectories, contribute nothing.
pub fn scan_tree(root: &Path) -> Vec<PathBuf> {
    scan_tree_excluding(root, &[])
}

/// Like [`scan_tree`], but skips the subtrees rooted at any of `excluded`.
///
/// `excluded` holds absolute paths (or paths under `root`). Symlinked files
/// are followed; symlinked directories are not descended into.
pub fn scan_tree_excluding(root: &Path, excluded: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !excluded.iter().any(|x| e.path() == x.as_path()))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() || (e.path_is_symlink() && e.path().is_file()))
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}

/// Lexically normalizes a path: drops `.` components and resolves `..`
/// against earlier components.
///
/// `./assets/../images/a.png` becomes `images/a.png`. Leading `..` that
/// cannot be resolved are kept. An empty result stays empty.
pub fn normalize(path: &Path) -> PathBuf {
    let cleaned = path.clean();
    if cleaned == Path::new(".") {
        PathBuf::new()
    } else {
        cleaned
    }
}

/// Renders a path with forward slashes, as bundlers and URLs expect.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
        .replace("//", "/")
}

/// Path of `target` relative to the directory `base`.
///
/// Both paths must be absolute or both relative to the same root. Returns
/// `None` when they share no common prefix (e.g. different drives).
pub fn relative_to(target: &Path, base: &Path) -> Option<PathBuf> {
    let target = normalize(target);
    let base = normalize(base);

    let target_parts: Vec<_> = target.components().collect();
    let base_parts: Vec<_> = base.components().collect();

    let common = target_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    if common == 0 && target.has_root() {
        return None;
    }

    let mut result = PathBuf::new();
    for _ in common..base_parts.len() {
        result.push("..");
    }
    for part in &target_parts[common..] {
        result.push(part.as_os_str());
    }
    Some(result)
}
