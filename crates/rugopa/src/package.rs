// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Packaging of the compiled drives.
//!
//! After a successful production build each drive is archived into
//! `<drive>.zip` (entries relative to the drive root). The archives are
//! written to a staging directory inside the run directory and then swapped
//! into the distribution directory, so a failed packaging run leaves the
//! previous distribution in place.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::PackagingError;
use crate::scan::{scan_tree, to_slash};
use crate::workspace::{Drive, Workspace};

const STAGING_DIR: &str = "dist-staging";

/// Archives produced by [`package`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutput {
    /// Distribution directory.
    pub dist_dir: PathBuf,
    /// Archive paths inside `dist_dir`, statics first.
    pub archives: Vec<PathBuf>,
}

/// Archive file name for a drive.
pub fn archive_name(drive: Drive) -> String {
    format!("{}.zip", drive.as_str())
}

/// Archives both drives and replaces `dist_dir` with the result.
///
/// # Errors
///
/// Returns [`PackagingError`] when archiving or any filesystem step fails.
/// Failures before the swap leave `dist_dir` untouched.
pub fn package(workspace: &Workspace, dist_dir: &Path) -> Result<PackageOutput, PackagingError> {
    let staging = workspace.run_root.join(STAGING_DIR);
    remove_if_exists(&staging)?;
    fs::create_dir_all(&staging).map_err(|e| io_error("create", &staging, e))?;

    for drive in Drive::ALL {
        let archive = staging.join(archive_name(drive));
        let count = archive_dir(workspace.drive_dir(drive), &archive)?;
        tracing::debug!("Archived {} file(s) from {} into {}", count, drive, archive.display());
    }

    swap_into(&staging, dist_dir)?;

    Ok(PackageOutput {
        dist_dir: dist_dir.to_path_buf(),
        archives: Drive::ALL.iter().map(|d| dist_dir.join(archive_name(*d))).collect(),
    })
}

/// Writes every file under `dir` into a deflated zip at `archive`.
///
/// Returns the number of archived files.
pub fn archive_dir(dir: &Path, archive: &Path) -> Result<usize, PackagingError> {
    let archive_error = |e: zip::result::ZipError| PackagingError::Archive {
        path: archive.to_path_buf(),
        message: e.to_string(),
    };

    let file = File::create(archive).map_err(|e| io_error("create", archive, e))?;
    let mut writer = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let files = scan_tree(dir);
    for relative in &files {
        let source = dir.join(relative);
        writer.start_file(to_slash(relative), options).map_err(archive_error)?;

        let mut input = File::open(&source).map_err(|e| io_error("read", &source, e))?;
        io::copy(&mut input, &mut writer).map_err(|e| io_error("archive", &source, e))?;
    }

    writer.finish().map_err(archive_error)?;
    Ok(files.len())
}

fn swap_into(staging: &Path, dist_dir: &Path) -> Result<(), PackagingError> {
    let previous = dist_dir.with_file_name(format!(
        ".{}.old",
        dist_dir.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
    ));
    remove_if_exists(&previous)?;

    if dist_dir.exists() {
        fs::rename(dist_dir, &previous).map_err(|e| io_error("move aside", dist_dir, e))?;
    } else if let Some(parent) = dist_dir.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error("create", parent, e))?;
    }

    if let Err(e) = fs::rename(staging, dist_dir) {
        // Staging and dist may live on different filesystems
        tracing::debug!("Rename into {} failed ({}), copying instead", dist_dir.display(), e);
        copy_dir(staging, dist_dir)?;
        remove_if_exists(staging)?;
    }

    remove_if_exists(&previous)
}

fn copy_dir(from: &Path, to: &Path) -> Result<(), PackagingError> {
    fs::create_dir_all(to).map_err(|e| io_error("create", to, e))?;
    for relative in scan_tree(from) {
        let target = to.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error("create", parent, e))?;
        }
        fs::copy(from.join(&relative), &target).map_err(|e| io_error("copy", &target, e))?;
    }
    Ok(())
}

fn remove_if_exists(dir: &Path) -> Result<(), PackagingError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error("remove", dir, e)),
    }
}

fn io_error(action: &'static str, path: &Path, source: io::Error) -> PackagingError {
    PackagingError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;
    use zip::ZipArchive;

    fn entries(archive: &Path) -> Vec<String> {
        let archive = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        names
    }

    fn built_workspace(root: &Path) -> Workspace {
        let ws = Workspace::prepare(root).unwrap();
        fs::create_dir_all(ws.static_dir.join("images")).unwrap();
        fs::write(ws.static_dir.join("main.3f2a.js"), "console.log(1)").unwrap();
        fs::write(ws.static_dir.join("images/logo.png"), [0u8, 1, 2]).unwrap();
        fs::create_dir_all(ws.view_dir.join("parts")).unwrap();
        fs::write(ws.view_dir.join("index.ejs"), "<h1>{{ title }}</h1>").unwrap();
        fs::write(ws.view_dir.join("parts/header.ejs"), "<header></header>").unwrap();
        ws
    }

    #[test]
    fn test_package_writes_both_archives() {
        let dir = tempdir().unwrap();
        let ws = built_workspace(dir.path());
        let dist = dir.path().join("dist");

        let output = package(&ws, &dist).unwrap();

        assert_eq!(output.archives, vec![dist.join("statics.zip"), dist.join("views.zip")]);
        assert_eq!(
            entries(&dist.join("statics.zip")),
            vec!["images/logo.png", "main.3f2a.js"]
        );
        assert_eq!(
            entries(&dist.join("views.zip")),
            vec!["index.ejs", "parts/header.ejs"]
        );
        assert!(!ws.run_root.join(STAGING_DIR).exists());
    }

    #[test]
    fn test_archive_content_roundtrip() {
        let dir = tempdir().unwrap();
        let ws = built_workspace(dir.path());
        let dist = dir.path().join("dist");
        package(&ws, &dist).unwrap();

        let mut archive = ZipArchive::new(File::open(dist.join("views.zip")).unwrap()).unwrap();
        let mut content = String::new();
        archive
            .by_name("index.ejs")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "<h1>{{ title }}</h1>");
    }

    #[test]
    fn test_package_replaces_previous_dist() {
        let dir = tempdir().unwrap();
        let ws = built_workspace(dir.path());
        let dist = dir.path().join("dist");
        fs::create_dir_all(&dist).unwrap();
        fs::write(dist.join("stale.zip"), "old").unwrap();

        package(&ws, &dist).unwrap();

        let mut names: Vec<_> = scan_tree(&dist);
        names.sort();
        assert_eq!(names, vec![PathBuf::from("statics.zip"), PathBuf::from("views.zip")]);
        assert!(!dir.path().join(".dist.old").exists());
    }

    #[test]
    fn test_empty_drives_produce_empty_archives() {
        let dir = tempdir().unwrap();
        let ws = Workspace::prepare(dir.path()).unwrap();
        let dist = dir.path().join("out/dist");

        package(&ws, &dist).unwrap();
        assert!(entries(&dist.join("statics.zip")).is_empty());
        assert!(entries(&dist.join("views.zip")).is_empty());
    }
}
