//! Module packages on disk: plain directories and `.tar.gz` archives.
//!
//! A package holds its manifest either at the root or inside a single
//! top-level directory (the usual layout of `tar czf name.tar.gz name/`).

use crate::modules::manifest::{MANIFEST_FILE, ModuleManifest};
use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::Archive;

use super::{AcquisitionError, Result};

/// Whether `path` names a gzip-compressed tarball.
pub fn is_archive(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// Unpacks a `.tar.gz` archive into `dest`.
pub fn unpack(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive)?;
    unpack_reader(file, dest)
}

/// Unpacks gzip-compressed tar bytes into `dest`.
pub fn unpack_bytes(bytes: &[u8], dest: &Path) -> Result<()> {
    unpack_reader(bytes, dest)
}

fn unpack_reader<R: std::io::Read>(reader: R, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    let mut archive = Archive::new(GzDecoder::new(reader));
    archive
        .unpack(dest)
        .map_err(|e| AcquisitionError::InvalidPackage(format!("failed to unpack archive: {}", e)))
}

/// Locates the directory holding the manifest inside an unpacked package.
pub fn package_root(dir: &Path) -> Result<PathBuf> {
    if dir.join(MANIFEST_FILE).is_file() {
        return Ok(dir.to_path_buf());
    }

    let mut subdirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            subdirs.push(entry.path());
        }
    }

    match subdirs.as_slice() {
        [only] if only.join(MANIFEST_FILE).is_file() => Ok(only.clone()),
        _ => Err(AcquisitionError::InvalidPackage(format!(
            "no {} found in {}",
            MANIFEST_FILE,
            dir.display()
        ))),
    }
}

/// Reads and validates the manifest of a directory or archive package.
pub fn read_manifest(location: &Path) -> Result<ModuleManifest> {
    if location.is_dir() {
        let root = package_root(location)?;
        return Ok(ModuleManifest::load_from_dir(&root)?);
    }

    if location.is_file() && is_archive(location) {
        let staging = tempfile::tempdir()?;
        unpack(location, staging.path())?;
        let root = package_root(staging.path())?;
        return Ok(ModuleManifest::load_from_dir(&root)?);
    }

    Err(AcquisitionError::InvalidPackage(format!(
        "{} is neither a module directory nor a .tar.gz archive",
        location.display()
    )))
}

/// Recursively copies a directory.
pub fn copy_dir_all(source: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;

    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if path.is_dir() {
            copy_dir_all(&path, &dest_path)?;
        } else {
            std::fs::copy(&path, &dest_path)?;
        }
    }

    Ok(())
}
