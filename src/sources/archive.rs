//! Source archive synthesis
//!
//! When a checkout tracks no lookaside sources, the `Source:` archive is
//! built from a local tree: the tree is copied into a staging directory named
//! after the archive base, tar is run with a compression flag chosen from the
//! archive extension, and the staging copy is removed.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::SourceError;
use crate::process::Invocation;

/// Known archive extensions, longest match first
const EXTENSIONS: &[&str] = &[".tar.gz", ".tar.xz", ".tar.bz2", ".tgz", ".tar"];

/// Archive extension of `name`, or `""` when unrecognized
pub fn archive_extension(name: &str) -> &'static str {
    EXTENSIONS
        .iter()
        .find(|ext| name.ends_with(**ext))
        .copied()
        .unwrap_or("")
}

/// Archive name with its recognized extension stripped
pub fn base_name(name: &str) -> &str {
    &name[..name.len() - archive_extension(name).len()]
}

/// tar creation flag for an archive name
fn tar_flag(name: &str) -> &'static str {
    match archive_extension(name) {
        ".tar.gz" | ".tgz" => "-czf",
        ".tar.xz" => "-cJf",
        ".tar.bz2" => "-cjf",
        // Unknown extensions get an uncompressed tar.
        _ => "-cf",
    }
}

fn copy_tree(src: &Path, dest: &Path) -> Result<(), SourceError> {
    let io_err = |path: PathBuf| {
        move |source: std::io::Error| SourceError::Io { path, source }
    };

    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| SourceError::Io {
            path: src.to_path_buf(),
            source: e.into(),
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir yields paths under its root");
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(io_err(target.clone()))?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(io_err(target.clone()))?;
        }
    }
    Ok(())
}

/// Package `tree` into `dest_dir/<archive_name>`
///
/// A pre-existing staging copy or archive is replaced. The staging copy is
/// removed again whether or not tar succeeded.
// TODO: surface the tar exit status instead of discarding it; a failed tar
// currently leaves the previous archive deleted without an error.
pub fn package_tree(
    tree: &Path,
    dest_dir: &Path,
    archive_name: &str,
) -> Result<(), SourceError> {
    let staging_name = base_name(archive_name).to_string();
    let staging = dest_dir.join(&staging_name);
    let archive = dest_dir.join(archive_name);

    let io_err = |path: PathBuf| {
        move |source: std::io::Error| SourceError::Io { path, source }
    };

    if staging.exists() && staging != *tree {
        std::fs::remove_dir_all(&staging).map_err(io_err(staging.clone()))?;
    }
    if archive.exists() {
        std::fs::remove_file(&archive).map_err(io_err(archive.clone()))?;
    }

    if staging != *tree {
        copy_tree(tree, &staging)?;
    }

    debug!(archive = %archive.display(), "packaging source tree");
    let result = Invocation::new("tar")
        .current_dir(dest_dir)
        .arg(tar_flag(archive_name))
        .arg(archive_name)
        .arg(staging_name.as_str())
        .run();

    if staging != *tree {
        let _ = std::fs::remove_dir_all(&staging);
    }

    result?;
    Ok(())
}
