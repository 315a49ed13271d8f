//! Lookaside uploads
//!
//! `new-sources` stages the given files into a per-package work directory,
//! pushes it to the lookaside endpoint over scp, and rewrites the `sources`
//! manifest and `.gitignore` to track the new set.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::checksum::{digest_file, ChecksumError, HashType};
use crate::config::LaneConfig;
use crate::process::{Invocation, ProcessError};
use crate::sources::{write_manifest, SourceEntry, SourceError};

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    #[error(transparent)]
    Manifest(#[from] SourceError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

#[derive(Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    Done,
    /// A previous run's work directory is still present; nothing uploaded
    WorkDirBusy(PathBuf),
}

pub struct Uploader {
    work_parent: PathBuf,
    program: String,
}

impl Default for Uploader {
    fn default() -> Self {
        Self {
            work_parent: std::env::temp_dir(),
            program: "scp".to_string(),
        }
    }
}

impl Uploader {
    #[cfg(test)]
    fn with_transfer(work_parent: PathBuf, program: impl Into<String>) -> Self {
        Self {
            work_parent,
            program: program.into(),
        }
    }

    /// Stage `files`, push them to the lookaside, and retrack them in the
    /// checkout's manifest
    pub fn new_sources(
        &self,
        config: &LaneConfig,
        module: &str,
        module_dir: &Path,
        files: &[PathBuf],
    ) -> Result<UploadOutcome, UploadError> {
        let workdir = self.work_parent.join(module);
        if workdir.exists() {
            return Ok(UploadOutcome::WorkDirBusy(workdir));
        }
        std::fs::create_dir_all(&workdir).map_err(|source| UploadError::Io {
            path: workdir.clone(),
            source,
        })?;

        let staged = self.stage(&workdir, files);
        let result = staged.and_then(|entries| {
            Invocation::new(self.program.as_str())
                .arg("-r")
                .arg(workdir.display().to_string())
                .arg(config.lookaside_upload.as_str())
                .run_checked()?;
            Ok(entries)
        });

        // The work directory is transient either way; leaving it behind
        // blocks the next run.
        let _ = std::fs::remove_dir_all(&workdir);

        let entries = result?;
        write_manifest(module_dir, &entries)?;
        info!(
            module,
            count = entries.len(),
            destination = %config.lookaside_upload,
            "sources uploaded"
        );
        Ok(UploadOutcome::Done)
    }

    fn stage(&self, workdir: &Path, files: &[PathBuf]) -> Result<Vec<SourceEntry>, UploadError> {
        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let filename = file
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| UploadError::Io {
                    path: file.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "not a plain file name",
                    ),
                })?
                .to_string();

            let hash = digest_file(file, HashType::Md5)?;
            let dest = workdir.join(&filename);
            std::fs::copy(file, &dest).map_err(|source| UploadError::Io {
                path: dest,
                source,
            })?;
            entries.push(SourceEntry {
                filename,
                hashtype: HashType::Md5,
                hash,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::load_manifest;
    use std::fs;

    #[test]
    fn test_existing_workdir_blocks_upload() {
        let work = tempfile::tempdir().unwrap();
        fs::create_dir_all(work.path().join("bash")).unwrap();
        let checkout = tempfile::tempdir().unwrap();

        let uploader = Uploader::with_transfer(work.path().to_path_buf(), "true");
        let outcome = uploader
            .new_sources(&LaneConfig::default(), "bash", checkout.path(), &[])
            .unwrap();
        assert!(matches!(outcome, UploadOutcome::WorkDirBusy(_)));
    }

    #[test]
    fn test_upload_rewrites_manifest_and_cleans_workdir() {
        let work = tempfile::tempdir().unwrap();
        let checkout = tempfile::tempdir().unwrap();
        let tarball = checkout.path().join("bash-5.1.tar.gz");
        fs::write(&tarball, b"abc").unwrap();

        let uploader = Uploader::with_transfer(work.path().to_path_buf(), "true");
        let outcome = uploader
            .new_sources(
                &LaneConfig::default(),
                "bash",
                checkout.path(),
                &[tarball],
            )
            .unwrap();
        assert_eq!(outcome, UploadOutcome::Done);
        assert!(!work.path().join("bash").exists());

        let entries = load_manifest(checkout.path()).unwrap().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, "bash-5.1.tar.gz");
        assert_eq!(entries[0].hash, "900150983cd24fb0d6963f7d28e17f72");
        assert!(checkout.path().join(".gitignore").exists());
    }

    #[test]
    fn test_failed_transfer_still_cleans_workdir() {
        let work = tempfile::tempdir().unwrap();
        let checkout = tempfile::tempdir().unwrap();
        let tarball = checkout.path().join("f.tar.gz");
        fs::write(&tarball, b"abc").unwrap();

        let uploader = Uploader::with_transfer(work.path().to_path_buf(), "false");
        let err = uploader
            .new_sources(&LaneConfig::default(), "bash", checkout.path(), &[tarball])
            .unwrap_err();
        assert!(matches!(err, UploadError::Process(_)));
        assert!(!work.path().join("bash").exists());
        assert!(load_manifest(checkout.path()).unwrap().is_none());
    }
}
