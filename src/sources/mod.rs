//! Source artifact reconciliation
//!
//! Tracked sources are listed in a `sources` manifest at the top of the
//! checkout, in either the old two-token form (`<md5hex> <filename>`) or the
//! BSD form (`SHA512 (<filename>) = <hex>`). When a manifest exists, every
//! entry is re-fetched from the lookaside cache and verified. When it does
//! not, the source archive is synthesized from a local tree instead.

pub mod archive;

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::checksum::{self, ChecksumError, HashType};
use crate::config::LaneConfig;
use crate::spec::{ModuleMetadata, SpecError};

/// Manifest filename inside a checkout
pub const MANIFEST_NAME: &str = "sources";

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed sources line: {line:?}")]
    Manifest { line: String },

    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    #[error("Download of {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    #[error("No source tree to package at {path}")]
    NoSourceTree { path: PathBuf },

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Process(#[from] crate::process::ProcessError),
}

/// One tracked source artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub filename: String,
    pub hashtype: HashType,
    pub hash: String,
}

/// Parse a sources manifest, accepting both line formats
pub fn parse_manifest(text: &str) -> Result<Vec<SourceEntry>, SourceError> {
    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        entries.push(parse_line(line)?);
    }
    Ok(entries)
}

fn parse_line(line: &str) -> Result<SourceEntry, SourceError> {
    let malformed = || SourceError::Manifest {
        line: line.to_string(),
    };

    // BSD form: HASHTYPE (filename) = hex
    if let Some((head, hash)) = line.split_once(" = ") {
        let (hashtype, filename) = head.split_once(' ').ok_or_else(malformed)?;
        let filename = filename
            .strip_prefix('(')
            .and_then(|f| f.strip_suffix(')'))
            .ok_or_else(malformed)?;
        let hashtype: HashType = hashtype.parse().map_err(|_| malformed())?;
        return Ok(SourceEntry {
            filename: filename.to_string(),
            hashtype,
            hash: hash.trim().to_string(),
        });
    }

    // Old form: md5hex filename
    let mut tokens = line.split_whitespace();
    let hash = tokens.next().ok_or_else(malformed)?;
    let filename = tokens.next().ok_or_else(malformed)?;
    if tokens.next().is_some() {
        return Err(malformed());
    }
    Ok(SourceEntry {
        filename: filename.to_string(),
        hashtype: HashType::Md5,
        hash: hash.to_string(),
    })
}

/// Read the manifest from a checkout; `None` when the file does not exist
pub fn load_manifest(dir: &Path) -> Result<Option<Vec<SourceEntry>>, SourceError> {
    let path = dir.join(MANIFEST_NAME);
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path).map_err(|source| SourceError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(Some(parse_manifest(&text)?))
}

/// Rewrite the manifest and `.gitignore` for a new set of tracked files
pub fn write_manifest(dir: &Path, entries: &[SourceEntry]) -> Result<(), SourceError> {
    let mut manifest = String::new();
    let mut gitignore = String::new();
    for entry in entries {
        let line = match entry.hashtype {
            HashType::Md5 => format!("{} {}\n", entry.hash, entry.filename),
            other => format!(
                "{} ({}) = {}\n",
                other.as_str().to_uppercase(),
                entry.filename,
                entry.hash
            ),
        };
        manifest.push_str(&line);
        gitignore.push_str(&format!("/{}\n", entry.filename));
    }

    for (name, content) in [(MANIFEST_NAME, manifest), (".gitignore", gitignore)] {
        let path = dir.join(name);
        std::fs::write(&path, content).map_err(|source| SourceError::Io { path, source })?;
    }
    Ok(())
}

/// Download access for lookaside artifacts
pub trait Fetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), SourceError>;
}

/// HTTP fetcher against the lookaside cache
#[derive(Debug, Default)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<(), SourceError> {
        let failed = |reason: String| SourceError::Fetch {
            url: url.to_string(),
            reason,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| failed(e.to_string()))?;

        let mut file = File::create(dest).map_err(|source| SourceError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        response
            .copy_to(&mut file)
            .map_err(|e| failed(e.to_string()))?;
        Ok(())
    }
}

/// Fetch one manifest entry into `dest_dir` and verify it
///
/// Any pre-existing local copy is dropped first; a checksum mismatch deletes
/// the download and is not retried.
pub fn fetch_entry(
    config: &LaneConfig,
    module: &str,
    entry: &SourceEntry,
    dest_dir: &Path,
    fetcher: &dyn Fetcher,
) -> Result<(), SourceError> {
    let dest = dest_dir.join(&entry.filename);
    if dest.exists() {
        std::fs::remove_file(&dest).map_err(|source| SourceError::Io {
            path: dest.clone(),
            source,
        })?;
    }

    let url = config.lookaside_entry_url(
        module,
        &entry.filename,
        entry.hashtype.as_str(),
        &entry.hash,
    );
    debug!(url = %url, "fetching source artifact");
    fetcher.fetch(&url, &dest)?;
    checksum::verify_or_remove(&dest, entry.hashtype, &entry.hash)?;
    Ok(())
}

/// Bring the checkout's source artifacts up to date
///
/// Manifest present: drop and re-fetch every entry. No manifest: synthesize
/// the spec's `Source:` archive from the matching local tree.
pub fn ensure_sources(
    config: &LaneConfig,
    module: &str,
    module_dir: &Path,
    metadata: &ModuleMetadata,
    fetcher: &dyn Fetcher,
) -> Result<(), SourceError> {
    if let Some(entries) = load_manifest(module_dir)? {
        for entry in &entries {
            fetch_entry(config, module, entry, module_dir, fetcher)?;
        }
        info!(module, count = entries.len(), "sources fetched from lookaside");
        return Ok(());
    }

    let archive_name = metadata.source_filename()?;
    let tree = module_dir.join(archive::base_name(&archive_name));
    if !tree.is_dir() {
        return Err(SourceError::NoSourceTree { path: tree });
    }
    archive::package_tree(&tree, module_dir, &archive_name)?;
    info!(module, archive = %archive_name, "source archive synthesized");
    Ok(())
}
