//! Spec file location and package identity
//!
//! A package checkout carries exactly one spec file, `<module>*.spec`. A
//! retired package replaces it with a `dead.package` marker, which is a
//! distinct condition from a checkout that simply has no spec. The package
//! identity (name, epoch, version, release) comes from querying rpm against
//! the spec file, is parsed once, and is cached for the process lifetime.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;

use crate::process::{Invocation, ProcessError};

/// Marker file that a retired package leaves in place of its spec
pub const RETIRED_MARKER: &str = "dead.package";

#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    /// The package is retired; there is nothing to build
    #[error("Package {module} is retired ({RETIRED_MARKER} present)")]
    Retired { module: String },

    #[error("No spec file for {module} in {dir}")]
    NoSpec { module: String, dir: PathBuf },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    QueryTool(#[from] ProcessError),

    #[error("rpm query failed: {stderr}")]
    QueryFailed { stderr: String },

    #[error("Could not parse package identity from rpm output: {output:?}")]
    IdentityFormat { output: String },

    #[error("Spec file {path} has no {field} line")]
    MissingField { path: PathBuf, field: String },
}

/// A located spec file
#[derive(Debug, Clone)]
pub struct SpecFile {
    pub dir: PathBuf,
    pub filename: String,
}

impl SpecFile {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }
}

/// Find the spec file for `module` in `module_dir`
pub fn locate_spec(module_dir: &Path, module: &str) -> Result<SpecFile, SpecError> {
    let entries = std::fs::read_dir(module_dir).map_err(|source| SpecError::Io {
        path: module_dir.to_path_buf(),
        source,
    })?;

    let mut candidates: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(module) && name.ends_with(".spec"))
        .collect();
    candidates.sort();

    if let Some(filename) = candidates.into_iter().next() {
        return Ok(SpecFile {
            dir: module_dir.to_path_buf(),
            filename,
        });
    }

    // The retired marker only explains a missing spec; a checkout that still
    // carries one is buildable regardless.
    if module_dir.join(RETIRED_MARKER).exists() {
        return Err(SpecError::Retired {
            module: module.to_string(),
        });
    }

    Err(SpecError::NoSpec {
        module: module.to_string(),
        dir: module_dir.to_path_buf(),
    })
}

/// rpm macro defines that point every payload directory at the checkout
pub fn rpm_defines(module_dir: &Path, dist: &str) -> Vec<String> {
    let dir = module_dir.display();
    let mut defines = Vec::new();
    for macro_name in ["_sourcedir", "_specdir", "_builddir", "_srcrpmdir", "_rpmdir"] {
        defines.push("--define".to_string());
        defines.push(format!("{macro_name} {dir}"));
    }
    defines.push("--define".to_string());
    defines.push(format!("dist .el{dist}"));
    defines
}

/// Identity of the package a spec file describes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    pub name: String,
    pub epoch: String,
    pub version: String,
    pub release: String,
}

impl PackageIdentity {
    /// name-version-release string used as the build reference
    pub fn nvr(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.release)
    }
}

// Query format: one record per subpackage, "??"-terminated so the first
// record can be split off regardless of trailing output.
const IDENTITY_QUERY_FORMAT: &str = "%{NAME} %{EPOCH} %{VERSION} %{RELEASE}??";

/// Parse the rpm query output into an identity
///
/// Only the first "??"-terminated record is used; it must hold exactly four
/// whitespace-separated tokens. An unset epoch comes back as "(none)" and is
/// normalized to "0".
pub fn parse_identity_output(output: &str) -> Result<PackageIdentity, SpecError> {
    let first = output.split("??").next().unwrap_or("");
    let tokens: Vec<&str> = first.split_whitespace().collect();
    if tokens.len() != 4 {
        return Err(SpecError::IdentityFormat {
            output: output.to_string(),
        });
    }

    let epoch = if tokens[1] == "(none)" { "0" } else { tokens[1] };
    Ok(PackageIdentity {
        name: tokens[0].to_string(),
        epoch: epoch.to_string(),
        version: tokens[2].to_string(),
        release: tokens[3].to_string(),
    })
}

/// A spec file plus the lazily-queried identity behind it
#[derive(Debug)]
pub struct ModuleMetadata {
    spec: SpecFile,
    dist: String,
    identity: OnceCell<PackageIdentity>,
}

impl ModuleMetadata {
    pub fn new(spec: SpecFile, dist: impl Into<String>) -> Self {
        Self {
            spec,
            dist: dist.into(),
            identity: OnceCell::new(),
        }
    }

    pub fn spec(&self) -> &SpecFile {
        &self.spec
    }

    /// Package identity, queried from rpm on first use and cached
    pub fn identity(&self) -> Result<&PackageIdentity, SpecError> {
        self.identity.get_or_try_init(|| {
            let output = Invocation::new("rpm")
                .args(rpm_defines(&self.spec.dir, &self.dist))
                .args(["-q", "--qf", IDENTITY_QUERY_FORMAT, "--specfile"])
                .arg(self.spec.path().display().to_string())
                .run()?;
            // Anything on stderr means the query is not trustworthy, even
            // when rpm exits zero.
            if !output.success() || !output.stderr.trim().is_empty() {
                return Err(SpecError::QueryFailed {
                    stderr: output.stderr.trim().to_string(),
                });
            }
            parse_identity_output(&output.stdout)
        })
    }

    fn read_spec(&self) -> Result<String, SpecError> {
        std::fs::read_to_string(self.spec.path()).map_err(|source| SpecError::Io {
            path: self.spec.path(),
            source,
        })
    }

    /// Value of the first line carrying a `URL:` marker
    pub fn upstream_url(&self) -> Result<String, SpecError> {
        let text = self.read_spec()?;
        for line in text.lines() {
            if let Some((_, rest)) = line.split_once("URL:") {
                return Ok(rest.trim().to_string());
            }
        }
        Err(SpecError::MissingField {
            path: self.spec.path(),
            field: "URL:".to_string(),
        })
    }

    /// Filename of the first `Source:`/`Source0:` entry, with `%{name}` and
    /// `%{version}` substituted when present
    pub fn source_filename(&self) -> Result<String, SpecError> {
        let text = self.read_spec()?;
        for line in text.lines() {
            let trimmed = line.trim_start();
            let rest = trimmed
                .strip_prefix("Source0:")
                .or_else(|| trimmed.strip_prefix("Source:"));
            if let Some(rest) = rest {
                // A URL-form source names its file by the last path segment.
                let value = rest.trim();
                let mut name = value.rsplit('/').next().unwrap_or(value).to_string();
                // A literal filename needs no identity, so rpm is only
                // consulted when a macro actually appears.
                if name.contains("%{name}") || name.contains("%{version}") {
                    let identity = self.identity()?;
                    name = name
                        .replace("%{name}", &identity.name)
                        .replace("%{version}", &identity.version);
                }
                return Ok(name);
            }
        }
        Err(SpecError::MissingField {
            path: self.spec.path(),
            field: "Source:".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_locate_spec_prefers_module_prefix() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bash.spec"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let spec = locate_spec(dir.path(), "bash").unwrap();
        assert_eq!(spec.filename, "bash.spec");
    }

    #[test]
    fn test_locate_spec_missing_vs_retired() {
        let dir = tempfile::tempdir().unwrap();
        let err = locate_spec(dir.path(), "bash").unwrap_err();
        assert!(matches!(err, SpecError::NoSpec { .. }));

        fs::write(dir.path().join(RETIRED_MARKER), "").unwrap();
        let err = locate_spec(dir.path(), "bash").unwrap_err();
        assert!(matches!(err, SpecError::Retired { .. }));
    }

    #[test]
    fn test_locate_spec_wins_over_stale_retired_marker() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(RETIRED_MARKER), "").unwrap();
        fs::write(dir.path().join("bash.spec"), "").unwrap();

        let spec = locate_spec(dir.path(), "bash").unwrap();
        assert_eq!(spec.filename, "bash.spec");
    }

    #[test]
    fn test_parse_identity_normalizes_epoch() {
        let identity = parse_identity_output("bash (none) 5.1.8 6??more noise").unwrap();
        assert_eq!(identity.name, "bash");
        assert_eq!(identity.epoch, "0");
        assert_eq!(identity.nvr(), "bash-5.1.8-6");

        let identity = parse_identity_output("bash 2 5.1.8 6??").unwrap();
        assert_eq!(identity.epoch, "2");
    }

    #[test]
    fn test_parse_identity_rejects_wrong_token_count() {
        assert!(matches!(
            parse_identity_output("bash 5.1.8 6??"),
            Err(SpecError::IdentityFormat { .. })
        ));
        assert!(matches!(
            parse_identity_output(""),
            Err(SpecError::IdentityFormat { .. })
        ));
    }

    #[test]
    fn test_rpm_defines_cover_payload_dirs() {
        let defines = rpm_defines(Path::new("/work/bash"), "8");
        assert_eq!(defines.len(), 12);
        assert!(defines.contains(&"_sourcedir /work/bash".to_string()));
        assert!(defines.contains(&"dist .el8".to_string()));
    }

    fn metadata_with_spec(dir: &Path, body: &str) -> ModuleMetadata {
        fs::write(dir.join("bash.spec"), body).unwrap();
        let spec = locate_spec(dir, "bash").unwrap();
        ModuleMetadata::new(spec, "8")
    }

    #[test]
    fn test_upstream_url_from_spec() {
        let dir = tempfile::tempdir().unwrap();
        let meta = metadata_with_spec(
            dir.path(),
            "Name: bash\nURL: https://git.example/bash.git\n",
        );
        assert_eq!(meta.upstream_url().unwrap(), "https://git.example/bash.git");
    }

    #[test]
    fn test_upstream_url_marker_anywhere_in_line() {
        let dir = tempfile::tempdir().unwrap();
        let meta = metadata_with_spec(
            dir.path(),
            "Name: bash\n# upstream URL: https://git.example/bash.git\n",
        );
        assert_eq!(meta.upstream_url().unwrap(), "https://git.example/bash.git");
    }

    #[test]
    fn test_upstream_url_missing_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let meta = metadata_with_spec(dir.path(), "Name: bash\n");
        assert!(matches!(
            meta.upstream_url(),
            Err(SpecError::MissingField { .. })
        ));
    }

    #[test]
    fn test_source_filename_substitutes_identity() {
        let dir = tempfile::tempdir().unwrap();
        let meta = metadata_with_spec(
            dir.path(),
            "Name: bash\nSource0: %{name}-%{version}.tar.gz\n",
        );
        meta.identity
            .set(PackageIdentity {
                name: "bash".to_string(),
                epoch: "0".to_string(),
                version: "5.1.8".to_string(),
                release: "6".to_string(),
            })
            .unwrap();
        assert_eq!(meta.source_filename().unwrap(), "bash-5.1.8.tar.gz");
    }

    #[test]
    fn test_source_filename_takes_url_basename() {
        let dir = tempfile::tempdir().unwrap();
        let meta = metadata_with_spec(
            dir.path(),
            "Name: bash\nSource0: https://ftp.example/pub/bash/%{name}-%{version}.tar.gz\n",
        );
        meta.identity
            .set(PackageIdentity {
                name: "bash".to_string(),
                epoch: "0".to_string(),
                version: "5.1.8".to_string(),
                release: "6".to_string(),
            })
            .unwrap();
        assert_eq!(meta.source_filename().unwrap(), "bash-5.1.8.tar.gz");
    }

    #[test]
    fn test_literal_source_filename_needs_no_identity() {
        let dir = tempfile::tempdir().unwrap();
        let meta = metadata_with_spec(
            dir.path(),
            "Name: bash\nSource0: bash-5.1.8.tar.gz\n",
        );
        // No identity is seeded; a literal filename must not query rpm.
        assert_eq!(meta.source_filename().unwrap(), "bash-5.1.8.tar.gz");
        assert!(meta.identity.get().is_none());
    }
}
