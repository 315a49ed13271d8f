//! SRPM and mock build orchestration
//!
//! Local builds shell out to rpmbuild and mock with explicit argument
//! vectors. The macro defines keep every payload directory inside the
//! checkout; mock results land under `results_<name>/<version>/<release>`.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::checksum::HashType;
use crate::config::LaneConfig;
use crate::process::{Invocation, ProcessError};
use crate::spec::{rpm_defines, ModuleMetadata, SpecError};

/// Extra mock arguments come from this environment variable
pub const MOCKARGS_VAR: &str = "MOCKARGS";

#[derive(Debug, thiserror::Error)]
pub enum SrpmError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Spec(#[from] SpecError),
}

/// Mock invocation switches
#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    pub root: Option<String>,
    pub no_clean: bool,
    pub no_cleanup_after: bool,
}

fn srpm_args(
    module_dir: &Path,
    dist: &str,
    spec_path: &Path,
    manifest_hashtype: Option<HashType>,
) -> Vec<String> {
    let mut args = rpm_defines(module_dir, dist);
    // rpm defaults to sha256 file digests; a manifest tracked with another
    // algorithm needs matching digests in the SRPM header.
    if let Some(hashtype) = manifest_hashtype {
        for macro_name in ["_source_filedigest_algorithm", "_binary_filedigest_algorithm"] {
            args.push("--define".to_string());
            args.push(format!("{macro_name} {hashtype}"));
        }
    }
    args.extend([
        "--nodeps".to_string(),
        "-bs".to_string(),
        spec_path.display().to_string(),
    ]);
    args
}

/// Build the SRPM for a checkout, returning its path
pub fn build_srpm(
    config: &LaneConfig,
    module_dir: &Path,
    metadata: &ModuleMetadata,
    manifest_hashtype: Option<HashType>,
) -> Result<PathBuf, SrpmError> {
    let args = srpm_args(
        module_dir,
        &config.dist,
        &metadata.spec().path(),
        manifest_hashtype,
    );
    Invocation::new("rpmbuild").args(args).run_checked()?;

    let identity = metadata.identity()?;
    let srpm = module_dir.join(format!("{}.src.rpm", identity.nvr()));
    info!(srpm = %srpm.display(), "SRPM written");
    Ok(srpm)
}

fn mock_args(
    config: &LaneConfig,
    results_dir: &Path,
    srpm: &Path,
    options: &MockOptions,
    extra: &[String],
) -> Vec<String> {
    let root = options
        .root
        .clone()
        .unwrap_or_else(|| format!("{}-{}", config.target, config.arch));

    let mut args: Vec<String> = extra.to_vec();
    args.extend(["-r".to_string(), root]);
    args.extend([
        "--resultdir".to_string(),
        results_dir.display().to_string(),
    ]);
    if options.no_clean {
        args.push("--no-clean".to_string());
    }
    if options.no_cleanup_after {
        args.push("--no-cleanup-after".to_string());
    }
    args.extend(["--rebuild".to_string(), srpm.display().to_string()]);
    args
}

/// Rebuild an SRPM in mock
pub fn mockbuild(
    config: &LaneConfig,
    module_dir: &Path,
    metadata: &ModuleMetadata,
    srpm: &Path,
    options: &MockOptions,
) -> Result<PathBuf, SrpmError> {
    let identity = metadata.identity()?;
    let results_dir = module_dir
        .join(format!("results_{}", identity.name))
        .join(&identity.version)
        .join(&identity.release);

    let extra: Vec<String> = std::env::var(MOCKARGS_VAR)
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    let args = mock_args(config, &results_dir, srpm, options, &extra);
    Invocation::new("mock").args(args).run_checked()?;
    info!(results = %results_dir.display(), "mock build finished");
    Ok(results_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srpm_args_layout() {
        let args = srpm_args(
            Path::new("/work/bash"),
            "8",
            Path::new("/work/bash/bash.spec"),
            None,
        );
        assert!(args.contains(&"--nodeps".to_string()));
        assert!(args.contains(&"-bs".to_string()));
        assert!(args.contains(&"dist .el8".to_string()));
        assert_eq!(args.last().unwrap(), "/work/bash/bash.spec");
        assert!(!args.iter().any(|a| a.contains("filedigest")));
    }

    #[test]
    fn test_srpm_args_carry_digest_defines_for_md5() {
        let args = srpm_args(
            Path::new("/work/bash"),
            "8",
            Path::new("/work/bash/bash.spec"),
            Some(HashType::Md5),
        );
        assert!(args.contains(&"_source_filedigest_algorithm md5".to_string()));
        assert!(args.contains(&"_binary_filedigest_algorithm md5".to_string()));
    }

    #[test]
    fn test_mock_args_defaults_and_switches() {
        let config = LaneConfig::default();
        let args = mock_args(
            &config,
            Path::new("/work/bash/results_bash/5.1.8/6"),
            Path::new("/work/bash/bash-5.1.8-6.src.rpm"),
            &MockOptions {
                root: None,
                no_clean: true,
                no_cleanup_after: false,
            },
            &[],
        );
        let joined = args.join(" ");
        assert!(joined.contains("-r dist-candidate-x86_64"));
        assert!(joined.contains("--no-clean"));
        assert!(!joined.contains("--no-cleanup-after"));
        assert!(joined.ends_with("--rebuild /work/bash/bash-5.1.8-6.src.rpm"));
    }

    #[test]
    fn test_mock_args_root_override_and_extras() {
        let config = LaneConfig::default();
        let args = mock_args(
            &config,
            Path::new("/r"),
            Path::new("/s.src.rpm"),
            &MockOptions {
                root: Some("custom-root".to_string()),
                ..MockOptions::default()
            },
            &["--enable-network".to_string()],
        );
        assert_eq!(args[0], "--enable-network");
        assert!(args.join(" ").contains("-r custom-root"));
    }
}
