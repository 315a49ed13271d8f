//! Client configuration
//!
//! All tunables live in one TOML file, loaded into a typed structure before
//! any command logic runs. Every field has a serde default so a missing or
//! partial file still yields a usable configuration; nothing reads ambient
//! state after load time.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Default configuration path, overridable with `--config`
pub const DEFAULT_CONFIG_PATH: &str = "/etc/distpkg/distpkg.toml";

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Connection settings for one build hub endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubSession {
    /// RPC endpoint URL
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Web UI base, used to print task and build status links
    #[serde(default = "default_web_url")]
    pub web_url: String,

    /// Authentication principal, when the hub requires one
    #[serde(default)]
    pub principal: Option<String>,

    /// Poll interval when blocking on a task
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

fn default_server_url() -> String {
    "https://hub.example.org/rpc".to_string()
}

fn default_web_url() -> String {
    "https://hub.example.org/web".to_string()
}

fn default_poll_interval() -> u64 {
    10
}

impl Default for HubSession {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            web_url: default_web_url(),
            principal: None,
            poll_interval_seconds: default_poll_interval(),
        }
    }
}

/// Top-level client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaneConfig {
    /// Parent directory that holds per-package checkouts
    #[serde(default = "default_build_root")]
    pub build_root: PathBuf,

    /// Git URL pattern for package repositories; `{module}` is substituted
    #[serde(default = "default_git_base_url")]
    pub git_base_url: String,

    /// Download base for the lookaside cache
    #[serde(default = "default_lookaside_url")]
    pub lookaside_url: String,

    /// scp destination for lookaside uploads
    #[serde(default = "default_lookaside_upload")]
    pub lookaside_upload: String,

    /// Package index endpoint used by workspace resolution and search
    #[serde(default = "default_index_url")]
    pub index_url: String,

    /// Distribution version, e.g. "8" for an .el8 disttag
    #[serde(default = "default_dist")]
    pub dist: String,

    /// Default build target when none is given on the command line
    #[serde(default = "default_target")]
    pub target: String,

    /// Architecture used for local mock builds
    #[serde(default = "default_arch")]
    pub arch: String,

    /// Hostname fragment identifying the code-review git server
    #[serde(default = "default_review_host_infix")]
    pub review_host_infix: String,

    /// Main build hub
    #[serde(default)]
    pub hub: HubSession,

    /// Separate hub session for container builds; falls back to `hub`
    #[serde(default)]
    pub container_hub: Option<HubSession>,
}

fn default_build_root() -> PathBuf {
    PathBuf::from("/var/tmp/distpkg-build")
}

fn default_git_base_url() -> String {
    "https://pkgs.example.org/rpms/{module}.git".to_string()
}

fn default_lookaside_url() -> String {
    "https://pkgs.example.org/repo/pkgs".to_string()
}

fn default_lookaside_upload() -> String {
    "lookaside@pkgs.example.org:/srv/cache/lookaside/pkgs".to_string()
}

fn default_index_url() -> String {
    "https://pkgs.example.org/api".to_string()
}

fn default_dist() -> String {
    "8".to_string()
}

fn default_target() -> String {
    "dist-candidate".to_string()
}

fn default_arch() -> String {
    "x86_64".to_string()
}

fn default_review_host_infix() -> String {
    "gerrit".to_string()
}

impl Default for LaneConfig {
    fn default() -> Self {
        // An empty document deserializes to all serde defaults.
        toml::from_str("").expect("empty config must deserialize")
    }
}

impl LaneConfig {
    /// Load from an explicit path, failing if the file is missing
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Load from the default path, falling back to built-in defaults when the
    /// file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: LaneConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.git_base_url.contains("{module}") {
            return Err(ConfigError::InvalidValue {
                field: "git_base_url".to_string(),
                reason: "must contain a {module} placeholder".to_string(),
            });
        }
        if self.dist.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "dist".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Git URL for a package repository
    pub fn spec_repo_url(&self, module: &str) -> String {
        self.git_base_url.replace("{module}", module)
    }

    /// Checkout directory for a package under the build root
    pub fn module_dir(&self, module: &str) -> PathBuf {
        self.build_root.join(module)
    }

    /// Hub session to use for container builds
    pub fn container_session(&self) -> &HubSession {
        self.container_hub.as_ref().unwrap_or(&self.hub)
    }

    /// Download URL for one lookaside entry
    pub fn lookaside_entry_url(
        &self,
        module: &str,
        filename: &str,
        hashtype: &str,
        hash: &str,
    ) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}",
            self.lookaside_url.trim_end_matches('/'),
            module,
            filename,
            hashtype,
            hash,
            filename
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = LaneConfig::default();
        assert_eq!(config.dist, "8");
        assert_eq!(config.target, "dist-candidate");
        assert_eq!(config.hub.poll_interval_seconds, 10);
        assert!(config.container_hub.is_none());
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        let err = LaneConfig::load(Path::new("/nonexistent/distpkg.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let config = LaneConfig::load_or_default(Path::new("/nonexistent/distpkg.toml")).unwrap();
        assert_eq!(config.dist, "8");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("distpkg.toml");
        fs::write(&path, "dist = \"9\"\n\n[hub]\nserver_url = \"https://koji.test/rpc\"\n").unwrap();

        let config = LaneConfig::load(&path).unwrap();
        assert_eq!(config.dist, "9");
        assert_eq!(config.hub.server_url, "https://koji.test/rpc");
        assert_eq!(config.hub.poll_interval_seconds, 10);
        assert_eq!(config.target, "dist-candidate");
    }

    #[test]
    fn test_git_base_url_requires_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("distpkg.toml");
        fs::write(&path, "git_base_url = \"https://pkgs.test/rpms\"\n").unwrap();

        let err = LaneConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "git_base_url"));
    }

    #[test]
    fn test_spec_repo_url_substitution() {
        let config = LaneConfig::default();
        assert_eq!(
            config.spec_repo_url("bash"),
            "https://pkgs.example.org/rpms/bash.git"
        );
    }

    #[test]
    fn test_lookaside_entry_url_layout() {
        let config = LaneConfig::default();
        assert_eq!(
            config.lookaside_entry_url("bash", "bash-5.1.tar.gz", "md5", "abcd"),
            "https://pkgs.example.org/repo/pkgs/bash/bash-5.1.tar.gz/md5/abcd/bash-5.1.tar.gz"
        );
    }

    #[test]
    fn test_container_session_falls_back_to_hub() {
        let config = LaneConfig::default();
        assert_eq!(config.container_session().server_url, config.hub.server_url);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("distpkg.toml");
        fs::write(
            &path,
            "[container_hub]\nserver_url = \"https://cont.test/rpc\"\n",
        )
        .unwrap();
        let config = LaneConfig::load(&path).unwrap();
        assert_eq!(config.container_session().server_url, "https://cont.test/rpc");
    }
}
