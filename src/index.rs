//! Package index lookups
//!
//! Workspace resolution and `search` both consult a package index service
//! that maps project names to their git repositories. The filter is applied
//! client-side, case-insensitively, over the full project listing.

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Package index request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed package index response: {0}")]
    Protocol(String),
}

/// One project known to the index
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProjectRef {
    pub name: String,
    pub git_url: String,
}

/// Read access to the package index
pub trait PackageIndex {
    fn projects(&self) -> Result<Vec<ProjectRef>, IndexError>;

    /// Exact-name lookup
    fn find_exact(&self, name: &str) -> Result<Option<ProjectRef>, IndexError> {
        Ok(self.projects()?.into_iter().find(|p| p.name == name))
    }

    /// Case-insensitive substring search
    fn search(&self, word: &str) -> Result<Vec<ProjectRef>, IndexError> {
        let needle = word.to_lowercase();
        Ok(self
            .projects()?
            .into_iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .collect())
    }
}

/// HTTP index client against `{index_url}/projects`
#[derive(Debug)]
pub struct HttpIndex {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpIndex {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProjectListing {
    projects: Vec<ProjectRef>,
}

impl PackageIndex for HttpIndex {
    fn projects(&self) -> Result<Vec<ProjectRef>, IndexError> {
        let url = format!("{}/projects", self.base_url.trim_end_matches('/'));
        let response = self.client.get(&url).send()?.error_for_status()?;
        let listing: ProjectListing = response
            .json()
            .map_err(|e| IndexError::Protocol(e.to_string()))?;
        Ok(listing.projects)
    }
}

/// Fixed in-memory index for tests
#[derive(Debug, Default)]
pub struct StaticIndex {
    entries: Vec<ProjectRef>,
}

impl StaticIndex {
    pub fn new(entries: Vec<ProjectRef>) -> Self {
        Self { entries }
    }
}

impl PackageIndex for StaticIndex {
    fn projects(&self) -> Result<Vec<ProjectRef>, IndexError> {
        Ok(self.entries.clone())
    }
}
