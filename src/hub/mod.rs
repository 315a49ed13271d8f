//! Build hub access
//!
//! All hub traffic goes through the [`BuildHub`] trait so commands can be
//! driven against an in-process [`mock::MockHub`] in tests. The real client
//! in [`client`] speaks JSON over HTTP. Target resolution lives in
//! [`target`].

pub mod client;
pub mod mock;
pub mod target;

use serde::Deserialize;

pub type TaskId = i64;

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Hub request failed: {0}")]
    Transport(String),

    #[error("Hub fault {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed hub response: {0}")]
    Protocol(String),
}

/// A build target as reported by the hub; never cached across invocations
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BuildTarget {
    pub name: String,
    pub build_tag: i64,
    pub build_tag_name: String,
    pub dest_tag: i64,
    pub dest_tag_name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TagInfo {
    pub id: i64,
    pub name: String,
    pub locked: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InheritanceEntry {
    pub parent_id: i64,
    pub name: String,
}

/// Result payload of a finished build task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskResult {
    pub builds: Vec<i64>,
}

/// Options attached to a regular build submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub skip_tag: bool,
    pub scratch: bool,
    pub arch_override: Option<String>,
}

/// Options attached to a container build submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerOptions {
    pub scratch: bool,
    pub yum_repourls: Vec<String>,
    pub git_branch: Option<String>,
}

/// Exit disposition of a watched task
pub const WATCH_OK: i32 = 0;
pub const WATCH_FAILED: i32 = 1;

pub trait BuildHub {
    fn build_target(&self, name: &str) -> Result<Option<BuildTarget>, HubError>;

    fn tag_by_name(&self, name: &str) -> Result<Option<TagInfo>, HubError>;

    /// Full inheritance chain of a tag, nearest parent first
    fn full_inheritance(&self, tag_id: i64) -> Result<Vec<InheritanceEntry>, HubError>;

    fn submit_build(
        &self,
        source: &str,
        target: &str,
        options: &BuildOptions,
        priority: Option<i64>,
    ) -> Result<TaskId, HubError>;

    fn submit_chain_build(
        &self,
        chain: &[Vec<String>],
        target: &str,
        priority: Option<i64>,
    ) -> Result<TaskId, HubError>;

    fn submit_container_build(
        &self,
        source: &str,
        target: &str,
        options: &ContainerOptions,
        priority: Option<i64>,
    ) -> Result<TaskId, HubError>;

    fn task_result(&self, task: TaskId) -> Result<TaskResult, HubError>;

    /// Block until the task reaches a final state
    fn watch_task(&self, task: TaskId) -> Result<i32, HubError>;

    fn supports_container_builds(&self) -> Result<bool, HubError>;

    /// Web UI base for status links
    fn web_url(&self) -> &str;
}

/// Scoped replacement of the active hub, restored on drop
///
/// Container builds run against their own hub session; the swap must be
/// undone on every exit path, including errors.
pub struct HubSwap<'a> {
    slot: &'a mut Box<dyn BuildHub>,
    saved: Option<Box<dyn BuildHub>>,
}

impl<'a> HubSwap<'a> {
    pub fn new(slot: &'a mut Box<dyn BuildHub>, replacement: Box<dyn BuildHub>) -> Self {
        let saved = std::mem::replace(slot, replacement);
        Self {
            slot,
            saved: Some(saved),
        }
    }

    pub fn hub(&self) -> &dyn BuildHub {
        self.slot.as_ref()
    }
}

impl Drop for HubSwap<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            *self.slot = saved;
        }
    }
}
