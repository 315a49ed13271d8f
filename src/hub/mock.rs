//! In-process hub for tests
//!
//! State lives behind an `Arc<Mutex<_>>` so a test can keep a clone of the
//! hub, hand another clone to the code under test, and assert on recorded
//! submissions afterwards.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{
    BuildHub, BuildOptions, BuildTarget, ContainerOptions, HubError, InheritanceEntry, TagInfo,
    TaskId, TaskResult, WATCH_OK,
};

/// A submission recorded by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Build {
        source: String,
        target: String,
        options: BuildOptions,
        priority: Option<i64>,
    },
    Chain {
        chain: Vec<Vec<String>>,
        target: String,
        priority: Option<i64>,
    },
    Container {
        source: String,
        target: String,
        options: ContainerOptions,
        priority: Option<i64>,
    },
}

#[derive(Debug, Default)]
struct MockState {
    targets: HashMap<String, BuildTarget>,
    tags: HashMap<String, TagInfo>,
    inheritance: HashMap<i64, Vec<InheritanceEntry>>,
    task_results: HashMap<TaskId, TaskResult>,
    watch_results: HashMap<TaskId, i32>,
    container_builds: bool,
    submissions: Vec<Submission>,
    next_task: TaskId,
}

#[derive(Clone)]
pub struct MockHub {
    web_url: String,
    state: Arc<Mutex<MockState>>,
}

impl MockHub {
    pub fn new(web_url: impl Into<String>) -> Self {
        Self {
            web_url: web_url.into(),
            state: Arc::new(Mutex::new(MockState {
                next_task: 1000,
                ..MockState::default()
            })),
        }
    }

    /// A hub primed with one well-formed target: unlocked dest tag, build
    /// tag inheriting from it
    pub fn primed(web_url: impl Into<String>, target_name: &str) -> Self {
        let hub = Self::new(web_url);
        let dest_tag_name = format!("{target_name}-pending");
        hub.add_target(BuildTarget {
            name: target_name.to_string(),
            build_tag: 10,
            build_tag_name: format!("{target_name}-build"),
            dest_tag: 20,
            dest_tag_name: dest_tag_name.clone(),
        });
        hub.add_tag(TagInfo {
            id: 20,
            name: dest_tag_name.clone(),
            locked: false,
        });
        hub.add_inheritance(
            10,
            vec![InheritanceEntry {
                parent_id: 20,
                name: dest_tag_name,
            }],
        );
        hub
    }

    pub fn add_target(&self, target: BuildTarget) {
        let mut state = self.state.lock().unwrap();
        state.targets.insert(target.name.clone(), target);
    }

    pub fn add_tag(&self, tag: TagInfo) {
        let mut state = self.state.lock().unwrap();
        state.tags.insert(tag.name.clone(), tag);
    }

    pub fn add_inheritance(&self, tag_id: i64, entries: Vec<InheritanceEntry>) {
        self.state.lock().unwrap().inheritance.insert(tag_id, entries);
    }

    pub fn set_container_builds(&self, supported: bool) {
        self.state.lock().unwrap().container_builds = supported;
    }

    pub fn set_task_result(&self, task: TaskId, result: TaskResult) {
        self.state.lock().unwrap().task_results.insert(task, result);
    }

    pub fn set_watch_result(&self, task: TaskId, rv: i32) {
        self.state.lock().unwrap().watch_results.insert(task, rv);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    fn record(&self, submission: Submission) -> TaskId {
        let mut state = self.state.lock().unwrap();
        state.submissions.push(submission);
        state.next_task += 1;
        state.next_task
    }
}

impl BuildHub for MockHub {
    fn build_target(&self, name: &str) -> Result<Option<BuildTarget>, HubError> {
        Ok(self.state.lock().unwrap().targets.get(name).cloned())
    }

    fn tag_by_name(&self, name: &str) -> Result<Option<TagInfo>, HubError> {
        Ok(self.state.lock().unwrap().tags.get(name).cloned())
    }

    fn full_inheritance(&self, tag_id: i64) -> Result<Vec<InheritanceEntry>, HubError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .inheritance
            .get(&tag_id)
            .cloned()
            .unwrap_or_default())
    }

    fn submit_build(
        &self,
        source: &str,
        target: &str,
        options: &BuildOptions,
        priority: Option<i64>,
    ) -> Result<TaskId, HubError> {
        Ok(self.record(Submission::Build {
            source: source.to_string(),
            target: target.to_string(),
            options: options.clone(),
            priority,
        }))
    }

    fn submit_chain_build(
        &self,
        chain: &[Vec<String>],
        target: &str,
        priority: Option<i64>,
    ) -> Result<TaskId, HubError> {
        Ok(self.record(Submission::Chain {
            chain: chain.to_vec(),
            target: target.to_string(),
            priority,
        }))
    }

    fn submit_container_build(
        &self,
        source: &str,
        target: &str,
        options: &ContainerOptions,
        priority: Option<i64>,
    ) -> Result<TaskId, HubError> {
        Ok(self.record(Submission::Container {
            source: source.to_string(),
            target: target.to_string(),
            options: options.clone(),
            priority,
        }))
    }

    fn task_result(&self, task: TaskId) -> Result<TaskResult, HubError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .task_results
            .get(&task)
            .cloned()
            .unwrap_or_default())
    }

    fn watch_task(&self, task: TaskId) -> Result<i32, HubError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .watch_results
            .get(&task)
            .copied()
            .unwrap_or(WATCH_OK))
    }

    fn supports_container_builds(&self) -> Result<bool, HubError> {
        Ok(self.state.lock().unwrap().container_builds)
    }

    fn web_url(&self) -> &str {
        &self.web_url
    }
}
