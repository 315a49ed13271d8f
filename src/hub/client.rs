//! JSON-over-HTTP hub client
//!
//! Every call is a POST of `{"method", "params"}` to the configured RPC
//! endpoint; a reply carries either `"result"` or `"error"`. Watching a task
//! polls `getTaskInfo` at the configured interval until a final state.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use super::{
    BuildHub, BuildOptions, BuildTarget, ContainerOptions, HubError, InheritanceEntry, TagInfo,
    TaskId, TaskResult, WATCH_FAILED, WATCH_OK,
};
use crate::config::HubSession;

// Task states, per the hub protocol.
const STATE_CLOSED: i64 = 2;
const STATE_CANCELED: i64 = 3;
const STATE_FAILED: i64 = 5;

pub struct HttpHub {
    session: HubSession,
    client: reqwest::blocking::Client,
}

impl HttpHub {
    pub fn new(session: HubSession) -> Self {
        Self {
            session,
            client: reqwest::blocking::Client::new(),
        }
    }

    fn call(&self, method: &str, params: Value) -> Result<Value, HubError> {
        debug!(method, endpoint = %self.session.server_url, "hub call");

        let mut body = json!({ "method": method, "params": params });
        if let Some(ref principal) = self.session.principal {
            body["principal"] = json!(principal);
        }

        let reply: Value = self
            .client
            .post(&self.session.server_url)
            .json(&body)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| HubError::Transport(e.to_string()))?
            .json()
            .map_err(|e| HubError::Protocol(e.to_string()))?;

        if let Some(error) = reply.get("error") {
            return Err(HubError::Rpc {
                code: error.get("code").and_then(Value::as_i64).unwrap_or(-1),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown fault")
                    .to_string(),
            });
        }
        reply
            .get("result")
            .cloned()
            .ok_or_else(|| HubError::Protocol("reply without result".to_string()))
    }

    fn parse<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, HubError> {
        serde_json::from_value(value).map_err(|e| HubError::Protocol(e.to_string()))
    }

    fn parse_task_id(value: Value) -> Result<TaskId, HubError> {
        value
            .as_i64()
            .ok_or_else(|| HubError::Protocol(format!("expected task id, got {value}")))
    }
}

impl BuildHub for HttpHub {
    fn build_target(&self, name: &str) -> Result<Option<BuildTarget>, HubError> {
        let result = self.call("getBuildTarget", json!([name]))?;
        if result.is_null() {
            Ok(None)
        } else {
            Self::parse(result).map(Some)
        }
    }

    fn tag_by_name(&self, name: &str) -> Result<Option<TagInfo>, HubError> {
        let result = self.call("getTag", json!([name]))?;
        if result.is_null() {
            Ok(None)
        } else {
            Self::parse(result).map(Some)
        }
    }

    fn full_inheritance(&self, tag_id: i64) -> Result<Vec<InheritanceEntry>, HubError> {
        Self::parse(self.call("getFullInheritance", json!([tag_id]))?)
    }

    fn submit_build(
        &self,
        source: &str,
        target: &str,
        options: &BuildOptions,
        priority: Option<i64>,
    ) -> Result<TaskId, HubError> {
        let mut opts = json!({
            "skip_tag": options.skip_tag,
            "scratch": options.scratch,
        });
        if let Some(ref arches) = options.arch_override {
            opts["arch_override"] = json!(arches);
        }
        Self::parse_task_id(self.call("build", json!([source, target, opts, priority]))?)
    }

    fn submit_chain_build(
        &self,
        chain: &[Vec<String>],
        target: &str,
        priority: Option<i64>,
    ) -> Result<TaskId, HubError> {
        Self::parse_task_id(self.call("chainBuild", json!([chain, target, {}, priority]))?)
    }

    fn submit_container_build(
        &self,
        source: &str,
        target: &str,
        options: &ContainerOptions,
        priority: Option<i64>,
    ) -> Result<TaskId, HubError> {
        let mut opts = json!({ "scratch": options.scratch });
        if !options.yum_repourls.is_empty() {
            opts["yum_repourls"] = json!(options.yum_repourls);
        }
        if let Some(ref branch) = options.git_branch {
            opts["git_branch"] = json!(branch);
        }
        Self::parse_task_id(self.call("buildContainer", json!([source, target, opts, priority]))?)
    }

    fn task_result(&self, task: TaskId) -> Result<TaskResult, HubError> {
        let result = self.call("getTaskResult", json!([task]))?;
        // Build ids arrive as either numbers or decimal strings.
        let raw = result
            .get("koji_builds")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut builds = Vec::with_capacity(raw.len());
        for value in raw {
            let id = match value {
                Value::Number(ref n) => n.as_i64(),
                Value::String(ref s) => s.parse().ok(),
                _ => None,
            };
            builds.push(id.ok_or_else(|| {
                HubError::Protocol(format!("unreadable build id: {value}"))
            })?);
        }
        Ok(TaskResult { builds })
    }

    fn watch_task(&self, task: TaskId) -> Result<i32, HubError> {
        let interval = Duration::from_secs(self.session.poll_interval_seconds);
        loop {
            let info = self.call("getTaskInfo", json!([task]))?;
            let state = info
                .get("state")
                .and_then(Value::as_i64)
                .ok_or_else(|| HubError::Protocol("task info without state".to_string()))?;
            match state {
                STATE_CLOSED => return Ok(WATCH_OK),
                STATE_FAILED | STATE_CANCELED => return Ok(WATCH_FAILED),
                _ => std::thread::sleep(interval),
            }
        }
    }

    fn supports_container_builds(&self) -> Result<bool, HubError> {
        let listing = self.call("listApi", json!([]))?;
        let methods = listing
            .as_array()
            .ok_or_else(|| HubError::Protocol("listApi did not return a list".to_string()))?;
        Ok(methods.iter().any(|m| {
            m.get("name").and_then(Value::as_str) == Some("buildContainer")
        }))
    }

    fn web_url(&self) -> &str {
        &self.session.web_url
    }
}
