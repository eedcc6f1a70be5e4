//! Generic entity interface over a control plane's REST resources.
//!
//! Product APIs are consumed through this one contract: CRUD plus list over
//! a base resource path, batched multi-request submission, and UUID-based
//! task polling. Operations hold the trait object, so tests can substitute
//! an in-memory backend for the live REST binding.

use super::Session;
use crate::engine::{TaskState, TaskStatus, TaskStatusSource};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// CRUD-plus-list contract over one resource kind.
#[async_trait]
pub trait EntityClient: Send + Sync {
    async fn read(&self, uuid: &str) -> anyhow::Result<Value>;
    async fn create(&self, payload: &Value) -> anyhow::Result<Value>;
    async fn update(&self, uuid: &str, payload: &Value) -> anyhow::Result<Value>;
    async fn delete(&self, uuid: &str) -> anyhow::Result<Value>;
    /// List entities matching a filter document; an empty object lists all.
    async fn list(&self, filter: &Value) -> anyhow::Result<Value>;
    /// Submit many create requests in one round trip, returning one response
    /// per request in order.
    async fn create_batch(&self, payloads: &[Value]) -> anyhow::Result<Vec<Value>>;
}

/// Live REST binding of [`EntityClient`] for one resource path.
pub struct RestEntity {
    session: Arc<Session>,
    base_path: String,
}

impl RestEntity {
    pub fn new(session: Arc<Session>, base_path: impl Into<String>) -> Self {
        Self {
            session,
            base_path: base_path.into(),
        }
    }
}

#[async_trait]
impl EntityClient for RestEntity {
    async fn read(&self, uuid: &str) -> anyhow::Result<Value> {
        Ok(self
            .session
            .get(&format!("{}/{uuid}", self.base_path))
            .await?)
    }

    async fn create(&self, payload: &Value) -> anyhow::Result<Value> {
        Ok(self.session.post(&self.base_path, payload).await?)
    }

    async fn update(&self, uuid: &str, payload: &Value) -> anyhow::Result<Value> {
        Ok(self
            .session
            .put(&format!("{}/{uuid}", self.base_path), payload)
            .await?)
    }

    async fn delete(&self, uuid: &str) -> anyhow::Result<Value> {
        Ok(self
            .session
            .delete(&format!("{}/{uuid}", self.base_path))
            .await?)
    }

    async fn list(&self, filter: &Value) -> anyhow::Result<Value> {
        Ok(self
            .session
            .post(&format!("{}/list", self.base_path), filter)
            .await?)
    }

    async fn create_batch(&self, payloads: &[Value]) -> anyhow::Result<Vec<Value>> {
        let body = json!({
            "action_on_failure": "CONTINUE",
            "execution_order": "NON_SEQUENTIAL",
            "api_request_list": payloads
                .iter()
                .map(|p| json!({"operation": "POST", "path_and_params": self.base_path.clone(), "body": p}))
                .collect::<Vec<_>>(),
        });
        let response = self.session.post("batch", &body).await?;
        let responses = response
            .get("api_response_list")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(responses)
    }
}

/// Live task-status source backed by the control plane's tasks endpoint.
pub struct RestTaskSource {
    session: Arc<Session>,
}

impl RestTaskSource {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl TaskStatusSource for RestTaskSource {
    async fn poll_tasks(&self, uuids: &[Uuid]) -> anyhow::Result<Vec<TaskStatus>> {
        let body = json!({"task_uuid_list": uuids});
        let response = self.session.post("tasks/poll", &body).await?;
        let rows = response
            .get("entities")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut statuses = Vec::with_capacity(rows.len());
        for row in rows {
            let task_uuid = row
                .get("uuid")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("task row without uuid: {row}"))?
                .parse::<Uuid>()?;
            let state = match row.get("status").and_then(Value::as_str) {
                Some("SUCCEEDED") => TaskState::Succeeded,
                Some("FAILED") => TaskState::Failed,
                Some("RUNNING") => TaskState::Running,
                _ => TaskState::Queued,
            };
            let detail = row
                .get("error_detail")
                .and_then(Value::as_str)
                .map(str::to_string);
            statuses.push(TaskStatus {
                task_uuid,
                state,
                detail,
            });
        }
        Ok(statuses)
    }
}

/// Pull the async-task handle out of an entity mutation response, when the
/// server chose to process the request asynchronously.
pub fn task_uuid_of(response: &Value) -> Option<Uuid> {
    response
        .get("task_uuid")
        .or_else(|| response.pointer("/status/execution_context/task_uuid"))
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

/// Collect entity names from a list response.
pub fn entity_names(list_response: &Value) -> Vec<String> {
    list_response
        .get("entities")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_uuid_is_found_at_either_location() {
        let flat = json!({"task_uuid": "6f1c2f9e-58d2-4d9c-9f3a-b8f6a0f2a111"});
        assert!(task_uuid_of(&flat).is_some());

        let nested = json!({
            "status": {"execution_context": {"task_uuid": "6f1c2f9e-58d2-4d9c-9f3a-b8f6a0f2a111"}}
        });
        assert!(task_uuid_of(&nested).is_some());

        assert!(task_uuid_of(&json!({"name": "x"})).is_none());
    }

    #[test]
    fn entity_names_reads_the_entities_list() {
        let response = json!({"entities": [{"name": "Env"}, {"name": "Tier"}, {"uuid": "x"}]});
        assert_eq!(entity_names(&response), vec!["Env", "Tier"]);
        assert!(entity_names(&json!({})).is_empty());
    }
}
