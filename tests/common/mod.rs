//! In-memory stand-in for one control plane resource and its task queue.

use async_trait::async_trait;
use convoy::engine::{TaskState, TaskStatus, TaskStatusSource};
use convoy::rest::EntityClient;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct BackendState {
    /// Entity name to its value list.
    pub entities: BTreeMap<String, Vec<String>>,
    pub create_calls: usize,
    pub batch_calls: usize,
    pub list_calls: usize,
    pub tasks: BTreeMap<Uuid, TaskState>,
}

/// Mock [`EntityClient`] + [`TaskStatusSource`]: creates succeed, spawn an
/// immediately-terminal task, and are visible to later lists.
#[derive(Default)]
pub struct MockBackend {
    pub state: Mutex<BackendState>,
    /// Make every create (single or batched) fail.
    pub fail_creates: bool,
    /// Make every list fail, which also breaks verification.
    pub fail_lists: bool,
    /// State newly-spawned tasks report.
    pub task_outcome: Option<TaskState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(names_and_values: &[(&str, &[&str])]) -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state.lock().unwrap();
            for (name, values) in names_and_values {
                state.entities.insert(
                    name.to_string(),
                    values.iter().map(|v| v.to_string()).collect(),
                );
            }
        }
        backend
    }

    fn spawn_task(&self, state: &mut BackendState) -> Uuid {
        let uuid = Uuid::new_v4();
        state
            .tasks
            .insert(uuid, self.task_outcome.unwrap_or(TaskState::Succeeded));
        uuid
    }

    fn apply_create(&self, state: &mut BackendState, payload: &Value) {
        if let Some(name) = payload.get("name").and_then(Value::as_str) {
            state.entities.entry(name.to_string()).or_default();
        }
        if let (Some(category), Some(value)) = (
            payload.get("category_name").and_then(Value::as_str),
            payload.get("value").and_then(Value::as_str),
        ) {
            state
                .entities
                .entry(category.to_string())
                .or_default()
                .push(value.to_string());
        }
    }
}

#[async_trait]
impl EntityClient for MockBackend {
    async fn read(&self, uuid: &str) -> anyhow::Result<Value> {
        Ok(json!({"uuid": uuid}))
    }

    async fn create(&self, payload: &Value) -> anyhow::Result<Value> {
        if self.fail_creates {
            anyhow::bail!("simulated create failure");
        }
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        self.apply_create(&mut state, payload);
        let task = self.spawn_task(&mut state);
        Ok(json!({"task_uuid": task.to_string()}))
    }

    async fn update(&self, _uuid: &str, _payload: &Value) -> anyhow::Result<Value> {
        Ok(Value::Null)
    }

    async fn delete(&self, _uuid: &str) -> anyhow::Result<Value> {
        Ok(Value::Null)
    }

    async fn list(&self, _filter: &Value) -> anyhow::Result<Value> {
        if self.fail_lists {
            anyhow::bail!("simulated list failure");
        }
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        let entities: Vec<Value> = state
            .entities
            .iter()
            .map(|(name, values)| json!({"name": name, "values": values}))
            .collect();
        Ok(json!({"entities": entities}))
    }

    async fn create_batch(&self, payloads: &[Value]) -> anyhow::Result<Vec<Value>> {
        if self.fail_creates {
            anyhow::bail!("simulated batch failure");
        }
        let mut state = self.state.lock().unwrap();
        state.batch_calls += 1;
        Ok(payloads
            .iter()
            .map(|payload| {
                self.apply_create(&mut state, payload);
                let task = self.spawn_task(&mut state);
                json!({"task_uuid": task.to_string()})
            })
            .collect())
    }
}

#[async_trait]
impl TaskStatusSource for MockBackend {
    async fn poll_tasks(&self, uuids: &[Uuid]) -> anyhow::Result<Vec<TaskStatus>> {
        let state = self.state.lock().unwrap();
        Ok(uuids
            .iter()
            .map(|uuid| TaskStatus {
                task_uuid: *uuid,
                state: state.tasks.get(uuid).copied().unwrap_or(TaskState::Queued),
                detail: None,
            })
            .collect())
    }
}
