//! Category provisioning: create category keys and their values on the
//! management plane.

use crate::context::RunContext;
use crate::engine::{Check, OpState, Operation, TaskPoller, TaskStatusSource};
use crate::rest::{entity_names, task_uuid_of, EntityClient};
use anyhow::Context as _;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// One `categories` entry of the input document.
#[derive(Debug, Clone, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Closed set of fields a category payload is assembled from.
#[derive(Clone, Copy)]
enum PayloadField {
    ApiVersion,
    Name,
    Description,
}

impl PayloadField {
    const CATEGORY: [PayloadField; 3] = [
        PayloadField::ApiVersion,
        PayloadField::Name,
        PayloadField::Description,
    ];

    fn apply(self, spec: &CategorySpec, payload: &mut Map<String, Value>) {
        match self {
            PayloadField::ApiVersion => {
                payload.insert("api_version".to_string(), json!("3.1.0"));
            }
            PayloadField::Name => {
                payload.insert("name".to_string(), json!(spec.name));
            }
            PayloadField::Description => {
                if let Some(description) = &spec.description {
                    payload.insert("description".to_string(), json!(description));
                }
            }
        }
    }
}

fn build_category_payload(spec: &CategorySpec) -> Value {
    let mut payload = Map::new();
    for field in PayloadField::CATEGORY {
        field.apply(spec, &mut payload);
    }
    Value::Object(payload)
}

fn build_value_payload(spec: &CategorySpec, value: &str) -> Value {
    json!({"category_name": spec.name, "value": value})
}

/// Category name to its existing values, from a list response.
fn existing_categories(list_response: &Value) -> HashMap<String, HashSet<String>> {
    list_response
        .get("entities")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let name = row.get("name").and_then(Value::as_str)?;
                    let values = row
                        .get("values")
                        .and_then(Value::as_array)
                        .map(|values| {
                            values
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                    Some((name.to_string(), values))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Creates the configured categories, skipping ones that already exist, and
/// adds each category's values in one batched call.
pub struct CreateCategories {
    specs: Vec<CategorySpec>,
    entities: Arc<dyn EntityClient>,
    tasks: Arc<dyn TaskStatusSource>,
}

impl CreateCategories {
    pub fn new(
        specs: Vec<CategorySpec>,
        entities: Arc<dyn EntityClient>,
        tasks: Arc<dyn TaskStatusSource>,
    ) -> Self {
        Self {
            specs,
            entities,
            tasks,
        }
    }

    /// Build from the document's `categories` section; absent section means
    /// nothing to do.
    pub fn from_context(
        ctx: &RunContext,
        entities: Arc<dyn EntityClient>,
        tasks: Arc<dyn TaskStatusSource>,
    ) -> anyhow::Result<Self> {
        let specs = match ctx.section("categories") {
            Some(section) => {
                serde_json::from_value(section.clone()).context("invalid categories section")?
            }
            None => Vec::new(),
        };
        Ok(Self::new(specs, entities, tasks))
    }
}

#[async_trait]
impl Operation for CreateCategories {
    fn name(&self) -> &str {
        "Create_Categories"
    }

    async fn execute(&self, state: &mut OpState, _ctx: &RunContext) -> anyhow::Result<()> {
        if self.specs.is_empty() {
            info!("no categories configured, nothing to do");
            return Ok(());
        }

        let listed = self
            .entities
            .list(&json!({}))
            .await
            .context("listing existing categories")?;
        let existing = existing_categories(&listed);

        let mut task_uuids = Vec::new();
        for spec in &self.specs {
            let existing_values = match existing.get(&spec.name) {
                Some(values) => {
                    warn!(category = %spec.name, "category already exists, skipping create");
                    Some(values)
                }
                None => match self.entities.create(&build_category_payload(spec)).await {
                    Ok(response) => {
                        task_uuids.extend(task_uuid_of(&response));
                        None
                    }
                    Err(e) => {
                        state.record_issue(format!("creating category {}: {e:#}", spec.name));
                        continue;
                    }
                },
            };

            let payloads: Vec<Value> = spec
                .values
                .iter()
                .filter(|value| {
                    let already = existing_values
                        .map(|values| values.contains(*value))
                        .unwrap_or(false);
                    if already {
                        warn!(category = %spec.name, value = %value, "value already present, skipping");
                    }
                    !already
                })
                .map(|value| build_value_payload(spec, value))
                .collect();
            if payloads.is_empty() {
                continue;
            }
            match self.entities.create_batch(&payloads).await {
                Ok(responses) => task_uuids.extend(responses.iter().filter_map(task_uuid_of)),
                Err(e) => {
                    state.record_issue(format!("adding values to category {}: {e:#}", spec.name))
                }
            }
        }

        if !task_uuids.is_empty() {
            let poller = TaskPoller::management(self.tasks.clone(), task_uuids);
            let (report, completed) = poller.monitor().await;
            if !completed {
                state.record_issue(format!(
                    "timed out waiting for category tasks: {}",
                    report.describe()
                ));
            } else if !report.failed.is_empty() {
                state.record_issue(format!("category tasks failed: {}", report.describe()));
            }
        }
        Ok(())
    }

    async fn verify(&self, state: &mut OpState, _ctx: &RunContext) -> anyhow::Result<()> {
        if self.specs.is_empty() {
            return Ok(());
        }
        let listed = match self.entities.list(&json!({})).await {
            Ok(response) => entity_names(&response).into_iter().collect::<HashSet<_>>(),
            Err(e) => {
                warn!("could not re-list categories: {e:#}");
                for spec in &self.specs {
                    state.record_check(self.name(), &spec.name, Check::CantVerify);
                }
                return Ok(());
            }
        };
        for spec in &self.specs {
            let check = if listed.contains(&spec.name) {
                Check::Pass
            } else {
                Check::Fail
            };
            state.record_check(self.name(), &spec.name, check);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_payload_includes_optional_description() {
        let bare = CategorySpec {
            name: "Env".to_string(),
            description: None,
            values: vec![],
        };
        assert_eq!(
            build_category_payload(&bare),
            json!({"api_version": "3.1.0", "name": "Env"})
        );

        let described = CategorySpec {
            description: Some("environment tier".to_string()),
            ..bare
        };
        assert_eq!(
            build_category_payload(&described),
            json!({"api_version": "3.1.0", "name": "Env", "description": "environment tier"})
        );
    }

    #[test]
    fn existing_categories_maps_names_to_values() {
        let response = json!({"entities": [
            {"name": "Env", "values": ["Prod"]},
            {"name": "Tier"},
        ]});
        let existing = existing_categories(&response);
        assert!(existing["Env"].contains("Prod"));
        assert!(existing["Tier"].is_empty());
    }

    #[test]
    fn value_payload_names_its_category() {
        let spec = CategorySpec {
            name: "Env".to_string(),
            description: None,
            values: vec![],
        };
        assert_eq!(
            build_value_payload(&spec, "Prod"),
            json!({"category_name": "Env", "value": "Prod"})
        );
    }
}
