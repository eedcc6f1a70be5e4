//! Subnet provisioning: create VLAN-backed subnets on the management plane.

use crate::context::RunContext;
use crate::engine::{Check, OpState, Operation, TaskPoller, TaskStatusSource};
use crate::rest::{entity_names, task_uuid_of, EntityClient};
use anyhow::Context as _;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// One `subnets` entry of the input document.
#[derive(Debug, Clone, Deserialize)]
pub struct SubnetSpec {
    pub name: String,
    pub vlan_id: i64,
    pub cidr: String,
    #[serde(default)]
    pub domain: Option<String>,
}

fn build_subnet_payload(spec: &SubnetSpec) -> anyhow::Result<Value> {
    let (network, prefix) = spec
        .cidr
        .split_once('/')
        .with_context(|| format!("subnet {} has malformed cidr {:?}", spec.name, spec.cidr))?;
    let prefix: u8 = prefix
        .parse()
        .with_context(|| format!("subnet {} has malformed prefix in {:?}", spec.name, spec.cidr))?;
    let mut payload = json!({
        "api_version": "3.1.0",
        "name": spec.name,
        "vlan_id": spec.vlan_id,
        "subnet_ip": network,
        "prefix_length": prefix,
    });
    if let Some(domain) = &spec.domain {
        payload["domain"] = json!(domain);
    }
    Ok(payload)
}

/// Creates the configured subnets, skipping ones that already exist.
pub struct CreateSubnets {
    specs: Vec<SubnetSpec>,
    entities: Arc<dyn EntityClient>,
    tasks: Arc<dyn TaskStatusSource>,
}

impl CreateSubnets {
    pub fn new(
        specs: Vec<SubnetSpec>,
        entities: Arc<dyn EntityClient>,
        tasks: Arc<dyn TaskStatusSource>,
    ) -> Self {
        Self {
            specs,
            entities,
            tasks,
        }
    }

    pub fn from_context(
        ctx: &RunContext,
        entities: Arc<dyn EntityClient>,
        tasks: Arc<dyn TaskStatusSource>,
    ) -> anyhow::Result<Self> {
        let specs = match ctx.section("subnets") {
            Some(section) => {
                serde_json::from_value(section.clone()).context("invalid subnets section")?
            }
            None => Vec::new(),
        };
        Ok(Self::new(specs, entities, tasks))
    }
}

#[async_trait]
impl Operation for CreateSubnets {
    fn name(&self) -> &str {
        "Create_Subnets"
    }

    async fn execute(&self, state: &mut OpState, _ctx: &RunContext) -> anyhow::Result<()> {
        if self.specs.is_empty() {
            info!("no subnets configured, nothing to do");
            return Ok(());
        }

        let listed = self
            .entities
            .list(&json!({}))
            .await
            .context("listing existing subnets")?;
        let existing: HashSet<String> = entity_names(&listed).into_iter().collect();

        let mut task_uuids = Vec::new();
        for spec in &self.specs {
            if existing.contains(&spec.name) {
                warn!(subnet = %spec.name, "subnet already exists, skipping create");
                continue;
            }
            let payload = match build_subnet_payload(spec) {
                Ok(payload) => payload,
                Err(e) => {
                    state.record_issue(format!("{e:#}"));
                    continue;
                }
            };
            match self.entities.create(&payload).await {
                Ok(response) => task_uuids.extend(task_uuid_of(&response)),
                Err(e) => state.record_issue(format!("creating subnet {}: {e:#}", spec.name)),
            }
        }

        if !task_uuids.is_empty() {
            let poller = TaskPoller::management(self.tasks.clone(), task_uuids);
            let (report, completed) = poller.monitor().await;
            if !completed {
                state.record_issue(format!(
                    "timed out waiting for subnet tasks: {}",
                    report.describe()
                ));
            } else if !report.failed.is_empty() {
                state.record_issue(format!("subnet tasks failed: {}", report.describe()));
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
                warn!("could not re-list subnets: {e:#}");
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
    fn subnet_payload_splits_the_cidr() {
        let spec = SubnetSpec {
            name: "vlan10".to_string(),
            vlan_id: 10,
            cidr: "10.0.10.0/24".to_string(),
            domain: None,
        };
        assert_eq!(
            build_subnet_payload(&spec).unwrap(),
            json!({
                "api_version": "3.1.0",
                "name": "vlan10",
                "vlan_id": 10,
                "subnet_ip": "10.0.10.0",
                "prefix_length": 24,
            })
        );
    }

    #[test]
    fn malformed_cidr_is_an_error() {
        let spec = SubnetSpec {
            name: "vlan10".to_string(),
            vlan_id: 10,
            cidr: "10.0.10.0".to_string(),
            domain: None,
        };
        assert!(build_subnet_payload(&spec).is_err());
    }
}
