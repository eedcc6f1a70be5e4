//! Workflow registration: a workflow is a named tuple of schema,
//! pre-actions, scripts, and post-actions. Names route through an explicit
//! match, so an unknown workflow or script is a checked error rather than a
//! lookup surprise.

use super::report::{self, RunReport};
use crate::context::{Credential, CredentialResolver, FileVault, RunContext};
use crate::engine::Node;
use crate::ops::{CreateCategories, CreateSubnets};
use crate::rest::{RestEntity, RestTaskSource, Session};
use crate::{Error, Result};
use serde_json::Value;
use std::sync::Arc;

/// Ordered function run before the scripts, building up the run context.
pub type PreAction = Box<dyn Fn(&mut RunContext) -> anyhow::Result<()> + Send + Sync>;

/// Constructs one top-level script (an operation or batch tree) from the
/// prepared context.
pub type ScriptBuilder = Box<dyn Fn(&RunContext) -> anyhow::Result<Node> + Send + Sync>;

/// Ordered function run after the scripts, whatever the run's outcome.
pub type PostAction = Box<dyn Fn(&RunReport) -> anyhow::Result<()> + Send + Sync>;

/// One registered workflow.
pub struct Workflow {
    pub name: String,
    /// Named schema the input documents must satisfy; `None` skips
    /// validation (ad-hoc script selection).
    pub schema: Option<&'static str>,
    pub pre_actions: Vec<PreAction>,
    pub scripts: Vec<ScriptBuilder>,
    pub post_actions: Vec<PostAction>,
}

/// Look up a registered workflow by name.
pub fn lookup(name: &str) -> Option<Workflow> {
    match name {
        "provision" => Some(provision_workflow()),
        _ => None,
    }
}

/// Build an unregistered workflow from explicit script names, with the
/// default pre/post actions and no schema.
pub fn ad_hoc(script_names: &[String]) -> Result<Workflow> {
    let mut scripts: Vec<ScriptBuilder> = Vec::with_capacity(script_names.len());
    for name in script_names {
        match name.as_str() {
            "CreateCategories" => scripts.push(Box::new(categories_script)),
            "CreateSubnets" => scripts.push(Box::new(subnets_script)),
            other => return Err(Error::Workflow(format!("unknown script {other:?}"))),
        }
    }
    Ok(Workflow {
        name: "ad-hoc".to_string(),
        schema: None,
        pre_actions: default_pre_actions(),
        scripts,
        post_actions: default_post_actions(),
    })
}

fn provision_workflow() -> Workflow {
    Workflow {
        name: "provision".to_string(),
        schema: Some("provision"),
        pre_actions: default_pre_actions(),
        // Subnets may carry category references, so categories go first.
        scripts: vec![Box::new(categories_script), Box::new(subnets_script)],
        post_actions: default_post_actions(),
    }
}

fn default_pre_actions() -> Vec<PreAction> {
    vec![Box::new(resolve_credentials), Box::new(build_sessions)]
}

fn default_post_actions() -> Vec<PostAction> {
    vec![
        Box::new(report::log_summary),
        Box::new(report::write_json_report),
        Box::new(report::write_html_report),
    ]
}

/// Pre-action: resolve the management-plane credential named by the
/// document from the credential vault.
fn resolve_credentials(ctx: &mut RunContext) -> anyhow::Result<()> {
    let vault_path = ctx
        .section("credential_vault")
        .and_then(Value::as_str)
        .unwrap_or("credentials.json")
        .to_string();
    let name = ctx.field("pc_credential")?.to_string();
    let credential: Credential = FileVault::new(&vault_path).resolve(&name)?;
    ctx.insert_credential("pc", credential);
    Ok(())
}

/// Pre-action: derive the management-plane endpoint and open a session
/// against it.
fn build_sessions(ctx: &mut RunContext) -> anyhow::Result<()> {
    let pc_ip = ctx.field("pc_ip")?.to_string();
    let endpoint = format!("https://{pc_ip}:9440/api/v3");
    let credential = ctx.credential("pc")?.clone();
    let session = Session::new(&endpoint, credential)?;
    ctx.insert_endpoint("pc", endpoint);
    ctx.insert_session("pc", session);
    Ok(())
}

fn categories_script(ctx: &RunContext) -> anyhow::Result<Node> {
    let session = ctx.session("pc")?;
    let entities = Arc::new(RestEntity::new(session.clone(), "categories"));
    let tasks = Arc::new(RestTaskSource::new(session));
    Ok(Node::op(CreateCategories::from_context(ctx, entities, tasks)?))
}

fn subnets_script(ctx: &RunContext) -> anyhow::Result<Node> {
    let session = ctx.session("pc")?;
    let entities = Arc::new(RestEntity::new(session.clone(), "subnets"));
    let tasks = Arc::new(RestTaskSource::new(session));
    Ok(Node::op(CreateSubnets::from_context(ctx, entities, tasks)?))
}
