//! Top-level workflow sequencing: load and validate input documents, run the
//! pre-actions that build up the run context, run every registered script,
//! and run the post-actions no matter how far the run got.

use super::registry::{PreAction, ScriptBuilder, Workflow};
use super::report::RunReport;
use crate::config::{self, ValidationReport};
use crate::context::RunContext;
use crate::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

pub struct WorkflowDriver {
    workflow: Workflow,
    files: Vec<PathBuf>,
}

impl WorkflowDriver {
    pub fn new(workflow: Workflow, files: Vec<PathBuf>) -> Self {
        Self { workflow, files }
    }

    /// Drive the whole run. Post-actions run even when loading, validation,
    /// or a pre-action failed, so log and report artifacts exist for every
    /// attempt; the original failure is still returned.
    pub async fn run(self) -> Result<()> {
        let WorkflowDriver { workflow, files } = self;
        info!(workflow = %workflow.name, files = files.len(), "starting workflow run");

        let mut report = RunReport::new(&workflow.name);
        let outcome = execute(&workflow, &files, &mut report).await;
        if let Err(e) = &outcome {
            report.set_fatal(e.to_string());
        }
        report.finish();

        for post_action in &workflow.post_actions {
            if let Err(e) = post_action(&report) {
                error!("post-action failed: {e:#}");
            }
        }
        outcome
    }

    /// Load and validate only, executing nothing.
    pub async fn validate(&self) -> Result<ValidationReport> {
        let document = config::load_documents(&self.files).await?;
        match self.workflow.schema {
            Some(schema_name) => {
                let schema = named_schema(schema_name)?;
                Ok(config::validate(&document, &schema))
            }
            None => Ok(ValidationReport::default()),
        }
    }
}

fn named_schema(name: &str) -> Result<config::Rule> {
    config::schema::named(name)
        .ok_or_else(|| Error::Workflow(format!("no schema named {name:?} is registered")))
}

async fn execute(workflow: &Workflow, files: &[PathBuf], report: &mut RunReport) -> Result<()> {
    let document = config::load_documents(files).await?;

    if let Some(schema_name) = workflow.schema {
        let schema = named_schema(schema_name)?;
        let validation = config::validate(&document, &schema);
        if !validation.is_valid() {
            report.record_validation_errors(validation.errors);
            return Err(Error::Validation(format!(
                "input documents failed {schema_name:?} schema validation"
            )));
        }
        info!(schema = schema_name, "input documents validated");
    }

    let mut ctx = RunContext::new(document);
    run_functions(&workflow.pre_actions, &mut ctx)?;
    let ctx = Arc::new(ctx);
    run_scripts(&workflow.scripts, ctx, report).await;
    Ok(())
}

/// Run the ordered pre-actions; each mutates the shared context in place to
/// hand derived state to later stages. A pre-action failing is catastrophic
/// setup failure and aborts the run.
fn run_functions(pre_actions: &[PreAction], ctx: &mut RunContext) -> Result<()> {
    for (index, pre_action) in pre_actions.iter().enumerate() {
        pre_action(ctx).map_err(|e| Error::Workflow(format!("pre-action {index} failed: {e:#}")))?;
    }
    Ok(())
}

/// Construct and run each registered script, logging and recording every
/// result. A script that cannot even be constructed is recorded as degraded
/// and the remaining scripts still run.
async fn run_scripts(scripts: &[ScriptBuilder], ctx: Arc<RunContext>, report: &mut RunReport) {
    for builder in scripts {
        let node = match builder(&ctx) {
            Ok(node) => node,
            Err(e) => {
                error!("could not construct script: {e:#}");
                report.record_script(serde_json::json!(format!("script not run: {e:#}")));
                continue;
            }
        };
        let label = node.label();
        let result = node.run(ctx.clone()).await;
        info!(script = %label, result = %result, "script finished");
        report.record_script(result);
    }
}
