//! Run reporting: the aggregate every script result folds into, persisted as
//! JSON and rendered to HTML once the run finishes.

use crate::engine::merge_result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info};
use uuid::Uuid;

const HTML_TEMPLATE: &str = include_str!("../../templates/report.html");

/// Everything one workflow run produced.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub workflow: String,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub validation_errors: Vec<String>,
    pub results: Map<String, Value>,
    pub fatal: Option<String>,
}

impl RunReport {
    pub fn new(workflow: &str) -> Self {
        Self {
            workflow: workflow.to_string(),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            validation_errors: Vec::new(),
            results: Map::new(),
            fatal: None,
        }
    }

    /// Fold one script's result into the run aggregate.
    pub fn record_script(&mut self, result: Value) {
        merge_result(&mut self.results, result);
    }

    pub fn record_validation_errors(&mut self, errors: Vec<String>) {
        self.validation_errors = errors;
    }

    pub fn set_fatal(&mut self, message: String) {
        self.fatal = Some(message);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    fn file_stem(&self) -> String {
        format!(
            "convoy-report-{}-{}",
            self.workflow,
            self.started_at.format("%Y%m%d-%H%M%S")
        )
    }
}

/// Post-action: one summary line per result group, plus every validation
/// error and the fatal cause when the run aborted early.
pub fn log_summary(report: &RunReport) -> anyhow::Result<()> {
    info!(
        workflow = %report.workflow,
        run_id = %report.run_id,
        "run finished"
    );
    for error in &report.validation_errors {
        error!("validation: {error}");
    }
    for (group, value) in &report.results {
        info!(group = %group, result = %value, "script result");
    }
    if let Some(fatal) = &report.fatal {
        error!("run aborted: {fatal}");
    }
    Ok(())
}

/// Post-action: persist the full report as pretty-printed JSON next to the
/// invocation.
pub fn write_json_report(report: &RunReport) -> anyhow::Result<()> {
    let path = format!("{}.json", report.file_stem());
    std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
    info!(path, "wrote JSON run report");
    Ok(())
}

/// Post-action: render the operator-facing HTML summary.
pub fn write_html_report(report: &RunReport) -> anyhow::Result<()> {
    let mut context = tera::Context::new();
    context.insert("report", report);
    context.insert(
        "results_pretty",
        &serde_json::to_string_pretty(&report.results)?,
    );
    let html = tera::Tera::one_off(HTML_TEMPLATE, &context, true)?;
    let path = format!("{}.html", report.file_stem());
    std::fs::write(&path, html)?;
    info!(path, "wrote HTML run report");
    Ok(())
}
