//! Operation contract: one idempotent unit of remote work plus its own
//! correctness check.
//!
//! An operation passes through `execute` (the single mutation attempt) and
//! then `verify` (an independent re-query of the target). Both phases record
//! into an [`OpState`] instead of propagating: a failed execute must not stop
//! verification, and a broken verifier must not mask an otherwise-successful
//! run. The only entry point callers use is [`Operation::run`], which returns
//! the recorded results and logs every accumulated exception at error level.
//!
//! Operations carry no retry logic; the retry unit is re-running the whole
//! operation, which is safe because `execute` is required to skip-and-warn
//! when the target state already holds.

use crate::context::RunContext;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, error, warn};

/// Verification classification for one logical sub-target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Pass,
    Fail,
    CantVerify,
}

impl Check {
    pub fn as_str(self) -> &'static str {
        match self {
            Check::Pass => "PASS",
            Check::Fail => "FAIL",
            Check::CantVerify => "CAN'T VERIFY",
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable per-invocation state of one operation run.
///
/// `results` holds only JSON values, so anything recorded here is
/// serializable into the run report by construction.
#[derive(Debug, Default)]
pub struct OpState {
    pub results: Map<String, Value>,
    pub exceptions: Vec<String>,
}

impl OpState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a non-fatal issue encountered during execute or verify.
    pub fn record_issue(&mut self, issue: impl Into<String>) {
        self.exceptions.push(issue.into());
    }

    /// Record a verification check for one sub-target under a result group.
    pub fn record_check(&mut self, group: &str, target: &str, check: Check) {
        let slot = self
            .results
            .entry(group)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = slot {
            map.insert(target.to_string(), Value::String(check.as_str().to_string()));
        }
    }

    /// Record an arbitrary result value under a top-level key.
    pub fn record(&mut self, key: &str, value: Value) {
        self.results.insert(key.to_string(), value);
    }
}

/// One idempotent unit of remote work.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Stable name, used as the log prefix and the default result group.
    fn name(&self) -> &str;

    /// Perform the single mutation attempt. Must skip-and-warn when the
    /// target is already in the desired state. Partial failures are recorded
    /// via [`OpState::record_issue`]; a returned error is recorded by `run`
    /// and never propagates past it.
    async fn execute(&self, state: &mut OpState, ctx: &RunContext) -> anyhow::Result<()>;

    /// Independently re-query the target and record PASS/FAIL/CAN'T VERIFY
    /// per sub-target. Errors while checking should degrade to
    /// [`Check::CantVerify`] entries; a returned error is the backstop and is
    /// recorded by `run`.
    async fn verify(&self, state: &mut OpState, ctx: &RunContext) -> anyhow::Result<()>;

    /// Drive execute then verify, log accumulated exceptions, return results.
    async fn run(&self, ctx: &RunContext) -> Value {
        let mut state = OpState::new();
        debug!(operation = self.name(), "executing");
        if let Err(e) = self.execute(&mut state, ctx).await {
            state.record_issue(format!("execute failed: {e:#}"));
        }
        debug!(operation = self.name(), "verifying");
        if let Err(e) = self.verify(&mut state, ctx).await {
            warn!(
                operation = self.name(),
                "verification could not complete: {e:#}"
            );
            state.record_issue(format!("verify failed: {e:#}"));
        }
        for exception in &state.exceptions {
            error!("{}: {}", self.name(), exception);
        }
        Value::Object(state.results)
    }
}
