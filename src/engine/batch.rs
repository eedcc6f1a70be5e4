//! Batch composition: run a list of operations (or nested batches) to
//! completion under one of two scheduling disciplines and produce one merged
//! result.
//!
//! A batch never lets a child's failure halt it. Sequential batches give a
//! strict ordering guarantee and are the default; parallel batches run their
//! children on a bounded set of tasks and must only contain children that
//! are independent by construction.

use super::merge::merge_result;
use crate::context::RunContext;
use crate::engine::Operation;
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

/// Upper bound on the default worker count for parallel batches.
const MAX_DEFAULT_WORKERS: usize = 32;

/// Headroom over available parallelism, since workers spend most of their
/// time blocked on remote calls rather than the CPU.
const WORKER_HEADROOM: usize = 4;

/// Default worker count for a parallel batch.
pub fn default_workers() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cpus + WORKER_HEADROOM).min(MAX_DEFAULT_WORKERS)
}

/// A schedulable child of a batch: a leaf operation or a nested batch.
pub enum Node {
    Op(Arc<dyn Operation>),
    Batch(BatchComposer),
}

impl Node {
    pub fn op(operation: impl Operation + 'static) -> Self {
        Node::Op(Arc::new(operation))
    }

    pub fn label(&self) -> String {
        match self {
            Node::Op(op) => op.name().to_string(),
            Node::Batch(batch) => batch.name.clone(),
        }
    }

    pub fn run(self, ctx: Arc<RunContext>) -> BoxFuture<'static, Value> {
        match self {
            Node::Op(op) => async move { op.run(&ctx).await }.boxed(),
            Node::Batch(batch) => batch.run(ctx).boxed(),
        }
    }
}

impl From<BatchComposer> for Node {
    fn from(batch: BatchComposer) -> Self {
        Node::Batch(batch)
    }
}

/// A container of operations and nested batches, run sequentially or in
/// parallel, merging every child's result into one aggregate.
pub struct BatchComposer {
    name: String,
    children: Vec<Node>,
    results_key: Option<String>,
    parallel: bool,
    max_workers: usize,
}

impl BatchComposer {
    /// A batch whose children run strictly in insertion order. Use this
    /// whenever later children depend on earlier ones having completed.
    pub fn sequential(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            results_key: None,
            parallel: false,
            max_workers: 1,
        }
    }

    /// A batch whose children run concurrently on a bounded worker set.
    /// Children must be mutually independent.
    pub fn parallel(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            results_key: None,
            parallel: true,
            max_workers: default_workers(),
        }
    }

    /// Namespace this batch's contribution under `key` in its parent's
    /// aggregate.
    pub fn with_results_key(mut self, key: impl Into<String>) -> Self {
        self.results_key = Some(key.into());
        self
    }

    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    pub fn add(&mut self, node: impl Into<Node>) {
        self.children.push(node.into());
    }

    /// Append a conditionally-constructed child; absent entries are logged
    /// and ignored rather than rejected.
    pub fn add_opt(&mut self, node: Option<Node>) {
        match node {
            Some(node) => self.children.push(node),
            None => warn!(batch = %self.name, "skipping absent batch entry"),
        }
    }

    pub fn add_all(&mut self, nodes: impl IntoIterator<Item = Node>) {
        self.children.extend(nodes);
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Run every child to completion and return the merged aggregate,
    /// wrapped under `results_key` when one was set. A child failing (or
    /// panicking) degrades to a logged error and a missing entry; the batch
    /// always yields a best-effort partial result.
    pub async fn run(self, ctx: Arc<RunContext>) -> Value {
        let BatchComposer {
            name,
            children,
            results_key,
            parallel,
            max_workers,
        } = self;

        debug!(
            batch = %name,
            children = children.len(),
            parallel,
            "running batch"
        );

        let aggregate = if parallel {
            run_parallel(&name, children, ctx, max_workers).await
        } else {
            run_sequential(&name, children, ctx).await
        };

        match results_key {
            Some(key) => {
                let mut wrapped = Map::new();
                wrapped.insert(key, Value::Object(aggregate));
                Value::Object(wrapped)
            }
            None => Value::Object(aggregate),
        }
    }
}

async fn run_sequential(
    batch: &str,
    children: Vec<Node>,
    ctx: Arc<RunContext>,
) -> Map<String, Value> {
    let mut aggregate = Map::new();
    for child in children {
        let label = child.label();
        // Spawned so that a panicking child surfaces as a JoinError here
        // instead of unwinding through the batch.
        match tokio::spawn(child.run(ctx.clone())).await {
            Ok(result) => merge_result(&mut aggregate, result),
            Err(e) => error!(batch, child = %label, "batch child did not complete: {e}"),
        }
    }
    aggregate
}

async fn run_parallel(
    batch: &str,
    children: Vec<Node>,
    ctx: Arc<RunContext>,
    max_workers: usize,
) -> Map<String, Value> {
    let semaphore = Arc::new(Semaphore::new(max_workers));
    let mut handles = Vec::with_capacity(children.len());
    for child in children {
        let semaphore = semaphore.clone();
        let ctx = ctx.clone();
        let label = child.label();
        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            child.run(ctx).await
        });
        handles.push((label, handle));
    }

    let mut aggregate = Map::new();
    for (label, handle) in handles {
        match handle.await {
            Ok(result) => merge_result(&mut aggregate, result),
            Err(e) => error!(batch, child = %label, "batch child did not complete: {e}"),
        }
    }
    aggregate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Check, OpState};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubOp {
        name: String,
        result_group: String,
        fail_execute: bool,
    }

    impl StubOp {
        fn passing(name: &str) -> Self {
            Self {
                name: name.to_string(),
                result_group: name.to_string(),
                fail_execute: false,
            }
        }

        fn failing(name: &str) -> Self {
            Self {
                name: name.to_string(),
                result_group: name.to_string(),
                fail_execute: true,
            }
        }
    }

    #[async_trait]
    impl crate::engine::Operation for StubOp {
        fn name(&self) -> &str {
            &self.name
        }

        async fn execute(&self, _state: &mut OpState, _ctx: &RunContext) -> anyhow::Result<()> {
            if self.fail_execute {
                anyhow::bail!("simulated remote failure")
            }
            Ok(())
        }

        async fn verify(&self, state: &mut OpState, _ctx: &RunContext) -> anyhow::Result<()> {
            let check = if self.fail_execute {
                Check::Fail
            } else {
                Check::Pass
            };
            state.record_check(&self.result_group, "target", check);
            Ok(())
        }
    }

    #[tokio::test]
    async fn one_failing_child_does_not_empty_the_batch() {
        let mut batch = BatchComposer::sequential("stage");
        batch.add(Node::op(StubOp::passing("c1")));
        batch.add(Node::op(StubOp::failing("c2")));
        batch.add(Node::op(StubOp::passing("c3")));

        let out = batch.run(Arc::new(RunContext::for_tests())).await;
        assert_eq!(
            out,
            json!({
                "c1": {"target": "PASS"},
                "c2": {"target": "FAIL"},
                "c3": {"target": "PASS"},
            })
        );
    }

    #[tokio::test]
    async fn results_key_namespaces_the_aggregate() {
        let mut batch = BatchComposer::sequential("stage").with_results_key("networking");
        batch.add(Node::op(StubOp::passing("c1")));

        let out = batch.run(Arc::new(RunContext::for_tests())).await;
        assert_eq!(out, json!({"networking": {"c1": {"target": "PASS"}}}));
    }

    #[tokio::test]
    async fn nested_batches_merge_into_parent() {
        let mut inner = BatchComposer::parallel("inner").with_results_key("inner");
        inner.add(Node::op(StubOp::passing("p1")));
        inner.add(Node::op(StubOp::passing("p2")));

        let mut outer = BatchComposer::sequential("outer");
        outer.add(Node::op(StubOp::passing("first")));
        outer.add(inner);

        let out = outer.run(Arc::new(RunContext::for_tests())).await;
        assert_eq!(
            out,
            json!({
                "first": {"target": "PASS"},
                "inner": {
                    "p1": {"target": "PASS"},
                    "p2": {"target": "PASS"},
                },
            })
        );
    }

    #[tokio::test]
    async fn absent_entries_are_ignored() {
        let mut batch = BatchComposer::sequential("stage");
        batch.add_opt(None);
        batch.add_opt(Some(Node::op(StubOp::passing("c1"))));
        let out = batch.run(Arc::new(RunContext::for_tests())).await;
        assert_eq!(out, json!({"c1": {"target": "PASS"}}));
    }

    struct Gate {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    struct SlowOp {
        name: String,
        gate: Arc<Gate>,
    }

    #[async_trait]
    impl crate::engine::Operation for SlowOp {
        fn name(&self) -> &str {
            &self.name
        }

        async fn execute(&self, _state: &mut OpState, _ctx: &RunContext) -> anyhow::Result<()> {
            let now = self.gate.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.gate.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.gate.running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }

        async fn verify(&self, _state: &mut OpState, _ctx: &RunContext) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn parallel_batch_honors_worker_bound() {
        let gate = Arc::new(Gate {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let mut batch = BatchComposer::parallel("stage").with_max_workers(2);
        for i in 0..6 {
            batch.add(Node::op(SlowOp {
                name: format!("op{i}"),
                gate: gate.clone(),
            }));
        }
        batch.run(Arc::new(RunContext::for_tests())).await;
        assert!(gate.peak.load(Ordering::SeqCst) <= 2);
    }
}
