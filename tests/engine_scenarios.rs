//! Engine scenarios driven through real operations against the mock
//! control-plane backend.

mod common;

use common::MockBackend;
use convoy::context::RunContext;
use convoy::engine::{BatchComposer, Node, Operation, TaskState};
use convoy::ops::{CategorySpec, CreateCategories};
use serde_json::json;
use std::sync::Arc;

fn env_category() -> Vec<CategorySpec> {
    vec![CategorySpec {
        name: "Env".to_string(),
        description: None,
        values: vec!["Prod".to_string(), "Dev".to_string()],
    }]
}

fn ctx() -> Arc<RunContext> {
    Arc::new(RunContext::new(json!({})))
}

#[tokio::test]
async fn create_categories_end_to_end() {
    let backend = Arc::new(MockBackend::new());
    let op = CreateCategories::new(env_category(), backend.clone(), backend.clone());

    let result = op.run(&ctx()).await;
    assert_eq!(result, json!({"Create_Categories": {"Env": "PASS"}}));

    let state = backend.state.lock().unwrap();
    assert_eq!(state.create_calls, 1, "one category create");
    assert_eq!(state.batch_calls, 1, "both values added in one batched call");
    assert_eq!(state.entities["Env"], vec!["Prod", "Dev"]);
}

#[tokio::test]
async fn rerunning_against_satisfied_state_mutates_nothing() {
    let backend = Arc::new(MockBackend::new());
    let context = ctx();

    let first = CreateCategories::new(env_category(), backend.clone(), backend.clone());
    let result = first.run(&context).await;
    assert_eq!(result, json!({"Create_Categories": {"Env": "PASS"}}));

    let (creates, batches) = {
        let state = backend.state.lock().unwrap();
        (state.create_calls, state.batch_calls)
    };

    let second = CreateCategories::new(env_category(), backend.clone(), backend.clone());
    let result = second.run(&context).await;
    assert_eq!(result, json!({"Create_Categories": {"Env": "PASS"}}));

    let state = backend.state.lock().unwrap();
    assert_eq!(state.create_calls, creates, "no additional category create");
    assert_eq!(state.batch_calls, batches, "no additional value writes");
}

#[tokio::test]
async fn only_missing_values_are_added_to_an_existing_category() {
    let backend = Arc::new(MockBackend::with_existing(&[("Env", &["Prod"])]));
    let op = CreateCategories::new(env_category(), backend.clone(), backend.clone());

    let result = op.run(&ctx()).await;
    assert_eq!(result, json!({"Create_Categories": {"Env": "PASS"}}));

    let state = backend.state.lock().unwrap();
    assert_eq!(state.create_calls, 0, "category itself was left alone");
    assert_eq!(state.entities["Env"], vec!["Prod", "Dev"]);
}

#[tokio::test]
async fn failed_remote_tasks_still_complete_the_operation() {
    let backend = Arc::new(MockBackend {
        task_outcome: Some(TaskState::Failed),
        ..MockBackend::new()
    });
    let op = CreateCategories::new(env_category(), backend.clone(), backend.clone());

    // The entity lands (the mock applies creates), so verification passes;
    // the failed tasks surface as recorded exceptions, not a crash.
    let result = op.run(&ctx()).await;
    assert_eq!(result, json!({"Create_Categories": {"Env": "PASS"}}));
}

#[tokio::test]
async fn broken_backend_degrades_to_cant_verify() {
    let backend = Arc::new(MockBackend {
        fail_lists: true,
        ..MockBackend::new()
    });
    let op = CreateCategories::new(env_category(), backend.clone(), backend.clone());

    let result = op.run(&ctx()).await;
    assert_eq!(result, json!({"Create_Categories": {"Env": "CAN'T VERIFY"}}));
}

#[tokio::test]
async fn batch_tolerates_one_broken_child() {
    let healthy = Arc::new(MockBackend::new());
    let broken = Arc::new(MockBackend {
        fail_creates: true,
        fail_lists: true,
        ..MockBackend::new()
    });

    let mut batch = BatchComposer::sequential("categories stage");
    batch.add(Node::op(CreateCategories::new(
        env_category(),
        healthy.clone(),
        healthy.clone(),
    )));
    batch.add(Node::op(CreateCategories::new(
        vec![CategorySpec {
            name: "Tier".to_string(),
            description: None,
            values: vec![],
        }],
        broken.clone(),
        broken,
    )));

    let result = batch.run(ctx()).await;
    assert_eq!(
        result,
        json!({"Create_Categories": {"Env": "PASS", "Tier": "CAN'T VERIFY"}})
    );
}

#[tokio::test]
async fn parallel_groups_nest_inside_sequential_stages() {
    let backend = Arc::new(MockBackend::new());

    let mut parallel = BatchComposer::parallel("independent categories").with_max_workers(4);
    for name in ["Env", "Tier", "Owner"] {
        parallel.add(Node::op(CreateCategories::new(
            vec![CategorySpec {
                name: name.to_string(),
                description: None,
                values: vec![],
            }],
            backend.clone(),
            backend.clone(),
        )));
    }

    let mut root = BatchComposer::sequential("provision").with_results_key("categories");
    root.add(parallel);

    let result = root.run(ctx()).await;
    assert_eq!(
        result,
        json!({"categories": {"Create_Categories": {
            "Env": "PASS", "Tier": "PASS", "Owner": "PASS",
        }}})
    );
}
