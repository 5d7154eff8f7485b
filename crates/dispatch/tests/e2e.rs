// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests over a real TCP listener with `reqwest`.

use std::collections::HashSet;
use std::sync::{Arc, Once};
use std::time::Duration;

use clap::Parser;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use coopdispatch::config::Config;
use coopdispatch::persist::load_results;
use coopdispatch::state::DispatchState;
use coopdispatch::test_support::{spawn_http_server, test_state, wait_until};

static CRYPTO_INIT: Once = Once::new();

fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

async fn start(state: Arc<DispatchState>) -> anyhow::Result<(String, reqwest::Client)> {
    ensure_crypto();
    let (addr, _handle) = spawn_http_server(state).await?;
    Ok((format!("http://{addr}"), reqwest::Client::new()))
}

#[tokio::test]
async fn agent_lifecycle_over_tcp() -> anyhow::Result<()> {
    let (base, client) = start(test_state()).await?;

    let reg: Value = client
        .post(format!("{base}/api/v1/agents"))
        .json(&json!({ "system_info": { "os": "linux" }, "ip": "192.0.2.10", "version": "0.3.1" }))
        .send()
        .await?
        .json()
        .await?;
    let agent = reg["agent_id"].as_str().unwrap_or_default().to_owned();
    assert_eq!(agent.len(), 32);

    let beacon = client.post(format!("{base}/api/v1/agents/{agent}/beacon")).send().await?;
    assert_eq!(beacon.status(), reqwest::StatusCode::OK);

    let queued: Value = client
        .post(format!("{base}/api/v1/agents/{agent}/tasks"))
        .json(&json!({ "type": "shell", "command": "id" }))
        .send()
        .await?
        .json()
        .await?;
    let task_id = queued["task_id"].as_str().unwrap_or_default().to_owned();

    let task: Value =
        client.get(format!("{base}/api/v1/agents/{agent}/task")).send().await?.json().await?;
    assert_eq!(task["id"], task_id.as_str());
    assert_eq!(task["type"], "shell");

    let ack = client
        .post(format!("{base}/api/v1/results"))
        .json(&json!({ "task_id": task_id, "agent_id": agent, "output": "root" }))
        .send()
        .await?;
    assert_eq!(ack.status(), reqwest::StatusCode::OK);

    let result: Value =
        client.get(format!("{base}/api/v1/tasks/{task_id}/result")).send().await?.json().await?;
    assert_eq!(result["status"], "completed");
    assert_eq!(result["output"], "root");

    let next: Value =
        client.get(format!("{base}/api/v1/agents/{agent}/task")).send().await?.json().await?;
    assert_eq!(next["type"], "noop");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_pollers_each_get_distinct_tasks() -> anyhow::Result<()> {
    const N: usize = 32;
    let (base, client) = start(test_state()).await?;

    let mut queued = HashSet::new();
    for i in 0..N {
        let body: Value = client
            .post(format!("{base}/api/v1/agents/a1/tasks"))
            .json(&json!({ "type": "shell", "command": format!("job-{i}") }))
            .send()
            .await?
            .json()
            .await?;
        queued.insert(body["task_id"].as_str().unwrap_or_default().to_owned());
    }

    let mut handles = Vec::new();
    for _ in 0..N {
        let client = client.clone();
        let url = format!("{base}/api/v1/agents/a1/task");
        handles.push(tokio::spawn(async move {
            let task: Value = client.get(url).send().await?.json().await?;
            anyhow::Ok(task)
        }));
    }

    let mut delivered = HashSet::new();
    for handle in handles {
        let task = handle.await??;
        assert_ne!(task["type"], "noop");
        let id = task["id"].as_str().unwrap_or_default().to_owned();
        assert!(delivered.insert(id), "task delivered twice");
    }
    assert_eq!(delivered, queued);
    Ok(())
}

#[tokio::test]
async fn state_dir_receives_agents_and_results() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dir = tmp.path().to_string_lossy().into_owned();
    let config = Config::parse_from(["coopdispatch", "--port", "0", "--state-dir", &dir]);
    let state = Arc::new(DispatchState::new(config, CancellationToken::new())?);
    let (base, client) = start(state).await?;

    client
        .post(format!("{base}/api/v1/agents"))
        .json(&json!({ "id": "edge-7", "version": "1.0" }))
        .send()
        .await?;
    client
        .post(format!("{base}/api/v1/results"))
        .json(&json!({ "task_id": "t-1", "agent_id": "edge-7", "output": "ok" }))
        .send()
        .await?;

    let agent_file = tmp.path().join("agents").join("edge-7.json");
    let results_file = tmp.path().join("results.jsonl");
    let written = wait_until(Duration::from_secs(5), || {
        agent_file.exists() && load_results(&results_file).map(|r| r.len() == 1).unwrap_or(false)
    })
    .await;
    assert!(written, "persistence sink never caught up");

    let agent: Value = serde_json::from_str(&std::fs::read_to_string(&agent_file)?)?;
    assert_eq!(agent["id"], "edge-7");
    let results = load_results(&results_file)?;
    assert_eq!(results[0].output, "ok");
    Ok(())
}

#[tokio::test]
async fn shutdown_token_stops_server() -> anyhow::Result<()> {
    ensure_crypto();
    let state = test_state();
    let shutdown = state.shutdown.clone();
    let (addr, handle) = spawn_http_server(state).await?;

    let health = reqwest::get(format!("http://{addr}/api/v1/health")).await?;
    assert_eq!(health.status(), reqwest::StatusCode::OK);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle).await??;
    Ok(())
}
