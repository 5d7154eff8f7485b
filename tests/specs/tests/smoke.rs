// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `coopdispatch` binary.

use std::time::Duration;

use coopdispatch_specs::DispatchProcess;

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn http_health() -> anyhow::Result<()> {
    let proc = DispatchProcess::start()?;
    proc.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/api/v1/health", proc.base_url())).await?.json().await?;

    assert_eq!(resp["status"], "running");
    assert_eq!(resp["agent_count"], 0);
    assert!(resp["uptime_secs"].is_number());
    Ok(())
}

#[tokio::test]
async fn settings_from_env() -> anyhow::Result<()> {
    let proc = DispatchProcess::build()
        .env("COOP_DISPATCH_SERVER_NAME", "smoke")
        .env("COOP_DISPATCH_TASK_TYPES", "shell")
        .spawn()?;
    proc.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/api/v1/settings", proc.base_url())).await?.json().await?;
    assert_eq!(resp["server_name"], "smoke");
    assert_eq!(resp["task_types"], serde_json::json!(["shell"]));
    Ok(())
}

#[tokio::test]
async fn dispatch_round_trip_persists() -> anyhow::Result<()> {
    let proc = DispatchProcess::build().state_dir().spawn()?;
    proc.wait_healthy(TIMEOUT).await?;
    let base = proc.base_url();
    let client = reqwest::Client::new();

    client
        .post(format!("{base}/api/v1/agents"))
        .json(&serde_json::json!({ "id": "smoke-1" }))
        .send()
        .await?
        .error_for_status()?;
    let queued: serde_json::Value = client
        .post(format!("{base}/api/v1/agents/smoke-1/tasks"))
        .json(&serde_json::json!({ "type": "shell", "command": "id" }))
        .send()
        .await?
        .json()
        .await?;
    let task: serde_json::Value =
        client.get(format!("{base}/api/v1/agents/smoke-1/task")).send().await?.json().await?;
    assert_eq!(task["id"], queued["task_id"]);

    client
        .post(format!("{base}/api/v1/results"))
        .json(&serde_json::json!({ "task_id": task["id"], "agent_id": "smoke-1", "output": "root" }))
        .send()
        .await?
        .error_for_status()?;

    let dir = proc.state_dir().ok_or_else(|| anyhow::anyhow!("no state dir"))?;
    let agent_file = dir.join("agents").join("smoke-1.json");
    let results_file = dir.join("results.jsonl");
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("state dir never received agent and result");
        }
        let results = std::fs::read_to_string(&results_file).unwrap_or_default();
        if agent_file.exists() && results.contains("root") {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn invalid_task_types_exit_with_usage_error() -> anyhow::Result<()> {
    let mut proc = DispatchProcess::build().arg("--task-types").arg("shell,noop").spawn()?;
    let status = proc.wait_exit(TIMEOUT).await?;
    assert_eq!(status.code(), Some(2));
    Ok(())
}
