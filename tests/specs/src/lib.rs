// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `coopdispatch` binary as a subprocess and exercises it
//! over HTTP.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Once;
use std::time::Duration;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Resolve the path to the compiled `coopdispatch` binary.
pub fn dispatch_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("coopdispatch")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `coopdispatch` process that is killed on drop.
pub struct DispatchProcess {
    child: Child,
    port: u16,
    state_dir: Option<tempfile::TempDir>,
}

/// Builder for the flags a [`DispatchProcess`] is started with.
#[derive(Default)]
pub struct DispatchBuilder {
    args: Vec<String>,
    envs: Vec<(String, String)>,
    state_dir: bool,
}

impl DispatchBuilder {
    /// Append a raw command-line argument.
    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_owned());
        self
    }

    /// Set an environment variable on the child.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.envs.push((key.to_owned(), value.to_owned()));
        self
    }

    /// Persist to a fresh temporary `--state-dir`.
    pub fn state_dir(mut self) -> Self {
        self.state_dir = true;
        self
    }

    /// Spawn the binary on a free port.
    pub fn spawn(self) -> anyhow::Result<DispatchProcess> {
        ensure_crypto();
        let binary = dispatch_binary();
        anyhow::ensure!(binary.exists(), "coopdispatch binary not found at {}", binary.display());

        let port = free_port()?;
        let state_dir = if self.state_dir { Some(tempfile::tempdir()?) } else { None };

        let mut args: Vec<String> = vec![
            "--host".into(),
            "127.0.0.1".into(),
            "--port".into(),
            port.to_string(),
            "--log-level".into(),
            "warn".into(),
        ];
        if let Some(ref dir) = state_dir {
            args.extend(["--state-dir".into(), dir.path().to_string_lossy().into_owned()]);
        }
        args.extend(self.args);

        let child = Command::new(&binary)
            .args(&args)
            .envs(self.envs)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(DispatchProcess { child, port, state_dir })
    }
}

impl DispatchProcess {
    pub fn build() -> DispatchBuilder {
        DispatchBuilder::default()
    }

    /// Spawn with default flags.
    pub fn start() -> anyhow::Result<Self> {
        Self::build().spawn()
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// The temporary state directory, if one was requested.
    pub fn state_dir(&self) -> Option<&Path> {
        self.state_dir.as_ref().map(|d| d.path())
    }

    /// Poll health until responsive.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/health", self.base_url());
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("coopdispatch did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Wait for the process to exit within `timeout`.
    pub async fn wait_exit(
        &mut self,
        timeout: Duration,
    ) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("coopdispatch did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for DispatchProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
