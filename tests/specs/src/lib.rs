//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `ids-server` binary as a subprocess and exercises it
//! over HTTP and WebSocket.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Once;
use std::time::Duration;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times — only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Resolve the path to the compiled `ids-server` binary.
pub fn ids_server_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("ids-server")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Write a rule YAML fixture into `dir` under `name`.yaml.
pub fn write_rule(dir: &Path, name: &str, body: &str) -> anyhow::Result<()> {
    std::fs::write(dir.join(format!("{name}.yaml")), body)?;
    Ok(())
}

/// A running `ids-server` process that is killed on drop.
pub struct IdsServerProcess {
    child: Child,
    port: u16,
    _rules_dir: tempfile::TempDir,
}

/// Builder for configuring a spawned [`IdsServerProcess`].
pub struct IdsServerBuilder {
    backend: &'static str,
    redis_url: Option<String>,
    rules: Vec<(String, String)>,
    watch_rules: bool,
}

impl Default for IdsServerBuilder {
    fn default() -> Self {
        Self { backend: "memory", redis_url: None, rules: Vec::new(), watch_rules: false }
    }
}

impl IdsServerBuilder {
    /// Use the Redis-backed state store and event bus.
    pub fn redis(mut self, url: &str) -> Self {
        self.backend = "redis";
        self.redis_url = Some(url.to_owned());
        self
    }

    /// Enable the filesystem watcher so rule edits are picked up live.
    pub fn watch_rules(mut self) -> Self {
        self.watch_rules = true;
        self
    }

    /// Seed a rule document under the temp rules directory before spawning.
    pub fn rule(mut self, name: &str, body: &str) -> Self {
        self.rules.push((name.to_owned(), body.to_owned()));
        self
    }

    /// Spawn `ids-server` with the configured rules and backend.
    pub fn spawn(self) -> anyhow::Result<IdsServerProcess> {
        ensure_crypto();
        let binary = ids_server_binary();
        anyhow::ensure!(binary.exists(), "ids-server binary not found at {}", binary.display());

        let rules_dir = tempfile::tempdir()?;
        for (name, body) in &self.rules {
            write_rule(rules_dir.path(), name, body)?;
        }

        let port = free_port()?;

        let mut args: Vec<String> = vec![
            "--host".into(),
            "127.0.0.1".into(),
            "--port".into(),
            port.to_string(),
            "--backend".into(),
            self.backend.into(),
            "--rules-dir".into(),
            rules_dir.path().to_string_lossy().into_owned(),
            "--watch-rules".into(),
            self.watch_rules.to_string(),
        ];
        if let Some(ref url) = self.redis_url {
            args.extend(["--redis-url".into(), url.clone()]);
        }

        let child = Command::new(&binary)
            .args(&args)
            .env("RUST_LOG", "warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(IdsServerProcess { child, port, _rules_dir: rules_dir })
    }
}

impl IdsServerProcess {
    /// Create a builder for custom backend/rule configuration.
    pub fn build() -> IdsServerBuilder {
        IdsServerBuilder::default()
    }

    /// Spawn with the default in-memory backend and no preloaded rules.
    pub fn start() -> anyhow::Result<Self> {
        ensure_crypto();
        Self::build().spawn()
    }

    /// Spawn with the default in-memory backend and the given rule fixtures.
    pub fn start_with_rules(rules: &[(&str, &str)]) -> anyhow::Result<Self> {
        ensure_crypto();
        let mut builder = Self::build();
        for (name, body) in rules {
            builder = builder.rule(name, body);
        }
        builder.spawn()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL for HTTP requests.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// WebSocket URL for tailing either `events` or `alerts`.
    pub fn ws_url(&self, stream: &str) -> String {
        format!("ws://127.0.0.1:{}/ws/{stream}", self.port)
    }

    /// Poll `/api/v1/health` until it responds successfully.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/health", self.base_url());
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("ids-server did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// POST a raw log line to `/api/v1/events?debug=1` and return the parsed body.
    pub async fn ingest_debug(&self, source: &str, message: &str) -> anyhow::Result<serde_json::Value> {
        let client = reqwest::Client::new();
        let resp = client
            .post(format!("{}/api/v1/events?debug=1", self.base_url()))
            .json(&serde_json::json!({ "source": source, "message": message }))
            .send()
            .await?;
        Ok(resp.json().await?)
    }

    /// Wait for the process to exit within `timeout`.
    pub async fn wait_exit(&mut self, timeout: Duration) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("ids-server did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for IdsServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
