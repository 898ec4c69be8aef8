use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::core::config::AppPaths;

use super::types::ModelRuntimeConfig;

const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{role} model has neither a local path nor a base_url")]
    MissingModelPath { role: &'static str },
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("llama-server for {role} model exited during startup ({status})")]
    ExitedEarly { role: &'static str, status: String },
    #[error("timed out waiting for {url} to become healthy")]
    HealthTimeout { url: String },
}

/// Supervises one `llama-server` instance serving a single model.
///
/// Managed instances are spawned on [`LlamaService::start`] and killed on
/// [`LlamaService::shutdown`]; external ones (configured with `base_url`) are
/// only health-checked.
#[derive(Clone)]
pub struct LlamaService {
    inner: Arc<Mutex<LlamaManager>>,
    config: Arc<ModelRuntimeConfig>,
    client: Client,
}

struct LlamaManager {
    child_process: Option<Child>,
    server_path: PathBuf,
}

impl LlamaService {
    pub fn new(
        config: ModelRuntimeConfig,
        binary_override: Option<PathBuf>,
        paths: &AppPaths,
        client: Client,
    ) -> Self {
        let server_path = binary_override.unwrap_or_else(|| Self::find_server_binary(paths));
        Self {
            inner: Arc::new(Mutex::new(LlamaManager {
                child_process: None,
                server_path,
            })),
            config: Arc::new(config),
            client,
        }
    }

    fn find_server_binary(paths: &AppPaths) -> PathBuf {
        let candidates = vec![
            paths.project_root.join("bin/llama-server.exe"),
            paths.project_root.join("bin/llama-server"),
            PathBuf::from("llama-server"),
        ];

        for path in candidates {
            if path.exists() || which::which(&path).is_ok() {
                return path;
            }
        }
        PathBuf::from("llama-server")
    }

    pub fn config(&self) -> &ModelRuntimeConfig {
        &self.config
    }

    pub fn base_url(&self) -> String {
        self.config.base_url()
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Brings the server up and blocks until `/health` answers.
    pub async fn start(&self) -> Result<(), LlmError> {
        let role = self.config.role.as_str();

        if self.config.is_external() {
            tracing::info!(
                "Using external {} server at {}",
                role,
                self.config.base_url()
            );
            return self.wait_for_health().await;
        }

        let mut manager = self.inner.lock().await;
        if manager.child_process.is_some() {
            return Ok(());
        }

        if self.config.model_path.is_none() {
            return Err(LlmError::MissingModelPath { role });
        }

        let mut cmd = Command::new(&manager.server_path);
        cmd.args(self.config.server_args());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| LlmError::Spawn {
            binary: manager.server_path.clone(),
            source,
        })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(async move {
                let mut reader = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    tracing::debug!("[llama-server:{}] {}", role, line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    tracing::debug!("[llama-server-err:{}] {}", role, line);
                }
            });
        }

        tracing::info!(
            "Started llama-server for {} model '{}' on port {}",
            role,
            self.config.model_key,
            self.config.port
        );
        manager.child_process = Some(child);

        let deadline = tokio::time::Instant::now() + HEALTH_TIMEOUT;
        let url = format!("{}/health", self.config.base_url());
        loop {
            if let Some(child) = manager.child_process.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    manager.child_process = None;
                    return Err(LlmError::ExitedEarly {
                        role,
                        status: status.to_string(),
                    });
                }
            }

            if self.is_healthy(&url).await {
                return Ok(());
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(LlmError::HealthTimeout { url });
            }
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }
    }

    pub async fn shutdown(&self) {
        let mut manager = self.inner.lock().await;
        if let Some(mut child) = manager.child_process.take() {
            if let Err(err) = child.kill().await {
                tracing::warn!(
                    "Failed to stop llama-server for {} model: {}",
                    self.config.role.as_str(),
                    err
                );
            } else {
                tracing::info!(
                    "Stopped llama-server for {} model",
                    self.config.role.as_str()
                );
            }
        }
    }

    async fn wait_for_health(&self) -> Result<(), LlmError> {
        let url = format!("{}/health", self.config.base_url());
        let deadline = tokio::time::Instant::now() + HEALTH_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if self.is_healthy(&url).await {
                return Ok(());
            }
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }
        Err(LlmError::HealthTimeout { url })
    }

    async fn is_healthy(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(res) => res.status().is_success(),
            Err(_) => false,
        }
    }
}
