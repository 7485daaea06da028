//! Supervision of the prediction service as a child process
//!
//! [`ServiceSupervisor`] owns the spawned process: it waits for `/health` to
//! answer, queries the running service and stops it again. Dropping the
//! supervisor kills a child that is still running.

use crate::error::{Result, ScoreError};
use crate::server::ServerConfig;
use reqwest::blocking::Client;
use serde_json::Value;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Starts, health-checks and stops one service process.
pub struct ServiceSupervisor {
    program: PathBuf,
    args: Vec<String>,
    base_url: String,
    startup_timeout: Duration,
    poll_interval: Duration,
    client: Client,
    child: Option<Child>,
}

impl ServiceSupervisor {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(HEALTH_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ScoreError::ConfigError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            program: program.into(),
            args,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            startup_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(250),
            client,
            child: None,
        })
    }

    /// Supervise `<this executable> serve` bound to `config`.
    pub fn for_current_exe(config: &ServerConfig) -> Result<Self> {
        let exe = std::env::current_exe()?;
        let args = vec![
            "serve".to_string(),
            "--host".to_string(),
            config.host.clone(),
            "--port".to_string(),
            config.port.to_string(),
            "--artifacts".to_string(),
            config.artifacts.dir.display().to_string(),
        ];
        Self::new(exe, args, config.base_url())
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Spawn the process and block until it reports healthy.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| {
                ScoreError::IoError(std::io::Error::new(
                    e.kind(),
                    format!("failed to start {}: {}", self.program.display(), e),
                ))
            })?;
        info!(pid = child.id(), url = %self.base_url, "Started prediction service");
        self.child = Some(child);

        if let Err(e) = self.wait_until_healthy() {
            self.stop()?;
            return Err(e);
        }
        Ok(())
    }

    /// Poll `/health` until it answers 200, the child exits or the startup
    /// timeout passes.
    pub fn wait_until_healthy(&mut self) -> Result<()> {
        let start = Instant::now();
        loop {
            if self.is_healthy() {
                info!(elapsed_ms = start.elapsed().as_millis() as u64, "Prediction service is healthy");
                return Ok(());
            }
            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    return Err(ScoreError::ComputationError(format!(
                        "prediction service exited during startup ({})",
                        status
                    )));
                }
            }
            if start.elapsed() >= self.startup_timeout {
                return Err(ScoreError::ComputationError(format!(
                    "prediction service not healthy after {:?}",
                    self.startup_timeout
                )));
            }
            thread::sleep(self.poll_interval);
        }
    }

    pub fn is_healthy(&self) -> bool {
        match self.client.get(format!("{}/health", self.base_url)).send() {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "health check failed");
                false
            }
        }
    }

    /// GET `path` on the running service and decode the JSON body.
    pub fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let response = self.client.get(&url).send()?;
        let status = response.status();
        let body: Value = response.json()?;
        if !status.is_success() {
            return Err(ScoreError::ComputationError(format!("GET {} returned {}: {}", url, status, body)));
        }
        Ok(body)
    }

    /// Kill the child if it is still running and reap it.
    pub fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if child.try_wait()?.is_none() {
            child.kill()?;
        }
        let status = child.wait()?;
        info!(status = %status, "Prediction service stopped");
        Ok(())
    }
}

impl Drop for ServiceSupervisor {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "Failed to stop prediction service");
        }
    }
}
