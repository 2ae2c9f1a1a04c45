//! `kubectl port-forward` tunnel to an in-cluster service.
//!
//! The tunnel is an owned handle: whoever starts it must call
//! [`PortForward::close`]. The child is also spawned with `kill_on_drop` so a
//! dropped handle never outlives the process.

use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::time::{Duration, Instant, timeout};

/// How long kubectl gets to report that forwarding is up.
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum PortForwardError {
    #[error("Failed to spawn kubectl: {0}")]
    SpawnFailed(String),

    #[error("Port-forward did not become ready: {0}")]
    NotReady(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// What to forward and how to reach the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortForwardSpec {
    pub service: String,
    pub namespace: String,
    pub remote_port: u16,
    pub local_port: u16,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
}

impl PortForwardSpec {
    /// Arguments passed to `kubectl`.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "port-forward".to_string(),
            format!("service/{}", self.service),
            format!("{}:{}", self.local_port, self.remote_port),
            "-n".to_string(),
            self.namespace.clone(),
        ];
        if let Some(kubeconfig) = &self.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(kubeconfig.display().to_string());
        }
        if let Some(context) = &self.context {
            args.push("--context".to_string());
            args.push(context.clone());
        }
        args
    }
}

/// A running port-forward.
#[derive(Debug)]
pub struct PortForward {
    child: Child,
    local_port: u16,
}

impl PortForward {
    /// Spawn kubectl and wait until it reports `Forwarding from`.
    ///
    /// On any failure the child is killed before the error is returned.
    pub async fn start(spec: &PortForwardSpec) -> Result<Self, PortForwardError> {
        Self::start_with(Path::new("kubectl"), spec).await
    }

    async fn start_with(program: &Path, spec: &PortForwardSpec) -> Result<Self, PortForwardError> {
        let args = spec.args();
        debug!("Starting {} {}", program.display(), args.join(" "));

        let mut child = Command::new(program)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PortForwardError::SpawnFailed(e.to_string()))?;

        let stderr = child.stderr.take();
        let ready = match child.stdout.take() {
            Some(stdout) => {
                let mut reader = BufReader::new(stdout).lines();
                let deadline = Instant::now() + READY_TIMEOUT;

                loop {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    let line = match timeout(remaining, reader.next_line()).await {
                        Ok(Ok(Some(line))) => line,
                        _ => break false,
                    };
                    if line.contains("Forwarding from") {
                        // Keep draining stdout so kubectl never blocks on a full pipe.
                        tokio::spawn(async move { while let Ok(Some(_)) = reader.next_line().await {} });
                        break true;
                    }
                }
            }
            None => false,
        };

        if !ready {
            let message = read_stderr(stderr).await;
            if let Err(e) = child.kill().await {
                debug!("Failed to kill kubectl port-forward: {}", e);
            }
            return Err(PortForwardError::NotReady(message));
        }

        // A closed stderr pipe would kill kubectl on its first error line.
        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("kubectl port-forward: {}", line);
                }
            });
        }

        info!(
            "Forwarding localhost:{} to service/{} in {}",
            spec.local_port, spec.service, spec.namespace
        );
        Ok(Self {
            child,
            local_port: spec.local_port,
        })
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn base_url(&self) -> String {
        format!("http://localhost:{}/", self.local_port)
    }

    /// Terminate kubectl and reap it.
    pub async fn close(mut self) {
        match self.child.kill().await {
            Ok(()) => debug!("Closed port-forward on localhost:{}", self.local_port),
            Err(e) => debug!("Port-forward on localhost:{} already gone: {}", self.local_port, e),
        }
    }
}

async fn read_stderr(stderr: Option<ChildStderr>) -> String {
    let Some(stderr) = stderr else {
        return "no output from kubectl".to_string();
    };

    let mut reader = BufReader::new(stderr).lines();
    let mut errors = Vec::new();
    while let Ok(Ok(Some(line))) = timeout(Duration::from_millis(200), reader.next_line()).await {
        if !line.is_empty() {
            errors.push(line);
        }
    }

    if errors.is_empty() {
        "no output from kubectl".to_string()
    } else {
        errors.join("; ")
    }
}
