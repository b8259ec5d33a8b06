//! Host Runner - run shell commands directly on the host
//!
//! Default `CommandRunner`. Output is pumped into shared buffers while the
//! child runs, so a cancelled command still returns what it printed before
//! it was killed. Only the shell process itself is killed; grandchildren
//! that keep the pipes open are abandoned after [`DRAIN_GRACE`].

use async_trait::async_trait;
use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use toolgate_foundation::{CancellationToken, CommandOutput, CommandRunner, CommandSpec};
use tracing::{debug, warn};

/// How long to wait for the output pipes after the child is gone
pub const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Runs commands through a shell on the host
#[derive(Debug, Clone)]
pub struct HostRunner {
    shell: String,
    shell_args: Vec<String>,
}

impl HostRunner {
    /// `sh -c` on unix, `cmd /C` on windows
    pub fn new() -> Self {
        if cfg!(windows) {
            Self::with_shell("cmd", ["/C"])
        } else {
            Self::with_shell("sh", ["-c"])
        }
    }

    pub fn with_shell<I, S>(shell: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            shell: shell.into(),
            shell_args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for HostRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for HostRunner {
    fn name(&self) -> &str {
        "host"
    }

    async fn run(
        &self,
        spec: CommandSpec,
        cancel: CancellationToken,
    ) -> std::io::Result<CommandOutput> {
        let mut cmd = Command::new(&self.shell);
        cmd.args(&self.shell_args)
            .arg(&spec.command)
            .current_dir(&spec.cwd)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        debug!(command = %spec.command, pid = ?child.id(), "Spawned command");

        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));

        let mut pumps = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(stdout, Arc::clone(&stdout_buf))));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(stderr, Arc::clone(&stderr_buf))));
        }

        let (exit_code, cancelled) = tokio::select! {
            status = child.wait() => (status?.code(), false),
            _ = cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill cancelled command: {}", e);
                }
                (None, true)
            }
        };

        let drained = tokio::time::timeout(DRAIN_GRACE, async {
            for handle in pumps.iter_mut() {
                let _ = handle.await;
            }
        })
        .await;
        if drained.is_err() {
            debug!("Output pipes still open after exit, abandoning readers");
            for handle in &pumps {
                handle.abort();
            }
        }

        let stdout = String::from_utf8_lossy(&stdout_buf.lock()).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_buf.lock()).into_owned();

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
            cancelled,
        })
    }
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, buf: Arc<Mutex<Vec<u8>>>) {
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.lock().extend_from_slice(&chunk[..n]),
        }
    }
}
