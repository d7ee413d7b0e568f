// src/exec/shell.rs

//! Shell-command worker used by the `taskstage` binary.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tracing::{debug, info};

use crate::dag::TaskSpec;
use crate::exec::worker::{WorkFuture, Worker};

/// Environment variable carrying the task id into the child process.
pub const TASK_ID_ENV: &str = "TASKSTAGE_TASK_ID";

/// Result of a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub exit_code: i32,
    pub stdout: String,
}

/// Runs each task's payload through `sh -c` (or `cmd /C` on Windows).
///
/// A non-zero exit status fails the attempt. The child is not killed when
/// the scheduler gives up waiting on a timeout.
#[derive(Debug, Clone, Default)]
pub struct ShellWorker {
    working_dir: Option<PathBuf>,
}

impl ShellWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run commands from `dir` instead of the current directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl Worker for ShellWorker {
    type Output = ShellOutput;

    fn perform(&self, task: Arc<TaskSpec>) -> WorkFuture<ShellOutput> {
        let dir = self.working_dir.clone();
        Box::pin(run_command(task, dir))
    }
}

async fn run_command(task: Arc<TaskSpec>, dir: Option<PathBuf>) -> Result<ShellOutput> {
    if task.payload.trim().is_empty() {
        bail!("task '{}' has no command to run", task.id);
    }

    info!(task = %task.id, cmd = %task.payload, "starting task process");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&task.payload);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&task.payload);
        c
    };

    cmd.env(TASK_ID_ENV, &task.id)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{}'", task.id))?;

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("waiting for process of task '{}'", task.id))?;

    let code = output.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in stderr.lines() {
        debug!(task = %task.id, "stderr: {}", line);
    }

    info!(
        task = %task.id,
        exit_code = code,
        success = output.status.success(),
        "task process exited"
    );

    if !output.status.success() {
        match stderr.lines().rev().find(|l| !l.trim().is_empty()) {
            Some(last) => bail!("command exited with status {code}: {}", last.trim()),
            None => bail!("command exited with status {code}"),
        }
    }

    Ok(ShellOutput {
        exit_code: code,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    })
}
