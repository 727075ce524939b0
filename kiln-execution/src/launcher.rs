//! Launching worker processes

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, trace, warn};

use crate::error::ExecutionError;

/// Flag that switches the `kiln` binary into its worker loader
pub const WORKER_FLAG: &str = "--worker";

/// Flag carrying the system classpath of a worker process
pub const CLASSPATH_FLAG: &str = "--classpath";

/// Everything needed to start one worker process
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
    /// Bytes written to the process's standard input, which is then closed
    pub stdin: Vec<u8>,
}

impl WorkerCommand {
    /// The fixed worker loader command line for `system_classpath`
    pub fn loader(program: impl Into<PathBuf>, system_classpath: OsString, stdin: Vec<u8>) -> Self {
        Self {
            program: program.into(),
            args: vec![WORKER_FLAG.into(), CLASSPATH_FLAG.into(), system_classpath],
            env: BTreeMap::new(),
            working_dir: None,
            stdin,
        }
    }

    fn spawn_error(&self, reason: impl ToString) -> ExecutionError {
        ExecutionError::SpawnFailed {
            program: self.program.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Starts worker processes
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Start the process and hand it its standard input. Returns once the
    /// process exists, not when it finishes or has read its input.
    async fn launch(&self, command: WorkerCommand) -> Result<Child, ExecutionError>;
}

/// Launches workers as real OS processes
#[derive(Debug, Clone, Default)]
pub struct TokioProcessLauncher;

impl TokioProcessLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessLauncher for TokioProcessLauncher {
    async fn launch(&self, command: WorkerCommand) -> Result<Child, ExecutionError> {
        debug!(
            "Launching worker process: {} {:?}",
            command.program.display(),
            command.args
        );

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| command.spawn_error(e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| command.spawn_error("Failed to get stdin"))?;

        // The child may not read its input until it is scheduled, so the
        // descriptor is written without holding up the caller.
        let pid = child.id();
        let input = command.stdin;
        tokio::spawn(async move {
            if let Err(e) = stdin_writer_task(pid, stdin, input).await {
                warn!("Failed to write descriptor to pid {:?}: {}", pid, e);
            }
        });

        debug!("Worker process started with pid {:?}", pid);
        Ok(child)
    }
}

/// Write the whole input, then close the pipe so the child sees EOF
async fn stdin_writer_task(pid: Option<u32>, mut stdin: ChildStdin, input: Vec<u8>) -> std::io::Result<()> {
    stdin.write_all(&input).await?;
    stdin.shutdown().await?;
    trace!("Wrote {} descriptor bytes to pid {:?}", input.len(), pid);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_command_line() {
        let command = WorkerCommand::loader("/opt/kiln/bin/kiln", "/opt/kiln/lib".into(), b"{}".to_vec());
        assert_eq!(
            command.args,
            vec![
                OsString::from("--worker"),
                OsString::from("--classpath"),
                OsString::from("/opt/kiln/lib"),
            ]
        );
        assert!(command.env.is_empty());
        assert!(command.working_dir.is_none());
    }

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_failure() {
        let command = WorkerCommand::loader("/does/not/exist/kiln", OsString::new(), Vec::new());
        let err = TokioProcessLauncher::new().launch(command).await.unwrap_err();
        assert!(matches!(err, ExecutionError::SpawnFailed { .. }));
        assert!(err.to_string().contains("/does/not/exist/kiln"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_does_not_wait_for_child_to_read_stdin() {
        let mut command = WorkerCommand::loader("sleep", OsString::new(), vec![b'x'; 4 * 1024 * 1024]);
        command.args = vec!["30".into()];

        let launched = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            TokioProcessLauncher::new().launch(command),
        )
        .await
        .expect("launch blocked on a child that never reads stdin");

        let mut child = launched.unwrap();
        child.kill().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdin_reaches_the_process() {
        let mut command = WorkerCommand::loader("sh", OsString::new(), b"descriptor".to_vec());
        command.args = vec!["-c".into(), "test \"$(cat)\" = descriptor".into()];

        let mut child = TokioProcessLauncher::new().launch(command).await.unwrap();
        assert!(child.wait().await.unwrap().success());
    }
}
