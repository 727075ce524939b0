//! End-to-end tests spawning the `kiln` binary as a worker process

use async_trait::async_trait;
use kiln_core::{module_relative_path, Classpath, IsolationMode, LogLevel, MonotonicIdGenerator};
use kiln_execution::{
    ActionSpec, ExecutionError, Fail, ModuleProbe, ProbeModules, ProcessLauncher, SendMessages,
    TokioProcessLauncher, WorkerCommand, WorkerProcessFactory, EXIT_ACTION_FAILED,
    EXIT_BOOTSTRAP_FAILED,
};
use kiln_ipc::{Message, TcpMessagingServer};
use std::fs;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Child;

fn factory() -> WorkerProcessFactory {
    WorkerProcessFactory::new(
        Arc::new(TcpMessagingServer::new()),
        Arc::new(TokioProcessLauncher::new()),
        Arc::new(MonotonicIdGenerator::new()),
        env!("CARGO_BIN_EXE_kiln"),
    )
    .with_log_level(LogLevel::Warn)
    .with_accept_timeout(Some(Duration::from_secs(30)))
}

fn module_dir(modules: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for module in modules {
        let path = dir.path().join(module_relative_path(module).unwrap());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, module).unwrap();
    }
    dir
}

#[tokio::test]
async fn test_shared_worker_sends_message_and_exits() {
    let factory = factory();
    let mut builder = factory.new_process();
    builder
        .worker(ActionSpec::from_action(&SendMessages::new(["ready"])).unwrap())
        .isolation(IsolationMode::Shared);

    let mut process = builder.build().await.unwrap();
    let connection = process.wait_for_connection().await.unwrap();

    assert_eq!(connection.receive().await.unwrap(), Message::payload("ready").unwrap());
    assert_eq!(connection.receive().await.unwrap(), Message::EndOfStream);

    let status = process.wait_for_stop().await.unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn test_isolated_worker_sees_only_shared_modules() {
    let implementation = module_dir(&["logging.Logger", "kiln.Worker"]);
    let application = module_dir(&["app.Main"]);

    let factory = factory()
        .with_implementation_classpath(Classpath::from_entries([implementation.path().to_path_buf()]));
    let mut builder = factory.new_process();
    builder
        .worker(ActionSpec::from_action(&ProbeModules::new(["logging.Logger", "app.Main", "kiln.Worker"])).unwrap())
        .isolation(IsolationMode::Isolated)
        .application_classpath(Classpath::from_entries([application.path().to_path_buf()]))
        .share_module("logging");

    let mut process = builder.build().await.unwrap();
    let connection = process.wait_for_connection().await.unwrap();

    let mut probes = Vec::new();
    while let Some(probe) = connection.receive_payload::<ModuleProbe>().await.unwrap() {
        probes.push(probe);
    }
    assert!(process.wait_for_stop().await.unwrap().success());
    assert_eq!(probes.len(), 3);

    let logger = &probes[0];
    assert!(logger.identical);
    assert_eq!(logger.application, logger.implementation);

    let main = &probes[1];
    assert_eq!(main.application.as_deref(), Some("application"));
    assert_eq!(main.implementation, None);

    let internal = &probes[2];
    assert_eq!(internal.application, None);
    assert!(internal.implementation.is_some());
}

#[tokio::test]
async fn test_failing_action_sends_end_of_stream_and_exit_code() {
    let factory = factory();
    let mut builder = factory.new_process();
    builder.worker(ActionSpec::from_action(&Fail::new("compilation failed")).unwrap());

    let mut process = builder.build().await.unwrap();
    let connection = process.wait_for_connection().await.unwrap();
    assert_eq!(connection.receive().await.unwrap(), Message::EndOfStream);

    let status = process.wait_for_stop().await.unwrap();
    assert_eq!(status.code(), Some(i32::from(EXIT_ACTION_FAILED)));
}

#[tokio::test]
async fn test_unknown_action_exits_before_connecting() {
    let factory = factory();
    let mut builder = factory.new_process();
    builder.worker(ActionSpec::new("compile", serde_json::Value::Null));

    let mut process = builder.build().await.unwrap();
    let err = process.wait_for_connection().await.unwrap_err();
    assert!(matches!(err, ExecutionError::WorkerExited { .. }));

    let status = process.wait_for_stop().await.unwrap();
    assert_eq!(status.code(), Some(i32::from(EXIT_BOOTSTRAP_FAILED)));
}

/// Counts launches without starting anything
#[derive(Default)]
struct CountingLauncher {
    launches: AtomicUsize,
}

#[async_trait]
impl ProcessLauncher for CountingLauncher {
    async fn launch(&self, command: WorkerCommand) -> Result<Child, ExecutionError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        TokioProcessLauncher::new().launch(command).await
    }
}

#[tokio::test]
async fn test_build_without_action_launches_nothing() {
    let launcher = Arc::new(CountingLauncher::default());
    let factory = WorkerProcessFactory::new(
        Arc::new(TcpMessagingServer::new()),
        launcher.clone(),
        Arc::new(MonotonicIdGenerator::new()),
        env!("CARGO_BIN_EXE_kiln"),
    );

    let err = factory.new_process().build().await.unwrap_err();
    assert!(matches!(err, ExecutionError::NoWorkerAction));
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
}

#[test]
fn test_run_command_prints_worker_payloads() {
    let output = Command::new(env!("CARGO_BIN_EXE_kiln"))
        .args([
            "--log-level",
            "error",
            "run",
            "--action",
            "send-messages",
            "--params",
            r#"{"messages":["ready",{"step":2}]}"#,
        ])
        .env("KILN_WORKER_EXECUTABLE", env!("CARGO_BIN_EXE_kiln"))
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines, vec![r#""ready""#, r#"{"step":2}"#]);
}

#[test]
fn test_run_command_echoes_inputs() {
    let output = Command::new(env!("CARGO_BIN_EXE_kiln"))
        .args([
            "--log-level", "error", "run", "--action", "echo", "--input", "1", "--input", r#""two""#,
        ])
        .env("KILN_WORKER_EXECUTABLE", env!("CARGO_BIN_EXE_kiln"))
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec!["1", r#""two""#]);
}

#[tokio::test]
async fn test_run_command_echo_without_inputs_finishes() {
    let mut command = tokio::process::Command::new(env!("CARGO_BIN_EXE_kiln"));
    command
        .args(["--log-level", "error", "run", "--action", "echo"])
        .env("KILN_WORKER_EXECUTABLE", env!("CARGO_BIN_EXE_kiln"))
        .kill_on_drop(true);

    let output = tokio::time::timeout(Duration::from_secs(30), command.output())
        .await
        .expect("kiln run --action echo did not finish")
        .unwrap();

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_run_command_reports_action_failure() {
    let output = Command::new(env!("CARGO_BIN_EXE_kiln"))
        .args([
            "--log-level",
            "error",
            "run",
            "--action",
            "fail",
            "--params",
            r#"{"message":"broken"}"#,
        ])
        .env("KILN_WORKER_EXECUTABLE", env!("CARGO_BIN_EXE_kiln"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(i32::from(EXIT_ACTION_FAILED)));
}
