//! End-to-end tests for the command server over real TCP connections.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sendcmd_common::protocol::{CommandBatch, ErrorKind};
use sendcmd_common::transport::TcpTransport;
use sendcmd_server::{CommandServer, ExecOutcome, ExecRequest, ProcessExecutor, ServerConfig};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// `sleep <ms>` waits without spawning anything; `fail` exits 1.
struct FakeShell;

impl ProcessExecutor for FakeShell {
    async fn execute(&self, request: ExecRequest<'_>) -> ExecOutcome {
        if let Some(ms) = request.command.strip_prefix("sleep ") {
            let ms: u64 = ms.parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            return ExecOutcome::Success;
        }
        if request.command == "fail" {
            return ExecOutcome::Failed { code: Some(1) };
        }
        ExecOutcome::Success
    }
}

async fn start_server() -> (String, tokio::task::JoinHandle<sendcmd_common::Result<()>>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig::new()
        .with_bind_addr("127.0.0.1:0")
        .with_working_dir(dir.path())
        .with_command_timeout(Duration::from_secs(5));

    let server = CommandServer::with_executor(config, Arc::new(FakeShell)).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let handle = tokio::spawn(server.run());
    (addr, handle, dir)
}

async fn send(addr: &str, commands: &[&str]) -> sendcmd_common::protocol::SessionResult {
    let transport = TcpTransport::new();
    let mut stream = transport.connect(addr).await.unwrap();
    transport
        .send_batch(&mut stream, &CommandBatch::new(commands.iter().copied()))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_batch_results_come_back() {
    let (addr, handle, _dir) = start_server().await;

    let result = send(&addr, &["ok", "fail", "cd does-not-exist", "ok"]).await;

    let kinds: Vec<_> = result.errors.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![ErrorKind::NonZeroExit, ErrorKind::InvalidDirective]);
    assert!(!result.exit_requested);

    handle.abort();
}

#[tokio::test]
async fn test_exit_responds_then_stops_server() {
    let (addr, handle, _dir) = start_server().await;

    let result = send(&addr, &["ok", "exit", "fail"]).await;
    assert!(result.exit_requested);
    assert!(result.errors.is_empty());

    let stopped = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server kept running after exit");
    assert!(stopped.unwrap().is_ok());

    assert!(TcpStream::connect(&addr).await.is_err());
}

#[tokio::test]
async fn test_exit_lets_running_sessions_finish() {
    let (addr, handle, _dir) = start_server().await;

    let slow_addr = addr.clone();
    let slow = tokio::spawn(async move { send(&slow_addr, &["sleep 600", "fail"]).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(send(&addr, &["exit"]).await.exit_requested);

    let slow_result = tokio::time::timeout(Duration::from_secs(5), slow)
        .await
        .expect("running session never answered")
        .unwrap();
    assert_eq!(slow_result.errors.len(), 1);
    assert_eq!(slow_result.errors[0].kind, ErrorKind::NonZeroExit);

    let stopped = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server kept running after draining");
    assert!(stopped.unwrap().is_ok());
}

#[tokio::test]
async fn test_slow_session_does_not_block_others() {
    let (addr, handle, _dir) = start_server().await;

    let slow_addr = addr.clone();
    let slow = tokio::spawn(async move { send(&slow_addr, &["sleep 1500"]).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    let fast = send(&addr, &["ok"]).await;
    assert!(fast.is_clean());
    assert!(started.elapsed() < Duration::from_millis(1000));

    assert!(slow.await.unwrap().is_clean());
    handle.abort();
}

#[tokio::test]
async fn test_garbage_connection_does_not_affect_server() {
    let (addr, handle, _dir) = start_server().await;

    let mut garbage = TcpStream::connect(&addr).await.unwrap();
    garbage.write_all(&[0, 0, 0, 3, b'x', b'y', b'z']).await.unwrap();
    drop(garbage);

    let mut truncated = TcpStream::connect(&addr).await.unwrap();
    truncated.write_all(&[0, 0]).await.unwrap();
    drop(truncated);

    let result = send(&addr, &["ok"]).await;
    assert!(result.is_clean());
    handle.abort();
}

#[tokio::test]
async fn test_shutdown_handle_stops_server() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig::new()
        .with_bind_addr("127.0.0.1:0")
        .with_working_dir(dir.path());
    let server = CommandServer::with_executor(config, Arc::new(FakeShell)).await.unwrap();
    let shutdown = server.shutdown_handle();

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), server.run())
        .await
        .expect("shutdown was lost");
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let config = ServerConfig::new()
        .with_bind_addr("127.0.0.1:0")
        .with_command_timeout(Duration::ZERO);
    assert!(CommandServer::with_executor(config, Arc::new(FakeShell)).await.is_err());
}

#[tokio::test]
async fn test_session_cap_still_serves_sequentially() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig::new()
        .with_bind_addr("127.0.0.1:0")
        .with_working_dir(dir.path())
        .with_max_sessions(1);
    let server = CommandServer::with_executor(config, Arc::new(FakeShell)).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    let handle = tokio::spawn(server.run());

    for _ in 0..3 {
        assert!(send(&addr, &["ok"]).await.is_clean());
    }
    handle.abort();
}
