//! JSON-RPC subprocess transport.
//!
//! Spawns an MCP server as a child process and speaks newline-delimited
//! JSON-RPC 2.0 over its stdio: one JSON object per line on stdin and
//! stdout, stderr captured for diagnostics.
//!
//! Requests may be issued as soon as [`JsonRpcSubprocess::spawn`] returns;
//! they are queued and written in FIFO order once the process is up. Each
//! request is correlated to its response by a monotonically increasing
//! numeric id and settles exactly once: with the response, a per-request
//! timeout, or a process-level failure (spawn error, kill, exit).

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, trace, warn};

use mcp_rig_protocol::jsonrpc::{JsonRpcNotification, JsonRpcRequest};
use mcp_rig_protocol::validate;

use crate::error::{McpError, Result};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(15_000);

/// How many recent stdout/stderr lines are kept for diagnostics.
const MAX_OUTPUT_LINES: usize = 100;

/// Options for spawning the server process.
#[derive(Debug, Clone, Default)]
pub struct SpawnOptions {
    /// Extra environment variables for the child.
    pub env: Vec<(String, String)>,
    /// Working directory for the child.
    pub cwd: Option<PathBuf>,
}

/// Events surfaced by the transport.
///
/// Delivered to the registered handler inline from the I/O tasks, in
/// stream order: a fault observed on one line is recorded before a later
/// line settles a request. Events with no handler registered are dropped.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// The child process spawned successfully.
    Started,
    /// A line arrived on stdout.
    Stdout(String),
    /// A line arrived on stderr.
    Stderr(String),
    /// A stdout line that is not valid JSON.
    NonJsonLine(String),
    /// Traffic that violates the JSON-RPC protocol.
    ProtocolViolation(String),
    /// A JSON-RPC request or notification initiated by the server.
    ServerMessage(Value),
    /// The child process exited.
    Exit {
        /// Exit code, when the process exited normally.
        code: Option<i32>,
        /// Signal number, when the process was terminated by a signal.
        signal: Option<i32>,
    },
}

/// Exit details of the child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, when the process exited normally.
    pub code: Option<i32>,
    /// Signal number, when the process was terminated by a signal.
    pub signal: Option<i32>,
}

#[derive(Debug, Clone)]
enum StartState {
    Idle,
    Requested,
    Started,
    Failed(String),
}

enum WriterMsg {
    Frame { id: Option<i64>, line: String },
    CloseStdin,
}

struct PendingRequest {
    method: String,
    tx: oneshot::Sender<Result<Value>>,
}

type EventHandler = Arc<dyn Fn(ProcessEvent) + Send + Sync>;

struct Inner {
    spawn_requested: AtomicBool,
    next_id: AtomicI64,
    request_timeout: Duration,
    pending: Mutex<HashMap<i64, PendingRequest>>,
    writer_tx: mpsc::UnboundedSender<WriterMsg>,
    writer_rx: Mutex<Option<mpsc::UnboundedReceiver<WriterMsg>>>,
    start_tx: watch::Sender<StartState>,
    start_rx: watch::Receiver<StartState>,
    exit_tx: watch::Sender<Option<ExitInfo>>,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
    kill_tx: watch::Sender<bool>,
    kill_rx: watch::Receiver<bool>,
    handler: Mutex<Option<EventHandler>>,
    stdout_lines: Mutex<VecDeque<String>>,
    stderr_lines: Mutex<VecDeque<String>>,
}

/// A JSON-RPC 2.0 connection to a child process over stdio.
#[derive(Clone)]
pub struct JsonRpcSubprocess {
    inner: Arc<Inner>,
}

impl Default for JsonRpcSubprocess {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonRpcSubprocess {
    /// Create a transport with the default request timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a transport with a custom per-request timeout.
    pub fn with_timeout(request_timeout: Duration) -> Self {
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let (start_tx, start_rx) = watch::channel(StartState::Idle);
        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                spawn_requested: AtomicBool::new(false),
                next_id: AtomicI64::new(1),
                request_timeout,
                pending: Mutex::new(HashMap::new()),
                writer_tx,
                writer_rx: Mutex::new(Some(writer_rx)),
                start_tx,
                start_rx,
                exit_tx,
                exit_rx,
                kill_tx,
                kill_rx,
                handler: Mutex::new(None),
                stdout_lines: Mutex::new(VecDeque::new()),
                stderr_lines: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Register the event handler. Replaces any previous handler.
    ///
    /// The handler runs inline on the transport's I/O tasks and must not
    /// block.
    pub fn set_event_handler<F>(&self, handler: F)
    where
        F: Fn(ProcessEvent) + Send + Sync + 'static,
    {
        *self.inner.handler.lock() = Some(Arc::new(handler));
    }

    /// Spawn the server process. May be called at most once.
    ///
    /// Must run inside a Tokio runtime: the process I/O is driven by
    /// background tasks. Requests issued before the spawn completes are
    /// queued and flushed in order.
    pub fn spawn(
        &self,
        command: impl Into<String>,
        args: Vec<String>,
        options: SpawnOptions,
    ) -> Result<()> {
        if self.inner.spawn_requested.swap(true, Ordering::SeqCst) {
            return Err(McpError::AlreadySpawned);
        }
        let command = command.into();
        self.inner.start_tx.send_replace(StartState::Requested);
        debug!(command = %command, "spawning mcp server process");
        tokio::spawn(launch(Arc::downgrade(&self.inner), command, args, options));
        Ok(())
    }

    /// Send a request and wait for its response.
    ///
    /// Fails with the transport's timeout when no response arrives in
    /// time, and with a process-level error when the server cannot be
    /// spawned, was killed, or exited non-zero while the request was in
    /// flight.
    pub async fn send_request(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> Result<Value> {
        let method = method.into();
        if !self.inner.spawn_requested.load(Ordering::SeqCst) {
            return Err(McpError::NotStarted);
        }
        if let StartState::Failed(message) = &*self.inner.start_rx.borrow() {
            return Err(McpError::SpawnFailed(message.clone()));
        }
        if let Some(info) = self.inner.failed_exit() {
            return Err(self.inner.exit_error(info, &method));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(id, method.clone(), params);
        let line = serde_json::to_string(&request)?;
        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(
            id,
            PendingRequest {
                method: method.clone(),
                tx,
            },
        );
        trace!(id, method = %method, "request enqueued");
        if self
            .inner
            .writer_tx
            .send(WriterMsg::Frame {
                id: Some(id),
                line,
            })
            .is_err()
        {
            self.inner.pending.lock().remove(&id);
            return Err(McpError::transport("writer task is gone"));
        }
        // The exit watcher only rejects entries it can see. An exit that
        // landed between the check above and the insert would miss this
        // one, so look again now that the entry is in the map.
        if let Some(info) = self.inner.failed_exit() {
            if self.inner.pending.lock().remove(&id).is_some() {
                return Err(self.inner.exit_error(info, &method));
            }
        }

        match tokio::time::timeout(self.inner.request_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                self.inner.pending.lock().remove(&id);
                Err(McpError::transport(format!(
                    "request channel closed for method: {method}"
                )))
            }
            Err(_) => {
                self.inner.pending.lock().remove(&id);
                debug!(
                    id,
                    method = %method,
                    timeout_ms = self.inner.request_timeout.as_millis() as u64,
                    "request timed out"
                );
                Err(McpError::RequestTimeout(method))
            }
        }
    }

    /// Send a notification (no response expected).
    ///
    /// Before `spawn` this is an error; after `spawn` but before the
    /// process is confirmed up, the notification is dropped. Requests
    /// queue across that window, notifications do not.
    pub fn send_notification(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> Result<()> {
        let method = method.into();
        if !self.inner.spawn_requested.load(Ordering::SeqCst) {
            return Err(McpError::NotStarted);
        }
        if !matches!(*self.inner.start_rx.borrow(), StartState::Started) {
            debug!(method = %method, "notification dropped before spawn confirmation");
            return Ok(());
        }
        let note = JsonRpcNotification::new(method, params);
        let line = serde_json::to_string(&note)?;
        let _ = self
            .inner
            .writer_tx
            .send(WriterMsg::Frame { id: None, line });
        Ok(())
    }

    /// Close the child's stdin, signalling a graceful shutdown.
    pub fn close_stdin(&self) {
        let _ = self.inner.writer_tx.send(WriterMsg::CloseStdin);
    }

    /// Kill the child process. Idempotent.
    ///
    /// Every pending request is rejected immediately; the process is
    /// reaped in the background.
    pub fn kill(&self) {
        if self.inner.kill_tx.send_replace(true) {
            return;
        }
        debug!("kill requested for mcp server process");
        let _ = self.inner.writer_tx.send(WriterMsg::CloseStdin);
        self.inner
            .reject_all_pending(|method| McpError::Killed(method.to_string()));
    }

    /// Wait until the process is confirmed up (or failed to spawn).
    pub async fn wait_for_start(&self) -> Result<()> {
        if !self.inner.spawn_requested.load(Ordering::SeqCst) {
            return Err(McpError::NotStarted);
        }
        let mut rx = self.inner.start_rx.clone();
        let outcome = rx
            .wait_for(|state| matches!(state, StartState::Started | StartState::Failed(_)))
            .await;
        match outcome {
            Ok(state) => match &*state {
                StartState::Failed(message) => Err(McpError::SpawnFailed(message.clone())),
                _ => Ok(()),
            },
            Err(_) => Err(McpError::transport("transport closed before start")),
        }
    }

    /// Wait until the process exits; resolves the exit code, 0 when the
    /// process was terminated by a signal. Resolves immediately if the
    /// process already exited.
    pub async fn wait_for_exit(&self) -> Result<i32> {
        if !self.inner.spawn_requested.load(Ordering::SeqCst) {
            return Err(McpError::NotStarted);
        }
        let mut rx = self.inner.exit_rx.clone();
        match rx.wait_for(|info| info.is_some()).await {
            Ok(info) => Ok(info.and_then(|info| info.code).unwrap_or(0)),
            Err(_) => Err(McpError::transport("transport closed before exit")),
        }
    }

    /// Exit details, if the process has exited.
    pub fn exit_info(&self) -> Option<ExitInfo> {
        *self.inner.exit_rx.borrow()
    }

    /// Exit code, if the process has exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_info().and_then(|info| info.code)
    }

    /// Whether the process has exited.
    pub fn has_exited(&self) -> bool {
        self.exit_info().is_some()
    }

    /// Whether the process is confirmed up and has not exited.
    pub fn is_running(&self) -> bool {
        matches!(*self.inner.start_rx.borrow(), StartState::Started) && !self.has_exited()
    }

    /// Recent stdout lines (including non-JSON ones), oldest first.
    pub fn stdout_lines(&self) -> Vec<String> {
        self.inner.snapshot(&self.inner.stdout_lines)
    }

    /// Recent stderr lines, oldest first.
    pub fn stderr_lines(&self) -> Vec<String> {
        self.inner.snapshot(&self.inner.stderr_lines)
    }
}

impl Inner {
    fn emit(&self, event: ProcessEvent) {
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    fn reject_all_pending<F>(&self, make: F)
    where
        F: Fn(&str) -> McpError,
    {
        let drained: Vec<PendingRequest> = {
            let mut pending = self.pending.lock();
            pending.drain().map(|(_, entry)| entry).collect()
        };
        for entry in drained {
            let _ = entry.tx.send(Err(make(&entry.method)));
        }
    }

    fn fail_start(&self, message: String) {
        self.start_tx.send_replace(StartState::Failed(message.clone()));
        self.reject_all_pending(|_| McpError::SpawnFailed(message.clone()));
    }

    fn push_line(&self, buffer: &Mutex<VecDeque<String>>, line: &str) {
        let mut buffer = buffer.lock();
        if buffer.len() == MAX_OUTPUT_LINES {
            buffer.pop_front();
        }
        buffer.push_back(line.to_string());
    }

    fn snapshot(&self, buffer: &Mutex<VecDeque<String>>) -> Vec<String> {
        buffer.lock().iter().cloned().collect()
    }

    /// Exit info if the process has exited with a non-zero code. Clean and
    /// signal-terminated exits do not count as failures here.
    fn failed_exit(&self) -> Option<ExitInfo> {
        let info = (*self.exit_rx.borrow())?;
        matches!(info.code, Some(code) if code != 0).then_some(info)
    }

    fn exit_error(&self, info: ExitInfo, method: &str) -> McpError {
        let stdout = self.snapshot(&self.stdout_lines);
        let stderr = self.snapshot(&self.stderr_lines);
        McpError::process_exited(info.code, info.signal, method, &stdout, &stderr)
    }

    fn handle_stdout_line(&self, line: String) {
        if line.trim().is_empty() {
            return;
        }
        self.push_line(&self.stdout_lines, &line);
        self.emit(ProcessEvent::Stdout(line.clone()));

        let value: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(_) => {
                trace!(line = %line, "non-JSON stdout line");
                self.emit(ProcessEvent::NonJsonLine(line));
                return;
            }
        };
        if value.get("method").is_some() {
            debug!("received server-initiated message");
            self.emit(ProcessEvent::ServerMessage(value));
            return;
        }
        if let Err(err) = validate::response_envelope(&value) {
            self.emit(ProcessEvent::ProtocolViolation(format!(
                "Received invalid JSON-RPC message: {}",
                err.detail
            )));
        }
        self.handle_response(value);
    }

    fn handle_response(&self, value: Value) {
        let entry = value
            .get("id")
            .and_then(Value::as_i64)
            .and_then(|id| self.pending.lock().remove(&id).map(|entry| (id, entry)));
        let Some((id, pending)) = entry else {
            self.emit(ProcessEvent::ProtocolViolation(
                "Received a response that does not match any pending request".to_string(),
            ));
            return;
        };

        let outcome = if let Some(error) = value.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            debug!(id, method = %pending.method, code, "request failed");
            Err(McpError::rpc(&pending.method, code, message))
        } else {
            trace!(id, method = %pending.method, "request settled");
            Ok(value.get("result").cloned().unwrap_or(Value::Null))
        };
        let _ = pending.tx.send(outcome);
    }

    fn handle_stderr_line(&self, line: String) {
        trace!(line = %line, "stderr line");
        self.push_line(&self.stderr_lines, &line);
        self.emit(ProcessEvent::Stderr(line));
    }

    fn handle_exit(&self, code: Option<i32>, signal: Option<i32>) {
        debug!(?code, ?signal, "mcp server process exited");
        self.exit_tx.send_replace(Some(ExitInfo { code, signal }));
        let _ = self.writer_tx.send(WriterMsg::CloseStdin);
        self.emit(ProcessEvent::Exit { code, signal });

        if matches!(code, Some(code) if code != 0) {
            let stdout = self.snapshot(&self.stdout_lines);
            let stderr = self.snapshot(&self.stderr_lines);
            self.reject_all_pending(|method| {
                McpError::process_exited(code, signal, method, &stdout, &stderr)
            });
        }
        // Clean and signal-terminated exits leave pending requests to
        // their timeouts; kill() rejects the requests it interrupted.
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.kill_tx.send_replace(true);
    }
}

async fn launch(inner: Weak<Inner>, command: String, args: Vec<String>, options: SpawnOptions) {
    let Some(strong) = inner.upgrade() else {
        return;
    };

    let mut cmd = Command::new(&command);
    cmd.args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in &options.env {
        cmd.env(key, value);
    }
    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!(command = %command, error = %err, "failed to spawn mcp server process");
            strong.fail_start(format!("Failed to spawn process: {err}"));
            return;
        }
    };

    let (Some(stdin), Some(stdout), Some(stderr)) =
        (child.stdin.take(), child.stdout.take(), child.stderr.take())
    else {
        strong.fail_start("Failed to spawn process: stdio pipes unavailable".to_string());
        return;
    };
    let Some(writer_rx) = strong.writer_rx.lock().take() else {
        return;
    };

    debug!(command = %command, pid = ?child.id(), "mcp server process spawned");
    tokio::spawn(write_loop(inner.clone(), stdin, writer_rx));
    tokio::spawn(read_stdout(inner.clone(), stdout));
    tokio::spawn(read_stderr(inner.clone(), stderr));
    tokio::spawn(watch_child(inner.clone(), child));

    strong.start_tx.send_replace(StartState::Started);
    strong.emit(ProcessEvent::Started);
}

async fn write_loop(
    inner: Weak<Inner>,
    stdin: ChildStdin,
    mut rx: mpsc::UnboundedReceiver<WriterMsg>,
) {
    let mut stdin = Some(stdin);
    while let Some(msg) = rx.recv().await {
        match msg {
            WriterMsg::Frame { id, mut line } => {
                let Some(out) = stdin.as_mut() else {
                    if let (Some(id), Some(strong)) = (id, inner.upgrade()) {
                        // Stdin may be gone because the process died; a
                        // failed exit is the better error for the caller.
                        let entry = strong.pending.lock().remove(&id);
                        if let Some(entry) = entry {
                            let reason = match strong.failed_exit() {
                                Some(info) => strong.exit_error(info, &entry.method),
                                None => McpError::transport("stdin is closed"),
                            };
                            let _ = entry.tx.send(Err(reason));
                        }
                    }
                    continue;
                };
                line.push('\n');
                let failed = match out.write_all(line.as_bytes()).await {
                    Ok(()) => out.flush().await.err(),
                    Err(err) => Some(err),
                };
                if let Some(err) = failed {
                    // Exit handling or the request timeout settles the
                    // affected request; a write failure on its own does not.
                    warn!(?id, error = %err, "failed to write frame to child stdin");
                }
            }
            WriterMsg::CloseStdin => {
                debug!("closing child stdin");
                stdin = None;
            }
        }
    }
}

async fn read_stdout(inner: Weak<Inner>, stdout: ChildStdout) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(strong) = inner.upgrade() else {
                    return;
                };
                strong.handle_stdout_line(line);
            }
            Ok(None) => {
                debug!("child stdout closed");
                return;
            }
            Err(err) => {
                warn!(error = %err, "failed to read child stdout");
                return;
            }
        }
    }
}

async fn read_stderr(inner: Weak<Inner>, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(strong) = inner.upgrade() else {
                    return;
                };
                strong.handle_stderr_line(line);
            }
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "failed to read child stderr");
                return;
            }
        }
    }
}

async fn watch_child(inner: Weak<Inner>, mut child: Child) {
    let mut kill_rx = match inner.upgrade() {
        Some(strong) => strong.kill_rx.clone(),
        None => return,
    };

    let status = tokio::select! {
        status = child.wait() => status,
        _ = async { let _ = kill_rx.wait_for(|killed| *killed).await; } => {
            debug!("killing mcp server process");
            if let Err(err) = child.start_kill() {
                warn!(error = %err, "failed to kill mcp server process");
            }
            child.wait().await
        }
    };

    let (code, signal) = match status {
        Ok(status) => {
            #[cfg(unix)]
            let signal = std::os::unix::process::ExitStatusExt::signal(&status);
            #[cfg(not(unix))]
            let signal = None;
            (status.code(), signal)
        }
        Err(err) => {
            warn!(error = %err, "failed to await mcp server process exit");
            (None, None)
        }
    };
    if let Some(strong) = inner.upgrade() {
        strong.handle_exit(code, signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_request_before_spawn_fails() {
        let transport = JsonRpcSubprocess::new();
        let err = transport.send_request("ping", None).await.unwrap_err();
        assert_eq!(err.to_string(), "Subprocess not started");
    }

    #[tokio::test]
    async fn test_notification_before_spawn_fails() {
        let transport = JsonRpcSubprocess::new();
        let err = transport
            .send_notification("notifications/initialized", None)
            .unwrap_err();
        assert!(matches!(err, McpError::NotStarted));
    }

    #[tokio::test]
    async fn test_wait_for_start_before_spawn_fails() {
        let transport = JsonRpcSubprocess::new();
        let err = transport.wait_for_start().await.unwrap_err();
        assert!(matches!(err, McpError::NotStarted));
    }

    #[tokio::test]
    async fn test_spawn_twice_fails() {
        let transport = JsonRpcSubprocess::new();
        transport
            .spawn("definitely-not-a-real-binary-mcp", Vec::new(), SpawnOptions::default())
            .unwrap();
        let err = transport
            .spawn("sh", Vec::new(), SpawnOptions::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "Subprocess already spawned");
    }

    #[tokio::test]
    async fn test_spawn_nonexistent_command_fails_start() {
        let transport = JsonRpcSubprocess::new();
        transport
            .spawn("definitely-not-a-real-binary-mcp", Vec::new(), SpawnOptions::default())
            .unwrap();
        let err = transport.wait_for_start().await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to spawn process:"));

        // Requests after a failed spawn fail fast with the same reason.
        let err = transport.send_request("ping", None).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to spawn process:"));
    }

    #[tokio::test]
    async fn test_request_enqueued_before_failed_spawn_is_rejected() {
        let transport = JsonRpcSubprocess::with_timeout(Duration::from_secs(5));
        transport
            .spawn("definitely-not-a-real-binary-mcp", Vec::new(), SpawnOptions::default())
            .unwrap();
        let err = transport.send_request("initialize", None).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to spawn process:"));
    }

    #[tokio::test]
    async fn test_kill_is_idempotent() {
        let transport = JsonRpcSubprocess::new();
        transport
            .spawn(
                "sh",
                vec!["-c".to_string(), "sleep 30".to_string()],
                SpawnOptions::default(),
            )
            .unwrap();
        transport.wait_for_start().await.unwrap();
        transport.kill();
        transport.kill();
        let code = transport.wait_for_exit().await.unwrap();
        assert_eq!(code, 0);
        assert!(transport.has_exited());
    }
}
