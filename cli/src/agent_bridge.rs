use std::process::Stdio;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use anyhow::Context;
use attache_protocol::AgentEvent;
use attache_protocol::AgentNotification;
use attache_protocol::EventLogSnapshot;
use attache_protocol::ExecutionSnapshot;
use attache_protocol::Op;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::process::Child;
use tokio::process::ChildStderr;
use tokio::process::ChildStdin;
use tokio::process::ChildStdout;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::sync::watch;

use crate::startup::ResolvedAgent;

const STDERR_LIMIT_BYTES: usize = 32 * 1024;

/// Connection to the agent subprocess.
///
/// The agent speaks JSON lines on its stdio: [`AgentNotification`]s out,
/// [`Op`]s in. Notifications are folded into two `watch` streams, and an
/// `agent.stopped` event is synthesized when the child exits without
/// reporting one itself.
pub struct AgentBridge {
    pub exec_rx: watch::Receiver<ExecutionSnapshot>,
    pub log_rx: watch::Receiver<EventLogSnapshot>,
    pub op_tx: mpsc::UnboundedSender<Op>,
}

impl AgentBridge {
    pub fn spawn(agent: &ResolvedAgent) -> anyhow::Result<Self> {
        let (child, stdin, stdout, stderr) = spawn_agent(agent)?;
        let (exec_tx, exec_rx) = watch::channel(ExecutionSnapshot::default());
        let (log_tx, log_rx) = watch::channel(EventLogSnapshot::default());
        let (op_tx, op_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_bridge(
            child, stdin, stdout, stderr, op_rx, exec_tx, log_tx,
        ));

        Ok(Self {
            exec_rx,
            log_rx,
            op_tx,
        })
    }
}

fn spawn_agent(
    agent: &ResolvedAgent,
) -> anyhow::Result<(Child, ChildStdin, ChildStdout, ChildStderr)> {
    let mut cmd = Command::new(&agent.program);
    cmd.args(&agent.args);
    cmd.kill_on_drop(true);

    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to start `{}`", agent.program))?;

    let stdin = child.stdin.take().context("agent stdin unavailable")?;
    let stdout = child.stdout.take().context("agent stdout unavailable")?;
    let stderr = child.stderr.take().context("agent stderr unavailable")?;
    Ok((child, stdin, stdout, stderr))
}

async fn run_bridge(
    mut child: Child,
    mut stdin: ChildStdin,
    stdout: ChildStdout,
    stderr: ChildStderr,
    mut op_rx: mpsc::UnboundedReceiver<Op>,
    exec_tx: watch::Sender<ExecutionSnapshot>,
    log_tx: watch::Sender<EventLogSnapshot>,
) {
    let stderr_capture = Arc::new(Mutex::new(Vec::<u8>::new()));
    let stderr_truncated = Arc::new(AtomicBool::new(false));
    let stderr_task = {
        let stderr_capture = stderr_capture.clone();
        let stderr_truncated = stderr_truncated.clone();
        tokio::spawn(capture_stderr(stderr, stderr_capture, stderr_truncated))
    };

    let mut lines = BufReader::new(stdout).lines();
    let mut console_gone = false;

    loop {
        tokio::select! {
            maybe_op = op_rx.recv() => {
                let Some(op) = maybe_op else {
                    console_gone = true;
                    break;
                };
                match serde_json::to_string(&op) {
                    Ok(mut line) => {
                        line.push('\n');
                        if stdin.write_all(line.as_bytes()).await.is_err() {
                            tracing::warn!("agent stdin closed; dropping submission");
                        }
                    }
                    Err(err) => tracing::warn!(error = %err, "failed to encode submission"),
                }
            }

            maybe_line = lines.next_line() => {
                match maybe_line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<AgentNotification>(&line) {
                            Ok(notification) => {
                                apply_notification(notification, &exec_tx, &log_tx);
                            }
                            Err(err) => {
                                tracing::warn!(error = %err, "unparseable agent line");
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(error = %err, "agent stdout read failed");
                        break;
                    }
                }
            }
        }
    }

    drop(stdin);
    if console_gone {
        let _ = child.start_kill();
    }
    let status = child.wait().await;
    let _ = stderr_task.await;

    let stderr_tail = {
        let capture = match stderr_capture.lock() {
            Ok(guard) => guard,
            Err(err) => err.into_inner(),
        };
        String::from_utf8_lossy(&capture)
            .trim_end_matches(['\n', '\r'])
            .to_string()
    };
    let message = stop_message(
        &status,
        &stderr_tail,
        stderr_truncated.load(Ordering::Relaxed),
    );
    append_stop_event(&log_tx, message);
}

/// Fold one parsed notification into the state streams.
pub(crate) fn apply_notification(
    notification: AgentNotification,
    exec_tx: &watch::Sender<ExecutionSnapshot>,
    log_tx: &watch::Sender<EventLogSnapshot>,
) {
    match notification {
        AgentNotification::ExecutionState(snapshot) => {
            let _ = exec_tx.send(snapshot);
        }
        AgentNotification::Event { event } => {
            log_tx.send_modify(|log| log.events.push(event));
        }
    }
}

/// Append a synthesized `agent.stopped` unless the agent already reported
/// one itself.
pub(crate) fn append_stop_event(log_tx: &watch::Sender<EventLogSnapshot>, message: String) {
    log_tx.send_modify(|log| {
        let already_stopped = log
            .events
            .iter()
            .any(|event| matches!(event, AgentEvent::AgentStopped { .. }));
        if !already_stopped {
            log.events.push(AgentEvent::AgentStopped { message });
        }
    });
}

fn stop_message(
    status: &std::io::Result<std::process::ExitStatus>,
    stderr_tail: &str,
    stderr_truncated: bool,
) -> String {
    let mut message = match status {
        Ok(status) if status.success() => String::new(),
        Ok(status) => format!("agent exited with {status}"),
        Err(err) => format!("failed to reap agent process: {err}"),
    };
    if !stderr_tail.is_empty() {
        if !message.is_empty() {
            message.push('\n');
        }
        message.push_str("agent stderr:\n");
        message.push_str(stderr_tail);
        if stderr_truncated {
            message.push_str("\n[stderr truncated]");
        }
    }
    message
}

async fn capture_stderr(
    mut stderr: ChildStderr,
    capture: Arc<Mutex<Vec<u8>>>,
    truncated: Arc<AtomicBool>,
) {
    let mut buf = [0u8; 4096];
    loop {
        let n = match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };

        let mut capture = match capture.lock() {
            Ok(guard) => guard,
            Err(err) => err.into_inner(),
        };
        let remaining = STDERR_LIMIT_BYTES.saturating_sub(capture.len());
        if remaining == 0 {
            truncated.store(true, Ordering::Relaxed);
            continue;
        }
        let take = remaining.min(n);
        capture.extend_from_slice(&buf[..take]);
        if take < n {
            truncated.store(true, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn channels() -> (
        watch::Sender<ExecutionSnapshot>,
        watch::Receiver<ExecutionSnapshot>,
        watch::Sender<EventLogSnapshot>,
        watch::Receiver<EventLogSnapshot>,
    ) {
        let (exec_tx, exec_rx) = watch::channel(ExecutionSnapshot::default());
        let (log_tx, log_rx) = watch::channel(EventLogSnapshot::default());
        (exec_tx, exec_rx, log_tx, log_rx)
    }

    #[test]
    fn execution_state_lines_replace_the_snapshot() {
        let (exec_tx, exec_rx, log_tx, log_rx) = channels();
        let line = r#"{"type":"execution_state","idle":true,"busy_with":null}"#;
        let parsed: AgentNotification = serde_json::from_str(line).expect("parse");

        apply_notification(parsed, &exec_tx, &log_tx);

        assert!(exec_rx.borrow().idle);
        assert!(log_rx.borrow().events.is_empty());
    }

    #[test]
    fn event_lines_append_to_the_log() {
        let (exec_tx, _exec_rx, log_tx, log_rx) = channels();
        let lines = [
            r#"{"type":"event","event":{"type":"output.chat","message":"hi"}}"#,
            r#"{"type":"event","event":{"type":"output.info","message":"fyi"}}"#,
        ];

        for line in lines {
            let parsed: AgentNotification = serde_json::from_str(line).expect("parse");
            apply_notification(parsed, &exec_tx, &log_tx);
        }

        let log = log_rx.borrow();
        assert_eq!(log.events.len(), 2);
        assert_eq!(
            log.events[0],
            AgentEvent::ChatOutput {
                message: "hi".to_string()
            }
        );
        assert_eq!(
            log.events[1],
            AgentEvent::InfoOutput {
                message: "fyi".to_string()
            }
        );
    }

    #[test]
    fn synthesized_stop_is_skipped_when_the_agent_reported_one() {
        let (exec_tx, _exec_rx, log_tx, log_rx) = channels();
        apply_notification(
            AgentNotification::Event {
                event: AgentEvent::AgentStopped {
                    message: "done".to_string(),
                },
            },
            &exec_tx,
            &log_tx,
        );

        append_stop_event(&log_tx, String::new());

        let stops = log_rx
            .borrow()
            .events
            .iter()
            .filter(|event| matches!(event, AgentEvent::AgentStopped { .. }))
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn stop_message_includes_stderr_tail() {
        let status: std::io::Result<std::process::ExitStatus> =
            Err(std::io::Error::other("gone"));
        let message = stop_message(&status, "boom", true);

        assert!(message.contains("gone"));
        assert!(message.contains("agent stderr:\nboom"));
        assert!(message.ends_with("[stderr truncated]"));
    }
}
