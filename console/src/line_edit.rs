use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::abort::AbortKind;
use crate::abort::AbortScope;

/// How a line-edit operation can fail.
#[derive(Debug, thiserror::Error)]
pub enum LineEditError {
    /// The abort token fired while the operator had typed something. The
    /// buffered text is carried along so a re-issued prompt can restore it.
    #[error("line edit interrupted mid-entry")]
    Interrupted { partial: String },

    /// The abort token fired with nothing typed, or the operator dismissed
    /// the prompt.
    #[error("line edit cancelled")]
    Cancelled,

    #[error("line editor failed: {0}")]
    Failed(String),
}

/// One "collect a line from the terminal" request, served by the external
/// line-editor collaborator task.
#[derive(Debug)]
pub struct LineEditRequest {
    /// Text to restore into the buffer (from an interrupted prompt).
    pub prefill: Option<String>,
    /// Known commands offered for completion.
    pub auto_completion: Vec<String>,
    /// Prior commands, oldest first.
    pub history: Vec<String>,
    /// One-shot token scoped to this request only.
    pub cancel: CancellationToken,
    pub reply: oneshot::Sender<Result<String, LineEditError>>,
}

/// What the session should do after a line-edit operation settled.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum InputOutcome {
    /// Hand the line to the agent.
    Submitted(String),
    /// Re-issue the prompt immediately with `partial` restored.
    Retry { partial: String },
    /// Nothing further; the watcher decides whether to prompt again.
    Ended,
}

/// Owns zero-or-one in-flight line-edit operation.
///
/// A new operation is never started while the previous reply is
/// outstanding. Cancellation comes in two flavors: `cancel` (the watcher
/// saw the agent leave idle — the operation is abandoned, replies are
/// dropped) and `interrupt` (a redraw needs the prompt re-issued — the
/// reply is still awaited so a non-empty buffer can be retried).
pub(crate) struct InputLifecycle {
    editor_tx: UnboundedSender<LineEditRequest>,
    in_flight: Option<oneshot::Receiver<Result<String, LineEditError>>>,
}

impl InputLifecycle {
    pub(crate) fn new(editor_tx: UnboundedSender<LineEditRequest>) -> Self {
        Self {
            editor_tx,
            in_flight: None,
        }
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub(crate) fn start(
        &mut self,
        scope: &mut AbortScope,
        prefill: Option<String>,
        auto_completion: Vec<String>,
        history: Vec<String>,
    ) {
        if self.in_flight.is_some() {
            return;
        }
        let cancel = scope.acquire(AbortKind::LineEdit);
        let (reply, reply_rx) = oneshot::channel();
        let request = LineEditRequest {
            prefill,
            auto_completion,
            history,
            cancel,
            reply,
        };
        if self.editor_tx.send(request).is_err() {
            tracing::warn!("line editor collaborator is gone; input collection disabled");
            scope.release(AbortKind::LineEdit);
            return;
        }
        self.in_flight = Some(reply_rx);
    }

    /// Abandon the in-flight operation: fire its token and drop the reply.
    pub(crate) fn cancel(&mut self, scope: &mut AbortScope) {
        if self.in_flight.take().is_some() {
            scope.cancel(AbortKind::LineEdit);
        }
    }

    /// Fire the in-flight token but keep awaiting the reply, so buffered
    /// keystrokes survive the interruption via [`InputOutcome::Retry`].
    pub(crate) fn interrupt(&mut self, scope: &mut AbortScope) {
        if self.in_flight.is_some() {
            scope.cancel(AbortKind::LineEdit);
        }
    }

    /// Resolves when the in-flight operation settles; pending forever when
    /// none is in flight.
    pub(crate) async fn settled(&mut self) -> Option<Result<String, LineEditError>> {
        let result = match &mut self.in_flight {
            Some(reply_rx) => reply_rx.await.ok(),
            None => std::future::pending().await,
        };
        self.in_flight = None;
        result
    }

    /// Map a settled reply to the session's next step, releasing the abort
    /// scope entry.
    pub(crate) fn conclude(
        &mut self,
        scope: &mut AbortScope,
        result: Option<Result<String, LineEditError>>,
    ) -> InputOutcome {
        scope.release(AbortKind::LineEdit);
        match result {
            Some(Ok(line)) => InputOutcome::Submitted(line),
            Some(Err(LineEditError::Interrupted { partial })) if !partial.is_empty() => {
                InputOutcome::Retry { partial }
            }
            Some(Err(LineEditError::Interrupted { .. } | LineEditError::Cancelled)) | None => {
                InputOutcome::Ended
            }
            Some(Err(LineEditError::Failed(message))) => {
                tracing::warn!(error = %message, "line editor failed");
                InputOutcome::Ended
            }
        }
    }
}
