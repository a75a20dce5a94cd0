use attache_protocol::Answer;
use attache_protocol::QuestionRequest;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::abort::AbortKind;
use crate::abort::AbortScope;

#[derive(Debug, thiserror::Error)]
pub enum QuestionError {
    /// The abort token fired, or the operator dismissed the prompt.
    #[error("question cancelled")]
    Cancelled,

    #[error("question prompt failed: {0}")]
    Failed(String),
}

/// One out-of-band question, served by the prompt-renderer collaborator.
#[derive(Debug)]
pub struct QuestionJob {
    pub request: QuestionRequest,
    /// One-shot token scoped to this question only.
    pub cancel: CancellationToken,
    pub reply: oneshot::Sender<Result<Answer, QuestionError>>,
}

/// What the session should do after a question settled.
#[derive(Debug, PartialEq)]
pub(crate) enum QuestionOutcome {
    /// Send the answer back to the agent.
    Answered { request_id: String, answer: Answer },
    /// No answer is sent; the agent withdraws or re-asks on its own.
    Ended,
}

/// Owns zero-or-one in-flight question prompt.
///
/// Questions are single-flight: only the first entry of the agent's waiting
/// list is ever dispatched, and the next one starts only after the current
/// prompt settles and the agent's state reflects the answer.
pub(crate) struct QuestionLifecycle {
    renderer_tx: UnboundedSender<QuestionJob>,
    in_flight: Option<oneshot::Receiver<Result<Answer, QuestionError>>>,
    request_id: Option<String>,
}

impl QuestionLifecycle {
    pub(crate) fn new(renderer_tx: UnboundedSender<QuestionJob>) -> Self {
        Self {
            renderer_tx,
            in_flight: None,
            request_id: None,
        }
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub(crate) fn start(&mut self, scope: &mut AbortScope, request: QuestionRequest) {
        if self.in_flight.is_some() {
            return;
        }
        let cancel = scope.acquire(AbortKind::Question);
        let (reply, reply_rx) = oneshot::channel();
        let request_id = request.request_id.clone();
        let job = QuestionJob {
            request,
            cancel,
            reply,
        };
        if self.renderer_tx.send(job).is_err() {
            tracing::warn!("question renderer collaborator is gone; questions disabled");
            scope.release(AbortKind::Question);
            return;
        }
        self.in_flight = Some(reply_rx);
        self.request_id = Some(request_id);
    }

    /// Abandon the in-flight question: fire its token and drop the reply.
    pub(crate) fn cancel(&mut self, scope: &mut AbortScope) {
        if self.in_flight.take().is_some() {
            scope.cancel(AbortKind::Question);
        }
        self.request_id = None;
    }

    /// Resolves when the in-flight question settles; pending forever when
    /// none is in flight.
    pub(crate) async fn settled(&mut self) -> Option<Result<Answer, QuestionError>> {
        let result = match &mut self.in_flight {
            Some(reply_rx) => reply_rx.await.ok(),
            None => std::future::pending().await,
        };
        self.in_flight = None;
        result
    }

    pub(crate) fn conclude(
        &mut self,
        scope: &mut AbortScope,
        result: Option<Result<Answer, QuestionError>>,
    ) -> QuestionOutcome {
        scope.release(AbortKind::Question);
        let request_id = self.request_id.take();
        match (request_id, result) {
            (Some(request_id), Some(Ok(answer))) => QuestionOutcome::Answered { request_id, answer },
            (_, Some(Err(QuestionError::Failed(message)))) => {
                tracing::warn!(error = %message, "question prompt failed");
                QuestionOutcome::Ended
            }
            _ => QuestionOutcome::Ended,
        }
    }
}
