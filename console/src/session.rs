use anyhow::Result;
use attache_protocol::EventLogSnapshot;
use attache_protocol::ExecutionSnapshot;
use attache_protocol::Op;
use attache_protocol::QuestionResponse;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::abort::AbortScope;
use crate::event_cursor::EventCursor;
use crate::exec_watch::Directive;
use crate::exec_watch::ExecutionWatcher;
use crate::exec_watch::InFlight;
use crate::exit::ExitReason;
use crate::exit::SessionExit;
use crate::line_edit::InputLifecycle;
use crate::line_edit::InputOutcome;
use crate::line_edit::LineEditRequest;
use crate::question::QuestionJob;
use crate::question::QuestionLifecycle;
use crate::question::QuestionOutcome;
use crate::render::EventRenderer;
use crate::render::RenderOutcome;
use crate::terminal::FALLBACK_WIDTH;
use crate::terminal::Terminal;

/// Static session inputs.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Commands offered for tab completion.
    pub known_commands: Vec<String>,
    /// Persisted history the prompt starts from, oldest first.
    pub command_history: Vec<String>,
}

/// Channels connecting the controller to the agent and its collaborators.
pub struct SessionHandles {
    /// Agent execution-state stream.
    pub exec_rx: watch::Receiver<ExecutionSnapshot>,
    /// Agent event-log stream.
    pub log_rx: watch::Receiver<EventLogSnapshot>,
    /// Submissions back to the agent.
    pub op_tx: mpsc::UnboundedSender<Op>,
    /// Line-editor collaborator.
    pub editor_tx: mpsc::UnboundedSender<LineEditRequest>,
    /// Question-prompt collaborator.
    pub question_tx: mpsc::UnboundedSender<QuestionJob>,
}

/// Supervises one agent session on one terminal: paints the event log,
/// drives the busy spinner, collects input while the agent is idle and
/// routes out-of-band questions, until the agent stops or the external
/// token cancels.
pub struct SessionController {
    terminal: Terminal,
    config: SessionConfig,
    handles: SessionHandles,
}

impl SessionController {
    pub fn new(terminal: Terminal, config: SessionConfig, handles: SessionHandles) -> Self {
        Self {
            terminal,
            config,
            handles,
        }
    }

    /// Run the session to completion. One-shot; build a fresh controller
    /// per agent session.
    pub async fn run(self, cancel: CancellationToken) -> Result<SessionExit> {
        let resize_rx = spawn_resize_listener();
        self.run_with_resize(cancel, resize_rx).await
    }

    async fn run_with_resize(
        self,
        cancel: CancellationToken,
        mut resize_rx: mpsc::UnboundedReceiver<u16>,
    ) -> Result<SessionExit> {
        let Self {
            mut terminal,
            config,
            handles,
        } = self;
        let SessionHandles {
            mut exec_rx,
            mut log_rx,
            op_tx,
            editor_tx,
            question_tx,
        } = handles;

        let mut renderer = EventRenderer::new();
        let mut cursor = EventCursor::new();
        let mut scope = AbortScope::new();
        let mut watcher = ExecutionWatcher::new();
        let mut input = InputLifecycle::new(editor_tx);
        let mut question = QuestionLifecycle::new(question_tx);

        let mut history = config.command_history.clone();
        let mut submitted: Vec<String> = Vec::new();
        // Log growth observed while a prompt was on screen; painted once
        // the prompt settles so output never lands under it.
        let mut pending_log = false;
        let mut stopping = false;

        let mut resize_open = true;

        // Initial paint: the whole log so far, then the current execution
        // state's directives.
        let initial_log = log_rx.borrow_and_update().clone();
        if full_redraw(&mut terminal, &mut renderer, &mut cursor, &initial_log).await
            == RenderOutcome::SessionStopped
        {
            stopping = true;
        }
        let initial_exec = exec_rx.borrow_and_update().clone();
        let directives = watcher.observe(&initial_exec, InFlight::default());
        apply_directives(
            directives,
            &mut terminal,
            &mut scope,
            &mut input,
            &mut question,
            &config,
            &history,
        )
        .await;

        let reason = loop {
            if pending_log && !input.is_in_flight() && !question.is_in_flight() {
                pending_log = false;
                let log = log_rx.borrow().clone();
                for event in cursor.drain(&log) {
                    if renderer.render_event(&mut terminal, event).await
                        == RenderOutcome::SessionStopped
                    {
                        stopping = true;
                    }
                }
            }
            if stopping {
                break ExitReason::AgentStopped;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    break ExitReason::Cancelled;
                }

                changed = exec_rx.changed() => {
                    if changed.is_err() {
                        tracing::debug!("execution stream closed");
                        break ExitReason::AgentStopped;
                    }
                    let snapshot = exec_rx.borrow_and_update().clone();
                    let in_flight = InFlight {
                        line_edit: input.is_in_flight(),
                        question: question.is_in_flight(),
                    };
                    let directives = watcher.observe(&snapshot, in_flight);
                    apply_directives(
                        directives,
                        &mut terminal,
                        &mut scope,
                        &mut input,
                        &mut question,
                        &config,
                        &history,
                    )
                    .await;
                }

                changed = log_rx.changed() => {
                    if changed.is_err() {
                        tracing::debug!("event log stream closed");
                        break ExitReason::AgentStopped;
                    }
                    if input.is_in_flight() || question.is_in_flight() {
                        let _ = log_rx.borrow_and_update();
                        pending_log = true;
                    } else {
                        let log = log_rx.borrow_and_update().clone();
                        for event in cursor.drain(&log) {
                            if renderer.render_event(&mut terminal, event).await
                                == RenderOutcome::SessionStopped
                            {
                                stopping = true;
                            }
                        }
                    }
                }

                settled = input.settled() => {
                    match input.conclude(&mut scope, settled) {
                        InputOutcome::Submitted(line) => {
                            if line.trim().is_empty() {
                                // Blank entry; keep prompting while idle.
                                if exec_rx.borrow().idle && !question.is_in_flight() {
                                    input.start(
                                        &mut scope,
                                        None,
                                        config.known_commands.clone(),
                                        history.clone(),
                                    );
                                }
                            } else {
                                submitted.push(line.clone());
                                history.push(line.clone());
                                if op_tx.send(Op::HandleInput { message: line }).is_err() {
                                    tracing::debug!("agent submission channel closed");
                                    break ExitReason::AgentStopped;
                                }
                            }
                        }
                        InputOutcome::Retry { partial } => {
                            input.start(
                                &mut scope,
                                Some(partial),
                                config.known_commands.clone(),
                                history.clone(),
                            );
                        }
                        InputOutcome::Ended => {
                            if exec_rx.borrow().idle && !question.is_in_flight() {
                                input.start(
                                    &mut scope,
                                    None,
                                    config.known_commands.clone(),
                                    history.clone(),
                                );
                            }
                        }
                    }
                }

                settled = question.settled() => {
                    match question.conclude(&mut scope, settled) {
                        QuestionOutcome::Answered { request_id, answer } => {
                            // Snapshots the agent emitted before it processed
                            // the answer may still list this question; the
                            // watcher must not re-ask it.
                            watcher.mark_answered(request_id.clone());
                            let op = Op::QuestionResponse {
                                request_id,
                                response: QuestionResponse { result: answer },
                            };
                            if op_tx.send(op).is_err() {
                                tracing::debug!("agent submission channel closed");
                                break ExitReason::AgentStopped;
                            }
                            // The prompt rows are gone; repaint from scratch.
                            // An active line edit is interrupted (not
                            // cancelled) so its buffer comes back as prefill.
                            input.interrupt(&mut scope);
                            let log = log_rx.borrow().clone();
                            if full_redraw(&mut terminal, &mut renderer, &mut cursor, &log).await
                                == RenderOutcome::SessionStopped
                            {
                                stopping = true;
                            }
                        }
                        QuestionOutcome::Ended => {}
                    }
                }

                maybe_width = resize_rx.recv(), if resize_open => {
                    match maybe_width {
                        Some(width) => {
                            terminal.set_width(width);
                            input.interrupt(&mut scope);
                            // A question prompt has no partial to carry over;
                            // withdraw it so the redraw does not paint under
                            // it, then re-dispatch it from the current state.
                            question.cancel(&mut scope);
                            let log = log_rx.borrow().clone();
                            if full_redraw(&mut terminal, &mut renderer, &mut cursor, &log).await
                                == RenderOutcome::SessionStopped
                            {
                                stopping = true;
                            }
                            let snapshot = exec_rx.borrow().clone();
                            let in_flight = InFlight {
                                line_edit: input.is_in_flight(),
                                question: false,
                            };
                            let directives = watcher.observe(&snapshot, in_flight);
                            apply_directives(
                                directives,
                                &mut terminal,
                                &mut scope,
                                &mut input,
                                &mut question,
                                &config,
                                &history,
                            )
                            .await;
                        }
                        None => {
                            resize_open = false;
                        }
                    }
                }
            }
        };

        scope.cancel_all();
        terminal.stop_spinner().await;
        renderer.flush_partial(&mut terminal);
        terminal.ensure_newline();

        Ok(SessionExit {
            reason,
            submitted_commands: submitted,
        })
    }
}

/// Clear the screen and replay the whole log through a fresh cursor, then
/// fast-forward the live cursor so nothing repeats.
async fn full_redraw(
    terminal: &mut Terminal,
    renderer: &mut EventRenderer,
    cursor: &mut EventCursor,
    log: &EventLogSnapshot,
) -> RenderOutcome {
    terminal.stop_spinner().await;
    terminal.clear_screen();
    renderer.reset();

    let mut replay = EventCursor::new();
    let mut outcome = RenderOutcome::Continue;
    for event in replay.drain(log) {
        if renderer.render_event(terminal, event).await == RenderOutcome::SessionStopped {
            outcome = RenderOutcome::SessionStopped;
        }
    }
    cursor.fast_forward(log);
    outcome
}

async fn apply_directives(
    directives: Vec<Directive>,
    terminal: &mut Terminal,
    scope: &mut AbortScope,
    input: &mut InputLifecycle,
    question: &mut QuestionLifecycle,
    config: &SessionConfig,
    history: &[String],
) {
    for directive in directives {
        match directive {
            Directive::StartSpinner(label) => terminal.start_spinner(&label).await,
            Directive::StopSpinner => terminal.stop_spinner().await,
            Directive::StartLineEdit => input.start(
                scope,
                None,
                config.known_commands.clone(),
                history.to_vec(),
            ),
            Directive::CancelLineEdit => input.cancel(scope),
            Directive::StartQuestion(request) => question.start(scope, request),
            Directive::CancelQuestion => question.cancel(scope),
        }
    }
}

/// Terminal-width updates driven by `SIGWINCH`. The channel closes right
/// away on platforms without the signal.
fn spawn_resize_listener() -> mpsc::UnboundedReceiver<u16> {
    let (tx, rx) = mpsc::unbounded_channel();
    #[cfg(unix)]
    {
        tokio::spawn(async move {
            use tokio::signal::unix::SignalKind;
            use tokio::signal::unix::signal;

            let Ok(mut stream) = signal(SignalKind::window_change()) else {
                return;
            };
            while stream.recv().await.is_some() {
                let width = crossterm::terminal::size()
                    .map(|(columns, _)| columns)
                    .unwrap_or(FALLBACK_WIDTH);
                if tx.send(width.max(1)).is_err() {
                    return;
                }
            }
        });
    }
    #[cfg(not(unix))]
    drop(tx);
    rx
}
