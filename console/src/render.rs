use attache_protocol::AgentEvent;
use attache_protocol::ArtifactEncoding;
use attache_protocol::InputHandledStatus;
use crossterm::style::Attribute;
use crossterm::style::Color;
use crossterm::style::ResetColor;
use crossterm::style::SetAttribute;
use crossterm::style::SetForegroundColor;

use crate::markdown_line::style_markdown_line;
use crate::terminal::Terminal;
use crate::terminal::ansi;

/// Visual channel an output line belongs to. Switching channels prints a
/// labeled divider so interleaved chat/reasoning/system output stays
/// readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChannel {
    Chat,
    Reasoning,
    System,
}

impl OutputChannel {
    fn label(self) -> &'static str {
        match self {
            OutputChannel::Chat => "agent",
            OutputChannel::Reasoning => "thinking",
            OutputChannel::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineStyle {
    Markdown,
    Dim,
    Warning,
    Error,
}

/// What the session should do after an event was painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderOutcome {
    Continue,
    /// `agent.stopped` was observed; the session winds down.
    SessionStopped,
}

/// Paints agent events to the terminal in cursor order.
///
/// Tracks the current output channel and retains the final unterminated
/// line of a text event as an unprinted buffer, so a later event on the
/// same channel continues it without re-printing. All text writes stop the
/// spinner first; prompt-owning components never go through here.
pub(crate) struct EventRenderer {
    channel: Option<OutputChannel>,
    partial: String,
    partial_style: LineStyle,
}

impl EventRenderer {
    pub(crate) fn new() -> Self {
        Self {
            channel: None,
            partial: String::new(),
            partial_style: LineStyle::Markdown,
        }
    }

    /// Forget channel and pending-line state, as before a full redraw.
    pub(crate) fn reset(&mut self) {
        self.channel = None;
        self.partial.clear();
        self.partial_style = LineStyle::Markdown;
    }

    pub(crate) async fn render_event(
        &mut self,
        terminal: &mut Terminal,
        event: &AgentEvent,
    ) -> RenderOutcome {
        match event {
            AgentEvent::ChatOutput { message } => {
                self.channel_text(terminal, OutputChannel::Chat, LineStyle::Markdown, message)
                    .await;
            }
            AgentEvent::ReasoningOutput { message } => {
                self.channel_text(
                    terminal,
                    OutputChannel::Reasoning,
                    LineStyle::Markdown,
                    message,
                )
                .await;
            }
            AgentEvent::InfoOutput { message } => {
                self.channel_text(terminal, OutputChannel::System, LineStyle::Dim, message)
                    .await;
            }
            AgentEvent::WarningOutput { message } => {
                self.channel_text(terminal, OutputChannel::System, LineStyle::Warning, message)
                    .await;
            }
            AgentEvent::ErrorOutput { message } => {
                self.channel_text(terminal, OutputChannel::System, LineStyle::Error, message)
                    .await;
            }
            AgentEvent::InputReceived { message } => {
                terminal.stop_spinner().await;
                self.flush_partial(terminal);
                terminal.ensure_newline();
                let row = format!("› {message}");
                terminal.write_line(&user_row(&row, terminal.color_enabled()));
                self.channel = None;
            }
            AgentEvent::InputHandled { status, message } => match status {
                InputHandledStatus::Success => {}
                InputHandledStatus::Cancelled | InputHandledStatus::Error => {
                    self.direct_line(terminal, LineStyle::Error, message).await;
                }
            },
            AgentEvent::AgentCreated { name } => {
                self.direct_line(terminal, LineStyle::Dim, &format!("agent '{name}' created"))
                    .await;
            }
            AgentEvent::AgentStopped { message } => {
                let notice = if message.is_empty() {
                    "agent stopped".to_string()
                } else {
                    format!("agent stopped: {message}")
                };
                self.direct_line(terminal, LineStyle::Dim, &notice).await;
                return RenderOutcome::SessionStopped;
            }
            AgentEvent::Reset => {
                // In-progress output was discarded agent-side; drop the
                // unprinted buffer rather than paint abandoned text.
                terminal.stop_spinner().await;
                self.partial.clear();
                terminal.ensure_newline();
                self.channel = None;
            }
            AgentEvent::Abort { reason } => {
                self.direct_line(terminal, LineStyle::Error, &format!("aborted: {reason}"))
                    .await;
            }
            AgentEvent::ArtifactOutput {
                name,
                encoding,
                data,
            } => {
                self.direct_line(terminal, LineStyle::Dim, &format!("artifact: {name}"))
                    .await;
                match encoding {
                    ArtifactEncoding::Text => {
                        for line in data.lines() {
                            terminal.write_line(line);
                        }
                        if !data.is_empty() && !data.ends_with('\n') {
                            terminal.ensure_newline();
                        }
                    }
                    ArtifactEncoding::Base64 => {
                        let note = format!("(base64, {} bytes)", data.len());
                        terminal.write_line(&paint(
                            &note,
                            LineStyle::Dim,
                            terminal.color_enabled(),
                        ));
                    }
                }
            }
            // The live question flow is owned by the question lifecycle and
            // the post-answer redraw; log entries render nothing.
            AgentEvent::QuestionRequested { .. } | AgentEvent::QuestionAnswered { .. } => {}
        }

        RenderOutcome::Continue
    }

    /// Print the retained unterminated line, if any. The spinner must
    /// already be stopped.
    pub(crate) fn flush_partial(&mut self, terminal: &mut Terminal) {
        if self.partial.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.partial);
        let styled = match self.partial_style {
            LineStyle::Markdown => {
                style_markdown_line(&line, terminal.width(), terminal.color_enabled())
            }
            style => paint(&line, style, terminal.color_enabled()),
        };
        terminal.write_line(&styled);
    }

    async fn channel_text(
        &mut self,
        terminal: &mut Terminal,
        channel: OutputChannel,
        style: LineStyle,
        text: &str,
    ) {
        terminal.stop_spinner().await;

        if self.channel != Some(channel) {
            self.flush_partial(terminal);
            terminal.ensure_newline();
            terminal.channel_divider(channel.label());
            self.channel = Some(channel);
        }

        let mut remaining = format!("{}{text}", std::mem::take(&mut self.partial));
        while let Some(index) = remaining.find('\n') {
            let line: String = remaining.drain(..=index).collect();
            let line = line.trim_end_matches('\n');
            let styled = match style {
                LineStyle::Markdown => {
                    style_markdown_line(line, terminal.width(), terminal.color_enabled())
                }
                other => paint(line, other, terminal.color_enabled()),
            };
            terminal.write_line(&styled);
        }

        self.partial = remaining;
        self.partial_style = style;
    }

    async fn direct_line(&mut self, terminal: &mut Terminal, style: LineStyle, text: &str) {
        terminal.stop_spinner().await;
        self.flush_partial(terminal);
        terminal.ensure_newline();
        terminal.write_line(&paint(text, style, terminal.color_enabled()));
        self.channel = None;
    }
}

fn paint(text: &str, style: LineStyle, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    let mut out = String::new();
    match style {
        LineStyle::Markdown => return text.to_string(),
        LineStyle::Dim => out.push_str(&ansi(SetAttribute(Attribute::Dim))),
        LineStyle::Warning => out.push_str(&ansi(SetForegroundColor(Color::Yellow))),
        LineStyle::Error => out.push_str(&ansi(SetForegroundColor(Color::Red))),
    }
    out.push_str(text);
    out.push_str(&ansi(ResetColor));
    out.push_str(&ansi(SetAttribute(Attribute::Reset)));
    out
}

fn user_row(text: &str, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    format!(
        "{}{}{text}{}{}",
        ansi(SetAttribute(Attribute::Bold)),
        ansi(SetForegroundColor(Color::Cyan)),
        ansi(ResetColor),
        ansi(SetAttribute(Attribute::Reset)),
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_support::TestSink;

    fn terminal_with(sink: &TestSink) -> Terminal {
        Terminal::new(Box::new(sink.clone()), 24, false)
    }

    async fn render_all(events: &[AgentEvent]) -> String {
        let sink = TestSink::default();
        let mut terminal = terminal_with(&sink);
        let mut renderer = EventRenderer::new();
        for event in events {
            renderer.render_event(&mut terminal, event).await;
        }
        renderer.flush_partial(&mut terminal);
        sink.contents()
    }

    #[tokio::test]
    async fn divider_printed_between_channels() {
        let out = render_all(&[
            AgentEvent::ChatOutput {
                message: "Hello\n".to_string(),
            },
            AgentEvent::ReasoningOutput {
                message: "because...\n".to_string(),
            },
        ])
        .await;

        let chat_divider = out.find("── agent ").expect("chat divider");
        let reasoning_divider = out.find("── thinking ").expect("reasoning divider");
        assert!(chat_divider < reasoning_divider);
        assert!(out.find("Hello").expect("chat text") < reasoning_divider);
    }

    #[tokio::test]
    async fn same_channel_does_not_repeat_divider() {
        let out = render_all(&[
            AgentEvent::ChatOutput {
                message: "one\n".to_string(),
            },
            AgentEvent::ChatOutput {
                message: "two\n".to_string(),
            },
        ])
        .await;

        assert_eq!(out.matches("── agent ").count(), 1);
    }

    #[tokio::test]
    async fn partial_line_is_continued_not_reprinted() {
        let sink = TestSink::default();
        let mut terminal = terminal_with(&sink);
        let mut renderer = EventRenderer::new();

        renderer
            .render_event(
                &mut terminal,
                &AgentEvent::ChatOutput {
                    message: "Hel".to_string(),
                },
            )
            .await;
        // Unterminated tail stays buffered.
        assert!(!sink.contents().contains("Hel"));

        renderer
            .render_event(
                &mut terminal,
                &AgentEvent::ChatOutput {
                    message: "lo\n".to_string(),
                },
            )
            .await;
        assert!(sink.contents().contains("Hello\n"));
        assert_eq!(sink.contents().matches("Hel").count(), 1);
    }

    #[tokio::test]
    async fn input_received_is_its_own_row() {
        let out = render_all(&[
            AgentEvent::ChatOutput {
                message: "answer".to_string(),
            },
            AgentEvent::InputReceived {
                message: "next task".to_string(),
            },
        ])
        .await;

        // The pending chat tail is flushed before the user row.
        let answer = out.find("answer\n").expect("flushed partial");
        let row = out.find("› next task\n").expect("user row");
        assert!(answer < row);
    }

    #[tokio::test]
    async fn input_handled_success_prints_nothing() {
        let out = render_all(&[AgentEvent::InputHandled {
            status: InputHandledStatus::Success,
            message: "done".to_string(),
        }])
        .await;
        assert_eq!(out, "");
    }

    #[tokio::test]
    async fn input_handled_cancelled_prints_error_line() {
        let out = render_all(&[AgentEvent::InputHandled {
            status: InputHandledStatus::Cancelled,
            message: "interrupted".to_string(),
        }])
        .await;
        assert_eq!(out, "interrupted\n");
    }

    #[tokio::test]
    async fn reset_drops_the_pending_line() {
        let out = render_all(&[
            AgentEvent::ChatOutput {
                message: "discarded tail".to_string(),
            },
            AgentEvent::Reset,
            AgentEvent::ChatOutput {
                message: "fresh\n".to_string(),
            },
        ])
        .await;

        assert!(!out.contains("discarded tail"));
        assert!(out.contains("fresh\n"));
        // Channel state was cleared, so the divider reappears.
        assert_eq!(out.matches("── agent ").count(), 2);
    }

    #[tokio::test]
    async fn text_artifact_prints_body() {
        let out = render_all(&[AgentEvent::ArtifactOutput {
            name: "report.txt".to_string(),
            encoding: ArtifactEncoding::Text,
            data: "line one\nline two\n".to_string(),
        }])
        .await;

        assert!(out.contains("artifact: report.txt"));
        assert!(out.contains("line one\nline two\n"));
    }

    #[tokio::test]
    async fn base64_artifact_is_summarized() {
        let out = render_all(&[AgentEvent::ArtifactOutput {
            name: "blob".to_string(),
            encoding: ArtifactEncoding::Base64,
            data: "aGVsbG8=".to_string(),
        }])
        .await;

        assert!(out.contains("artifact: blob"));
        assert!(out.contains("(base64, 8 bytes)"));
        assert!(!out.contains("aGVsbG8="));
    }

    #[tokio::test]
    async fn agent_stopped_requests_shutdown() {
        let sink = TestSink::default();
        let mut terminal = terminal_with(&sink);
        let mut renderer = EventRenderer::new();

        let outcome = renderer
            .render_event(
                &mut terminal,
                &AgentEvent::AgentStopped {
                    message: String::new(),
                },
            )
            .await;
        assert_eq!(outcome, RenderOutcome::SessionStopped);
        assert!(sink.contents().contains("agent stopped"));
    }

    #[tokio::test]
    async fn question_log_entries_render_nothing() {
        use attache_protocol::Question;
        use attache_protocol::QuestionRequest;

        let out = render_all(&[
            AgentEvent::QuestionRequested {
                request: QuestionRequest {
                    request_id: "q-1".to_string(),
                    message: "sure?".to_string(),
                    question: Question::Confirm { default: true },
                },
            },
            AgentEvent::QuestionAnswered {
                request_id: "q-1".to_string(),
            },
        ])
        .await;
        assert_eq!(out, "");
    }
}
