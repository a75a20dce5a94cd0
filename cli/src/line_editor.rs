use std::io::Write as _;

use attache_console::LineEditError;
use attache_console::LineEditRequest;
use crossterm::event::Event;
use crossterm::event::EventStream;
use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use crossterm::event::KeyEventKind;
use crossterm::event::KeyModifiers;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// Raw mode for the lifetime of one prompt; always restored on drop.
pub(crate) struct RawModeGuard;

impl RawModeGuard {
    pub(crate) fn enable() -> std::io::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

/// Next key press from the terminal; `None` when the stream ends.
pub(crate) async fn next_key(events: &mut EventStream) -> Option<KeyEvent> {
    loop {
        match events.next().await {
            Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => return Some(key),
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => return None,
        }
    }
}

pub(crate) fn clear_prompt_row() {
    let mut out = std::io::stdout();
    let _ = crossterm::execute!(
        out,
        crossterm::cursor::MoveToColumn(0),
        crossterm::terminal::Clear(crossterm::terminal::ClearType::UntilNewLine),
    );
}

/// Serve line-edit requests on the process terminal. Ctrl-C inside the
/// prompt cancels the whole session via `session_cancel`.
pub fn spawn(session_cancel: CancellationToken) -> mpsc::UnboundedSender<LineEditRequest> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(serve(rx, session_cancel));
    tx
}

async fn serve(
    mut requests: mpsc::UnboundedReceiver<LineEditRequest>,
    session_cancel: CancellationToken,
) {
    while let Some(request) = requests.recv().await {
        let LineEditRequest {
            prefill,
            auto_completion,
            history,
            cancel,
            reply,
        } = request;
        let result = collect_line(prefill, auto_completion, history, &cancel, &session_cancel).await;
        let _ = reply.send(result);
    }
}

async fn collect_line(
    prefill: Option<String>,
    auto_completion: Vec<String>,
    history: Vec<String>,
    cancel: &CancellationToken,
    session_cancel: &CancellationToken,
) -> Result<String, LineEditError> {
    let _raw = RawModeGuard::enable().map_err(|err| LineEditError::Failed(err.to_string()))?;
    let mut events = EventStream::new();
    let mut editor = Editor::new(prefill.unwrap_or_default(), auto_completion, history);
    draw_prompt(&editor.buffer).map_err(|err| LineEditError::Failed(err.to_string()))?;

    loop {
        let key = tokio::select! {
            _ = cancel.cancelled() => {
                clear_prompt_row();
                return Err(LineEditError::Interrupted {
                    partial: editor.buffer,
                });
            }
            maybe_key = next_key(&mut events) => {
                let Some(key) = maybe_key else {
                    clear_prompt_row();
                    return Err(LineEditError::Failed(
                        "terminal event stream ended".to_string(),
                    ));
                };
                key
            }
        };

        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                clear_prompt_row();
                session_cancel.cancel();
                return Err(LineEditError::Cancelled);
            }
            (KeyCode::Enter, _) => {
                clear_prompt_row();
                return Ok(editor.buffer);
            }
            (KeyCode::Esc, _) => {
                if editor.buffer.is_empty() {
                    clear_prompt_row();
                    return Err(LineEditError::Cancelled);
                }
                // First Esc only clears the draft.
                editor.clear();
            }
            (KeyCode::Char(c), modifiers) if !modifiers.contains(KeyModifiers::CONTROL) => {
                editor.insert(c);
            }
            (KeyCode::Backspace, _) => editor.backspace(),
            (KeyCode::Tab, _) => editor.complete(),
            (KeyCode::Up, _) => editor.history_up(),
            (KeyCode::Down, _) => editor.history_down(),
            _ => continue,
        }

        draw_prompt(&editor.buffer).map_err(|err| LineEditError::Failed(err.to_string()))?;
    }
}

fn draw_prompt(buffer: &str) -> std::io::Result<()> {
    let mut out = std::io::stdout();
    crossterm::queue!(
        out,
        crossterm::cursor::MoveToColumn(0),
        crossterm::terminal::Clear(crossterm::terminal::ClearType::UntilNewLine),
    )?;
    write!(out, "› {buffer}")?;
    out.flush()
}

/// Line-editing state, kept separate from terminal I/O so the key handling
/// can be tested directly.
struct Editor {
    buffer: String,
    auto_completion: Vec<String>,
    history: Vec<String>,
    history_cursor: Option<usize>,
    draft: String,
    completion: Option<Completion>,
}

struct Completion {
    matches: Vec<String>,
    index: usize,
}

impl Editor {
    fn new(buffer: String, auto_completion: Vec<String>, history: Vec<String>) -> Self {
        Self {
            buffer,
            auto_completion,
            history,
            history_cursor: None,
            draft: String::new(),
            completion: None,
        }
    }

    fn insert(&mut self, c: char) {
        self.buffer.push(c);
        self.leave_navigation();
    }

    fn backspace(&mut self) {
        self.buffer.pop();
        self.leave_navigation();
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.leave_navigation();
    }

    /// Cycle through known commands matching the typed stem.
    fn complete(&mut self) {
        match &mut self.completion {
            Some(completion) => {
                completion.index = (completion.index + 1) % completion.matches.len();
                self.buffer = completion.matches[completion.index].clone();
            }
            None => {
                let matches: Vec<String> = self
                    .auto_completion
                    .iter()
                    .filter(|candidate| candidate.starts_with(&self.buffer))
                    .cloned()
                    .collect();
                if let Some(first) = matches.first() {
                    self.buffer = first.clone();
                    self.completion = Some(Completion { matches, index: 0 });
                }
            }
        }
    }

    fn history_up(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let next = match self.history_cursor {
            None => {
                self.draft = std::mem::take(&mut self.buffer);
                self.history.len() - 1
            }
            Some(index) => index.saturating_sub(1),
        };
        self.history_cursor = Some(next);
        self.buffer = self.history[next].clone();
        self.completion = None;
    }

    fn history_down(&mut self) {
        let Some(index) = self.history_cursor else {
            return;
        };
        if index + 1 < self.history.len() {
            self.history_cursor = Some(index + 1);
            self.buffer = self.history[index + 1].clone();
        } else {
            self.history_cursor = None;
            self.buffer = std::mem::take(&mut self.draft);
        }
        self.completion = None;
    }

    /// Any edit ends completion cycling and history navigation.
    fn leave_navigation(&mut self) {
        self.completion = None;
        self.history_cursor = None;
        self.draft.clear();
    }
}
