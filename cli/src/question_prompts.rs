use std::io::Write as _;
use std::path::Path;

use attache_console::QuestionError;
use attache_console::QuestionJob;
use attache_protocol::Answer;
use attache_protocol::Question;
use crossterm::event::EventStream;
use crossterm::event::KeyCode;
use crossterm::event::KeyModifiers;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::line_editor::RawModeGuard;
use crate::line_editor::clear_prompt_row;
use crate::line_editor::next_key;

/// Serve question jobs on the process terminal, one at a time. Each prompt
/// races its per-question token; Ctrl-C cancels the whole session.
pub fn spawn(session_cancel: CancellationToken) -> mpsc::UnboundedSender<QuestionJob> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(serve(rx, session_cancel));
    tx
}

async fn serve(mut jobs: mpsc::UnboundedReceiver<QuestionJob>, session_cancel: CancellationToken) {
    while let Some(job) = jobs.recv().await {
        let QuestionJob {
            request,
            cancel,
            reply,
        } = job;
        let result = ask(&request.message, request.question, &cancel, &session_cancel).await;
        let _ = reply.send(result);
    }
}

async fn ask(
    message: &str,
    question: Question,
    cancel: &CancellationToken,
    session_cancel: &CancellationToken,
) -> Result<Answer, QuestionError> {
    let _raw = RawModeGuard::enable().map_err(|err| QuestionError::Failed(err.to_string()))?;
    let mut events = EventStream::new();

    match question {
        Question::Confirm { default } => {
            let hint = if default { "[Y/n]" } else { "[y/N]" };
            print_lines(&[&format!("? {message} {hint}")])?;
            loop {
                match prompt_key(&mut events, cancel, session_cancel).await? {
                    KeyCode::Char('y' | 'Y') => return Ok(Answer::Confirmation { value: true }),
                    KeyCode::Char('n' | 'N') => return Ok(Answer::Confirmation { value: false }),
                    KeyCode::Enter => return Ok(Answer::Confirmation { value: default }),
                    KeyCode::Esc => return Err(QuestionError::Cancelled),
                    _ => continue,
                }
            }
        }
        Question::Select { options } => {
            if options.is_empty() {
                return Err(QuestionError::Failed("select with no options".to_string()));
            }
            let index = pick_index(
                message,
                &options,
                &mut events,
                cancel,
                session_cancel,
            )
            .await?;
            Ok(Answer::Selection {
                index,
                value: options[index].clone(),
            })
        }
        Question::Text { placeholder } => {
            let hint = placeholder.as_deref().unwrap_or("");
            print_lines(&[&format!("? {message}")])?;
            let text = read_text(hint, false, &mut events, cancel, session_cancel).await?;
            Ok(Answer::Text { value: text })
        }
        Question::Secret => {
            print_lines(&[&format!("? {message}")])?;
            let secret = read_text("", true, &mut events, cancel, session_cancel).await?;
            Ok(Answer::Secret { value: secret })
        }
        Question::FilePick { root } => {
            let entries = list_directory(&root)
                .map_err(|err| QuestionError::Failed(err.to_string()))?;
            if entries.is_empty() {
                return Err(QuestionError::Failed(format!(
                    "no files under {}",
                    root.display()
                )));
            }
            let index = pick_index(
                message,
                &entries,
                &mut events,
                cancel,
                session_cancel,
            )
            .await?;
            Ok(Answer::Path {
                path: root.join(&entries[index]),
            })
        }
    }
}

/// Numbered single-keystroke selection over up to nine entries.
async fn pick_index(
    message: &str,
    options: &[String],
    events: &mut EventStream,
    cancel: &CancellationToken,
    session_cancel: &CancellationToken,
) -> Result<usize, QuestionError> {
    let mut lines = vec![format!("? {message}")];
    for (index, option) in options.iter().take(9).enumerate() {
        lines.push(format!("  {}. {option}", index + 1));
    }
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    print_lines(&refs)?;

    loop {
        match prompt_key(events, cancel, session_cancel).await? {
            KeyCode::Char(c) => {
                if let Some(index) = digit_to_index(c, options.len()) {
                    return Ok(index);
                }
            }
            KeyCode::Esc => return Err(QuestionError::Cancelled),
            _ => continue,
        }
    }
}

/// Inline text entry; echoes `*` per char when `mask` is set.
async fn read_text(
    placeholder: &str,
    mask: bool,
    events: &mut EventStream,
    cancel: &CancellationToken,
    session_cancel: &CancellationToken,
) -> Result<String, QuestionError> {
    let mut buffer = String::new();
    draw_entry_row(&buffer, placeholder, mask)?;

    loop {
        match prompt_key(events, cancel, session_cancel).await? {
            KeyCode::Enter => {
                clear_prompt_row();
                return Ok(buffer);
            }
            KeyCode::Esc => {
                clear_prompt_row();
                return Err(QuestionError::Cancelled);
            }
            KeyCode::Char(c) => buffer.push(c),
            KeyCode::Backspace => {
                buffer.pop();
            }
            _ => continue,
        }
        draw_entry_row(&buffer, placeholder, mask)?;
    }
}

/// Next relevant key, racing the question token and the session signal.
async fn prompt_key(
    events: &mut EventStream,
    cancel: &CancellationToken,
    session_cancel: &CancellationToken,
) -> Result<KeyCode, QuestionError> {
    let key = tokio::select! {
        _ = cancel.cancelled() => {
            clear_prompt_row();
            return Err(QuestionError::Cancelled);
        }
        maybe_key = next_key(events) => {
            let Some(key) = maybe_key else {
                return Err(QuestionError::Failed(
                    "terminal event stream ended".to_string(),
                ));
            };
            key
        }
    };

    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        clear_prompt_row();
        session_cancel.cancel();
        return Err(QuestionError::Cancelled);
    }
    Ok(key.code)
}

fn print_lines(lines: &[&str]) -> Result<(), QuestionError> {
    let mut out = std::io::stdout();
    for line in lines {
        // Raw mode needs explicit carriage returns.
        write!(out, "{line}\r\n").map_err(|err| QuestionError::Failed(err.to_string()))?;
    }
    out.flush().map_err(|err| QuestionError::Failed(err.to_string()))
}

fn draw_entry_row(buffer: &str, placeholder: &str, mask: bool) -> Result<(), QuestionError> {
    let mut out = std::io::stdout();
    crossterm::queue!(
        out,
        crossterm::cursor::MoveToColumn(0),
        crossterm::terminal::Clear(crossterm::terminal::ClearType::UntilNewLine),
    )
    .map_err(|err| QuestionError::Failed(err.to_string()))?;
    let shown = if mask {
        "*".repeat(buffer.chars().count())
    } else if buffer.is_empty() && !placeholder.is_empty() {
        format!("({placeholder})")
    } else {
        buffer.to_string()
    };
    write!(out, "› {shown}").map_err(|err| QuestionError::Failed(err.to_string()))?;
    out.flush().map_err(|err| QuestionError::Failed(err.to_string()))
}

fn digit_to_index(c: char, len: usize) -> Option<usize> {
    let digit = c.to_digit(10)? as usize;
    if digit == 0 || digit > len.min(9) {
        return None;
    }
    Some(digit - 1)
}

/// File names directly under `root`, sorted for stable numbering.
fn list_directory(root: &Path) -> std::io::Result<Vec<String>> {
    let mut entries: Vec<String> = std::fs::read_dir(root)?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    entries.sort();
    Ok(entries)
}
