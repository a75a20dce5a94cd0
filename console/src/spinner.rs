use std::io::Write;
use std::time::Duration;

use crossterm::style::Attribute;
use crossterm::style::SetAttribute;
use crossterm::terminal::Clear;
use crossterm::terminal::ClearType;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::terminal::Sink;
use crate::terminal::ansi;

const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Busy indicator drawn on its own terminal row while the agent reports a
/// `busy_with` label.
///
/// The frame task shares the terminal sink with the renderer; the renderer
/// stops the spinner before writing anything, so the only writes that
/// interleave with frames are the frames themselves. Stopping clears the
/// row and leaves the cursor at column zero with no pending control
/// sequences.
pub(crate) struct Spinner {
    label: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Spinner {
    pub(crate) fn start(sink: Sink, label: String, color: bool) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_frames(sink, label.clone(), color, cancel.clone()));
        Self {
            label,
            cancel,
            task,
        }
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    /// Cancel the frame task and wait for it to clear the spinner row.
    pub(crate) async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

async fn run_frames(sink: Sink, label: String, color: bool, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(FRAME_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut frame = 0usize;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                draw_frame(&sink, FRAMES[frame % FRAMES.len()], &label, color);
                frame = frame.wrapping_add(1);
            }
        }
    }

    clear_row(&sink);
}

fn draw_frame(sink: &Sink, frame: &str, label: &str, color: bool) {
    let mut text = String::from("\r");
    text.push_str(&ansi(Clear(ClearType::UntilNewLine)));
    if color {
        text.push_str(&ansi(SetAttribute(Attribute::Dim)));
    }
    text.push_str(frame);
    text.push(' ');
    text.push_str(label);
    if color {
        text.push_str(&ansi(SetAttribute(Attribute::Reset)));
    }

    let mut guard = match sink.lock() {
        Ok(guard) => guard,
        Err(err) => err.into_inner(),
    };
    let _ = guard.write_all(text.as_bytes());
    let _ = guard.flush();
}

fn clear_row(sink: &Sink) {
    let mut text = String::from("\r");
    text.push_str(&ansi(Clear(ClearType::UntilNewLine)));

    let mut guard = match sink.lock() {
        Ok(guard) => guard,
        Err(err) => err.into_inner(),
    };
    let _ = guard.write_all(text.as_bytes());
    let _ = guard.flush();
}
