use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;

use crossterm::Command;
use crossterm::cursor::MoveTo;
use crossterm::style::Attribute;
use crossterm::style::SetAttribute;
use crossterm::terminal::Clear;
use crossterm::terminal::ClearType;
use unicode_width::UnicodeWidthStr;

use crate::spinner::Spinner;

/// Shared output sink. The spinner frame task is the only writer besides
/// the owning [`Terminal`], and it is stopped before any other write.
pub(crate) type Sink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Render a crossterm command to its ANSI byte sequence.
pub(crate) fn ansi(command: impl Command) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = command.write_ansi(&mut out);
    out
}

pub(crate) const FALLBACK_WIDTH: u16 = 80;

/// The console's owned view of the terminal: a write sink plus the output
/// bookkeeping needed to decide when newlines and dividers must be
/// (re)printed, and the busy spinner tied to the agent's `busy_with`.
pub struct Terminal {
    sink: Sink,
    width: u16,
    color: bool,
    ended_in_newline: bool,
    spinner: Option<Spinner>,
}

impl Terminal {
    pub fn new(writer: Box<dyn Write + Send>, width: u16, color: bool) -> Self {
        Self {
            sink: Arc::new(Mutex::new(writer)),
            width,
            color,
            ended_in_newline: true,
            spinner: None,
        }
    }

    /// Terminal over the process stdout, sized from the real window when
    /// that can be queried.
    pub fn stdout(color: bool) -> Self {
        let width = crossterm::terminal::size()
            .map(|(columns, _)| columns)
            .unwrap_or(FALLBACK_WIDTH);
        Self::new(Box::new(std::io::stdout()), width.max(1), color)
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn set_width(&mut self, width: u16) {
        self.width = width.max(1);
    }

    pub fn color_enabled(&self) -> bool {
        self.color
    }

    pub fn ended_in_newline(&self) -> bool {
        self.ended_in_newline
    }

    pub fn spinner_active(&self) -> bool {
        self.spinner.is_some()
    }

    /// Start (or relabel) the busy spinner on its own row.
    pub async fn start_spinner(&mut self, label: &str) {
        if let Some(active) = &self.spinner {
            if active.label() == label {
                return;
            }
        }
        self.stop_spinner().await;
        self.ensure_newline();
        self.spinner = Some(Spinner::start(
            self.sink.clone(),
            label.to_string(),
            self.color,
        ));
    }

    /// Stop the spinner, waiting until its row has been cleared so no frame
    /// can land under subsequent output.
    pub async fn stop_spinner(&mut self) {
        if let Some(active) = self.spinner.take() {
            active.stop().await;
        }
    }

    /// Write raw text, tracking whether the sink ends in a newline.
    pub fn write_str(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.ended_in_newline = text.ends_with('\n');
        self.raw(text);
    }

    /// Write `text` followed by a newline.
    pub fn write_line(&mut self, text: &str) {
        self.raw(text);
        self.raw("\n");
        self.ended_in_newline = true;
    }

    /// Print a newline only when the last write did not end with one.
    pub fn ensure_newline(&mut self) {
        if !self.ended_in_newline {
            self.raw("\n");
            self.ended_in_newline = true;
        }
    }

    /// Labeled horizontal rule announcing an output channel switch.
    pub fn channel_divider(&mut self, label: &str) {
        let heading = format!("── {label} ");
        let fill = usize::from(self.width)
            .saturating_sub(heading.width())
            .max(2);
        let mut line = String::new();
        if self.color {
            line.push_str(&ansi(SetAttribute(Attribute::Dim)));
        }
        line.push_str(&heading);
        line.push_str(&"─".repeat(fill));
        if self.color {
            line.push_str(&ansi(SetAttribute(Attribute::Reset)));
        }
        self.write_line(&line);
    }

    /// Clear the whole screen and home the cursor, the first step of a full
    /// redraw.
    pub fn clear_screen(&mut self) {
        let mut text = ansi(Clear(ClearType::All));
        text.push_str(&ansi(MoveTo(0, 0)));
        self.raw(&text);
        self.ended_in_newline = true;
    }

    fn raw(&mut self, text: &str) {
        let mut guard = match self.sink.lock() {
            Ok(guard) => guard,
            Err(err) => err.into_inner(),
        };
        let _ = guard.write_all(text.as_bytes());
        let _ = guard.flush();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_support::TestSink;

    #[test]
    fn ensure_newline_is_idempotent() {
        let sink = TestSink::default();
        let mut terminal = Terminal::new(Box::new(sink.clone()), 40, false);

        terminal.write_str("partial");
        terminal.ensure_newline();
        terminal.ensure_newline();
        assert_eq!(sink.contents(), "partial\n");
        assert!(terminal.ended_in_newline());
    }

    #[test]
    fn divider_fills_the_width() {
        let sink = TestSink::default();
        let mut terminal = Terminal::new(Box::new(sink.clone()), 20, false);

        terminal.channel_divider("agent");
        let line = sink.contents();
        assert!(line.starts_with("── agent "));
        assert_eq!(line.trim_end().width(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn spinner_row_is_cleared_on_stop() {
        let sink = TestSink::default();
        let mut terminal = Terminal::new(Box::new(sink.clone()), 40, false);

        terminal.start_spinner("thinking").await;
        tokio::time::sleep(std::time::Duration::from_millis(350)).await;
        terminal.stop_spinner().await;

        let out = sink.contents();
        assert!(out.contains("thinking"));
        // The clear sequence must be the last thing on the wire.
        let clear = format!("\r{}", ansi(Clear(ClearType::UntilNewLine)));
        assert!(out.ends_with(&clear), "unexpected tail: {out:?}");
        assert!(!terminal.spinner_active());
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_with_same_label_keeps_the_spinner() {
        let sink = TestSink::default();
        let mut terminal = Terminal::new(Box::new(sink.clone()), 40, false);

        terminal.start_spinner("thinking").await;
        terminal.start_spinner("thinking").await;
        assert!(terminal.spinner_active());
        terminal.stop_spinner().await;
    }
}
