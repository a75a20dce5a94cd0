// Forbid accidental stdout/stderr writes in the library portion of the
// console. All terminal output goes through the session's `Terminal`.
#![deny(clippy::print_stdout, clippy::print_stderr)]

mod abort;
mod event_cursor;
mod exec_watch;
mod exit;
mod line_edit;
mod markdown_line;
mod question;
mod render;
mod session;
mod spinner;
mod terminal;

#[cfg(test)]
mod test_support;

pub use abort::AbortKind;
pub use abort::AbortScope;
pub use event_cursor::EventCursor;
pub use exit::ExitReason;
pub use exit::SessionExit;
pub use line_edit::LineEditError;
pub use line_edit::LineEditRequest;
pub use question::QuestionError;
pub use question::QuestionJob;
pub use render::OutputChannel;
pub use session::SessionConfig;
pub use session::SessionController;
pub use session::SessionHandles;
pub use terminal::Terminal;
