use attache_protocol::AgentEvent;
use attache_protocol::EventLogSnapshot;

/// Position marker into an agent's append-only event log.
///
/// `drain` yields everything appended since the last call and advances, so
/// each event is observed at most once per cursor. Two cursors over the
/// same log are fully independent.
#[derive(Debug, Default)]
pub struct EventCursor {
    position: usize,
}

impl EventCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slice of events not yet seen through this cursor; advances past them.
    ///
    /// Calling again with no new events yields an empty slice. The start is
    /// clamped so a log shorter than the recorded position (which the
    /// append-only contract rules out) cannot panic.
    pub fn drain<'a>(&mut self, log: &'a EventLogSnapshot) -> &'a [AgentEvent] {
        let start = self.position.min(log.events.len());
        self.position = log.events.len();
        &log.events[start..]
    }

    /// Skip to the end of `log` without yielding anything. Used after a
    /// full-redraw replay so live rendering does not repeat events.
    pub fn fast_forward(&mut self, log: &EventLogSnapshot) {
        self.position = log.events.len();
    }

    pub fn position(&self) -> usize {
        self.position
    }
}
