use tokio_util::sync::CancellationToken;

/// The operation categories that own independent cancellation tokens.
///
/// The session-wide token is not part of the scope; it is passed into
/// `SessionController::run` by the caller and never mixed with these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortKind {
    LineEdit,
    Question,
}

/// Record of one-shot cancellation tokens, one per in-flight operation.
///
/// Tokens are created fresh per operation and discarded once released or
/// fired; a fired token is never reused. Entries are removed most-recent
/// first within a kind, and a token acquired for one kind is never visible
/// to the other.
#[derive(Debug, Default)]
pub struct AbortScope {
    entries: Vec<(AbortKind, CancellationToken)>,
}

impl AbortScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and record a fresh token for `kind`, returning a clone for
    /// the operation to watch.
    pub fn acquire(&mut self, kind: AbortKind) -> CancellationToken {
        let token = CancellationToken::new();
        self.entries.push((kind, token.clone()));
        token
    }

    /// Drop the most recent entry for `kind` without firing it. Called when
    /// the owning operation settled on its own.
    pub fn release(&mut self, kind: AbortKind) {
        if let Some(index) = self.last_index_of(kind) {
            self.entries.remove(index);
        }
    }

    /// Fire and drop the most recent entry for `kind`.
    pub fn cancel(&mut self, kind: AbortKind) {
        if let Some(index) = self.last_index_of(kind) {
            let (_, token) = self.entries.remove(index);
            token.cancel();
        }
    }

    /// Fire every remaining entry. Used during session teardown.
    pub fn cancel_all(&mut self) {
        for (_, token) in self.entries.drain(..) {
            token.cancel();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn last_index_of(&self, kind: AbortKind) -> Option<usize> {
        self.entries.iter().rposition(|(k, _)| *k == kind)
    }
}
