/// Summary produced when a console session ends.
#[derive(Debug, Clone)]
pub struct SessionExit {
    /// Why the session ended.
    pub reason: ExitReason,
    /// Commands submitted during the session, for the caller's history
    /// persistence.
    pub submitted_commands: Vec<String>,
}

/// Reason why a console session terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The external cancellation signal fired.
    Cancelled,
    /// The agent reported `agent.stopped` (or its state streams closed).
    AgentStopped,
}
