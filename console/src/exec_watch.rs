use attache_protocol::ExecutionSnapshot;
use attache_protocol::QuestionRequest;

/// Which operations the session currently has outstanding.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct InFlight {
    pub line_edit: bool,
    pub question: bool,
}

/// Ordered instructions derived from an execution-state change. Spinner
/// directives always precede input directives, which precede question
/// directives.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Directive {
    StartSpinner(String),
    StopSpinner,
    StartLineEdit,
    CancelLineEdit,
    StartQuestion(QuestionRequest),
    CancelQuestion,
}

/// Turns execution snapshots into [`Directive`]s.
///
/// Spinner directives are edge-triggered on `busy_with`. Input and
/// question directives are level-triggered against what is actually in
/// flight, so a re-observed idle snapshot restarts a prompt that settled
/// as a no-op, and the next queued question starts once the current one
/// clears.
pub(crate) struct ExecutionWatcher {
    previous: ExecutionSnapshot,
    /// Request id of the last answered question. Snapshots the agent
    /// emitted before it processed the answer may still list it; no
    /// question is dispatched until it leaves the waiting list.
    answered: Option<String>,
}

impl ExecutionWatcher {
    pub(crate) fn new() -> Self {
        Self {
            previous: ExecutionSnapshot::default(),
            answered: None,
        }
    }

    pub(crate) fn mark_answered(&mut self, request_id: String) {
        self.answered = Some(request_id);
    }

    pub(crate) fn observe(
        &mut self,
        next: &ExecutionSnapshot,
        in_flight: InFlight,
    ) -> Vec<Directive> {
        let mut directives = Vec::new();

        if next.busy_with != self.previous.busy_with {
            if self.previous.busy_with.is_some() {
                directives.push(Directive::StopSpinner);
            }
            if let Some(label) = &next.busy_with {
                directives.push(Directive::StartSpinner(label.clone()));
            }
        }

        if next.idle && !in_flight.line_edit {
            directives.push(Directive::StartLineEdit);
        } else if !next.idle && in_flight.line_edit {
            directives.push(Directive::CancelLineEdit);
        }

        if let Some(answered) = &self.answered {
            if !next.waiting_on.iter().any(|q| q.request_id == *answered) {
                self.answered = None;
            }
        }

        // Strict single-flight: only the head of the waiting list is ever
        // dispatched, and an already-answered question is never re-asked.
        if let Some(first) = next.waiting_on.first() {
            if !in_flight.question && self.answered.is_none() {
                directives.push(Directive::StartQuestion(first.clone()));
            }
        } else if in_flight.question {
            directives.push(Directive::CancelQuestion);
        }

        self.previous = next.clone();
        directives
    }
}

#[cfg(test)]
mod tests {
    use attache_protocol::Question;
    use pretty_assertions::assert_eq;

    use super::*;

    fn snapshot(idle: bool, busy_with: Option<&str>) -> ExecutionSnapshot {
        ExecutionSnapshot {
            idle,
            busy_with: busy_with.map(str::to_string),
            waiting_on: Vec::new(),
        }
    }

    fn question(id: &str) -> QuestionRequest {
        QuestionRequest {
            request_id: id.to_string(),
            message: "pick one".to_string(),
            question: Question::Confirm { default: false },
        }
    }

    #[test]
    fn spinner_stops_before_input_starts() {
        let mut watcher = ExecutionWatcher::new();
        watcher.observe(&snapshot(false, Some("compiling")), InFlight::default());

        let directives = watcher.observe(&snapshot(true, None), InFlight::default());
        assert_eq!(
            directives,
            vec![Directive::StopSpinner, Directive::StartLineEdit]
        );
    }

    #[test]
    fn busy_label_change_restarts_the_spinner() {
        let mut watcher = ExecutionWatcher::new();
        watcher.observe(&snapshot(false, Some("fetching")), InFlight::default());

        let directives = watcher.observe(&snapshot(false, Some("linking")), InFlight::default());
        assert_eq!(
            directives,
            vec![
                Directive::StopSpinner,
                Directive::StartSpinner("linking".to_string())
            ]
        );
    }

    #[test]
    fn idle_is_level_triggered() {
        let mut watcher = ExecutionWatcher::new();
        let first = watcher.observe(&snapshot(true, None), InFlight::default());
        assert_eq!(first, vec![Directive::StartLineEdit]);

        // Same snapshot again, but the earlier prompt already settled.
        let again = watcher.observe(&snapshot(true, None), InFlight::default());
        assert_eq!(again, vec![Directive::StartLineEdit]);

        let in_flight = InFlight {
            line_edit: true,
            question: false,
        };
        assert_eq!(watcher.observe(&snapshot(true, None), in_flight), vec![]);
    }

    #[test]
    fn leaving_idle_cancels_an_in_flight_edit() {
        let mut watcher = ExecutionWatcher::new();
        watcher.observe(&snapshot(true, None), InFlight::default());

        let in_flight = InFlight {
            line_edit: true,
            question: false,
        };
        let directives = watcher.observe(&snapshot(false, None), in_flight);
        assert_eq!(directives, vec![Directive::CancelLineEdit]);
    }

    #[test]
    fn only_the_first_waiting_question_is_dispatched() {
        let mut watcher = ExecutionWatcher::new();
        let mut next = snapshot(false, None);
        next.waiting_on = vec![question("q-1"), question("q-2")];

        let directives = watcher.observe(&next, InFlight::default());
        assert_eq!(directives, vec![Directive::StartQuestion(question("q-1"))]);

        // While q-1 is on screen, nothing else starts.
        let in_flight = InFlight {
            line_edit: false,
            question: true,
        };
        assert_eq!(watcher.observe(&next, in_flight), vec![]);

        // Once q-1 clears from the waiting list, q-2 is next.
        next.waiting_on = vec![question("q-2")];
        let directives = watcher.observe(&next, InFlight::default());
        assert_eq!(directives, vec![Directive::StartQuestion(question("q-2"))]);
    }

    #[test]
    fn stale_snapshot_does_not_redispatch_an_answered_question() {
        let mut watcher = ExecutionWatcher::new();
        let mut next = snapshot(false, None);
        next.waiting_on = vec![question("q-1")];
        watcher.observe(&next, InFlight::default());

        // Answered; a snapshot emitted before the agent processed the
        // response still lists q-1.
        watcher.mark_answered("q-1".to_string());
        assert_eq!(watcher.observe(&next, InFlight::default()), vec![]);

        // q-1 cleared: the suppression lifts and the next question starts.
        next.waiting_on = vec![question("q-2")];
        let directives = watcher.observe(&next, InFlight::default());
        assert_eq!(directives, vec![Directive::StartQuestion(question("q-2"))]);
    }

    #[test]
    fn emptied_waiting_list_cancels_the_prompt() {
        let mut watcher = ExecutionWatcher::new();
        let mut next = snapshot(false, None);
        next.waiting_on = vec![question("q-1")];
        watcher.observe(&next, InFlight::default());

        next.waiting_on = Vec::new();
        let in_flight = InFlight {
            line_edit: false,
            question: true,
        };
        assert_eq!(watcher.observe(&next, in_flight), vec![Directive::CancelQuestion]);
    }
}
