//! Defines the protocol between the terminal console and an agent.
//!
//! The agent exposes two state streams (execution state and an append-only
//! event log) and accepts submissions (`Op`). Both sides speak in immutable
//! snapshots: once a value has been observed it never changes.

use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;

use crate::question::QuestionRequest;
use crate::question::QuestionResponse;

/// Submission to the agent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Op {
    /// A line of input collected from the terminal while the agent was idle.
    HandleInput { message: String },

    /// Answer to a [`QuestionRequest`], keyed by its `request_id`.
    ///
    /// Each request is answered at most once; the agent drops the request
    /// from `waiting_on` on its next `ExecutionSnapshot`.
    QuestionResponse {
        request_id: String,
        response: QuestionResponse,
    },
}

/// Point-in-time execution state of the agent.
///
/// `idle` and `busy_with` are not mutually exclusive at the type level, but
/// agents are expected to clear `busy_with` whenever they report `idle`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ExecutionSnapshot {
    /// The agent has nothing to do and is ready for terminal input.
    pub idle: bool,
    /// Human-readable label of the agent's current activity, if any.
    pub busy_with: Option<String>,
    /// Questions the agent is blocked on, oldest first.
    #[serde(default)]
    pub waiting_on: Vec<QuestionRequest>,
}

/// Point-in-time view of the agent's append-only event log.
///
/// Events are only ever appended; a later snapshot is always a prefix
/// extension of an earlier one.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct EventLogSnapshot {
    pub events: Vec<AgentEvent>,
}

/// A single entry in the agent's event log.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Display)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentEvent {
    /// Conversational output addressed to the operator.
    #[serde(rename = "output.chat")]
    ChatOutput { message: String },

    /// The agent's visible reasoning/thinking stream.
    #[serde(rename = "output.reasoning")]
    ReasoningOutput { message: String },

    #[serde(rename = "output.info")]
    InfoOutput { message: String },

    #[serde(rename = "output.warning")]
    WarningOutput { message: String },

    #[serde(rename = "output.error")]
    ErrorOutput { message: String },

    /// Echo of a line of operator input the agent accepted.
    #[serde(rename = "input.received")]
    InputReceived { message: String },

    /// Outcome of handling a previously received input line.
    #[serde(rename = "input.handled")]
    InputHandled {
        status: InputHandledStatus,
        message: String,
    },

    #[serde(rename = "agent.created")]
    AgentCreated { name: String },

    /// The agent is done; the console session ends when this is observed.
    #[serde(rename = "agent.stopped")]
    AgentStopped { message: String },

    /// The agent discarded its in-progress output; display state should be
    /// reset so the next output starts on a fresh row.
    Reset,

    /// The current task was aborted agent-side.
    Abort { reason: String },

    /// A named artifact the agent produced (a file, a report, ...).
    #[serde(rename = "output.artifact")]
    ArtifactOutput {
        name: String,
        encoding: ArtifactEncoding,
        data: String,
    },

    /// Log record of a question being asked. The live question itself
    /// travels via `ExecutionSnapshot::waiting_on`; this entry exists so a
    /// replayed log is complete.
    #[serde(rename = "question.request")]
    QuestionRequested { request: QuestionRequest },

    /// Log record of a question being answered.
    #[serde(rename = "question.response")]
    QuestionAnswered { request_id: String },
}

/// How an accepted input line was ultimately handled.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputHandledStatus {
    Success,
    Cancelled,
    Error,
}

/// Encoding of an [`AgentEvent::ArtifactOutput`] body.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactEncoding {
    /// `data` is plain UTF-8 text and can be printed directly.
    Text,
    /// `data` is base64; consoles summarize it rather than print it.
    Base64,
}

/// One JSON line on the agent's stdout, as consumed by the subprocess
/// bridge. Execution-state lines replace the previous snapshot; event lines
/// are appended to the log.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentNotification {
    ExecutionState(ExecutionSnapshot),
    // Nested rather than flattened: the event carries its own `type` tag.
    Event { event: AgentEvent },
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::question::Answer;
    use crate::question::Question;

    #[test]
    fn event_wire_tags_use_dotted_names() {
        let event = AgentEvent::ChatOutput {
            message: "hi".to_string(),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "output.chat");

        let event = AgentEvent::InputHandled {
            status: InputHandledStatus::Cancelled,
            message: "interrupted".to_string(),
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "input.handled");
        assert_eq!(json["status"], "cancelled");
    }

    #[test]
    fn notification_round_trips_execution_state() {
        let line = r#"{"type":"execution_state","idle":true,"busy_with":null}"#;
        let parsed: AgentNotification = serde_json::from_str(line).expect("parse");
        let AgentNotification::ExecutionState(snapshot) = parsed else {
            panic!("expected execution state, got: {parsed:?}");
        };
        assert!(snapshot.idle);
        assert_eq!(snapshot.busy_with, None);
        assert!(snapshot.waiting_on.is_empty());
    }

    #[test]
    fn event_notification_nests_the_event() {
        let line = r#"{"type":"event","event":{"type":"output.chat","message":"hi"}}"#;
        let parsed: AgentNotification = serde_json::from_str(line).expect("parse");
        assert_eq!(
            parsed,
            AgentNotification::Event {
                event: AgentEvent::ChatOutput {
                    message: "hi".to_string()
                }
            }
        );
    }

    #[test]
    fn question_response_op_carries_request_id() {
        let op = Op::QuestionResponse {
            request_id: "q-1".to_string(),
            response: QuestionResponse {
                result: Answer::Confirmation { value: true },
            },
        };
        let json = serde_json::to_value(&op).expect("serialize");
        assert_eq!(json["type"], "question_response");
        assert_eq!(json["request_id"], "q-1");
        assert_eq!(json["response"]["result"]["type"], "confirmation");
    }

    #[test]
    fn waiting_on_defaults_to_empty() {
        let line = r#"{"idle":false,"busy_with":"thinking"}"#;
        let snapshot: ExecutionSnapshot = serde_json::from_str(line).expect("parse");
        assert_eq!(snapshot.busy_with.as_deref(), Some("thinking"));
        assert!(snapshot.waiting_on.is_empty());
    }

    #[test]
    fn question_request_event_round_trips() {
        let event = AgentEvent::QuestionRequested {
            request: QuestionRequest {
                request_id: "q-7".to_string(),
                message: "Proceed?".to_string(),
                question: Question::Confirm { default: true },
            },
        };
        let json = serde_json::to_string(&event).expect("serialize");
        let back: AgentEvent = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, event);
    }
}
