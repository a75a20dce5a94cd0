//! Out-of-band questions the agent can pose to the operator.

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// A question the agent is blocked on.
///
/// Appears in `ExecutionSnapshot::waiting_on` until a response keyed by
/// `request_id` is submitted, then disappears on the next snapshot.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct QuestionRequest {
    pub request_id: String,
    /// Prompt text shown to the operator.
    pub message: String,
    pub question: Question,
}

/// The input kind a [`QuestionRequest`] asks for.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Question {
    /// Yes/no confirmation with a default used when the operator just
    /// presses Enter.
    Confirm { default: bool },

    /// Pick exactly one of the given options.
    Select { options: Vec<String> },

    /// Free-form single-line text.
    Text {
        #[serde(default)]
        placeholder: Option<String>,
    },

    /// Free-form single-line text that must not be echoed.
    Secret,

    /// Pick a file from a directory listing rooted at `root`.
    FilePick { root: PathBuf },
}

/// Answer to a [`Question`], mirroring its kinds.
///
/// Struct variants throughout: an internal `type` tag cannot sit on a
/// newtype over a primitive.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Answer {
    Confirmation { value: bool },
    Text { value: String },
    Secret { value: String },
    Selection { index: usize, value: String },
    Path { path: PathBuf },
}

/// Envelope for an answer, as submitted via `Op::QuestionResponse`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct QuestionResponse {
    pub result: Answer,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn question_kinds_round_trip() {
        let question = Question::Select {
            options: vec!["a".to_string(), "b".to_string()],
        };
        let json = serde_json::to_value(&question).expect("serialize");
        assert_eq!(json["kind"], "select");

        let back: Question = serde_json::from_value(json).expect("parse");
        assert_eq!(back, question);
    }

    #[test]
    fn selection_answer_carries_index_and_value() {
        let answer = Answer::Selection {
            index: 1,
            value: "b".to_string(),
        };
        let json = serde_json::to_value(&answer).expect("serialize");
        assert_eq!(json["type"], "selection");
        assert_eq!(json["index"], 1);
        assert_eq!(json["value"], "b");
    }

    #[test]
    fn every_answer_kind_serializes_with_a_type_tag() {
        let json = serde_json::to_value(Answer::Confirmation { value: true }).expect("serialize");
        assert_eq!(json["type"], "confirmation");
        assert_eq!(json["value"], true);

        let json = serde_json::to_value(Answer::Text {
            value: "rust".to_string(),
        })
        .expect("serialize");
        assert_eq!(json["type"], "text");
        assert_eq!(json["value"], "rust");

        let json = serde_json::to_value(Answer::Path {
            path: PathBuf::from("/tmp/report.md"),
        })
        .expect("serialize");
        assert_eq!(json["type"], "path");
        assert_eq!(json["path"], "/tmp/report.md");
    }

    #[test]
    fn text_answer_round_trips() {
        let answer = Answer::Text {
            value: "hello".to_string(),
        };
        let json = serde_json::to_string(&answer).expect("serialize");
        let back: Answer = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, answer);
    }

    #[test]
    fn text_placeholder_is_optional_on_the_wire() {
        let question: Question = serde_json::from_str(r#"{"kind":"text"}"#).expect("parse");
        assert_eq!(question, Question::Text { placeholder: None });
    }
}
