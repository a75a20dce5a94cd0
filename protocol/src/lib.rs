pub mod protocol;
pub mod question;

pub use protocol::AgentEvent;
pub use protocol::AgentNotification;
pub use protocol::ArtifactEncoding;
pub use protocol::EventLogSnapshot;
pub use protocol::ExecutionSnapshot;
pub use protocol::InputHandledStatus;
pub use protocol::Op;
pub use question::Answer;
pub use question::Question;
pub use question::QuestionRequest;
pub use question::QuestionResponse;
