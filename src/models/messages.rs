use serde::{Deserialize, Serialize};
use serde_json::Value;

/// First-phase view of an inbound frame: only the discriminator is read.
#[derive(Deserialize, Debug)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub op_type: String,
}

/// Operation without payload beyond the envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BaseOperation {
    #[serde(rename = "type")]
    pub op_type: String,
}

/// Operation correlated with a point in the document history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VersionedOperation {
    #[serde(rename = "type")]
    pub op_type: String,
    pub content_version: u64,
}

/// Content mutation sent by an editor. `command_id` is chosen by the client
/// and echoed back in the ack.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandOperation {
    #[serde(rename = "type")]
    pub op_type: String,
    pub command_id: u64,
    pub command: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SelectionOperation {
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default)]
    pub selection: Option<String>,
}

/// Decoded inbound operation. The variant is chosen by the processor's
/// declared payload kind, not by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Bare(BaseOperation),
    Versioned(VersionedOperation),
    Command(CommandOperation),
    Selection(SelectionOperation),
}

impl Operation {
    pub fn op_type(&self) -> &str {
        match self {
            Operation::Bare(op) => &op.op_type,
            Operation::Versioned(op) => &op.op_type,
            Operation::Command(op) => &op.op_type,
            Operation::Selection(op) => &op.op_type,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AckType {
    Undo,
    Redo,
    Command,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AckMessage {
    pub ack_type: AckType,
    pub content_version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<u64>,
}

impl AckMessage {
    pub fn history(ack_type: AckType, content_version: u64) -> Self {
        Self {
            ack_type,
            content_version,
            command_id: None,
        }
    }

    pub fn command(command_id: u64, content_version: u64) -> Self {
        Self {
            ack_type: AckType::Command,
            content_version,
            command_id: Some(command_id),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UndoRedoMessage {
    pub content_version: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandMessage {
    pub command: Value,
    pub user: String,
    pub content_version: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SelectionMessage {
    pub user: String,
    pub id: String,
    pub selection: Option<String>,
}

/// Presence change of one session member.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MembershipMessage {
    pub user: String,
    pub id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum SendMessage {
    #[serde(rename = "ack")]
    Ack(AckMessage),
    #[serde(rename = "undo")]
    Undo(UndoRedoMessage),
    #[serde(rename = "redo")]
    Redo(UndoRedoMessage),
    #[serde(rename = "command")]
    Command(CommandMessage),
    #[serde(rename = "selection")]
    Selection(SelectionMessage),
    #[serde(rename = "join")]
    Join(MembershipMessage),
    #[serde(rename = "leave")]
    Leave(MembershipMessage),
}
