//! Messages exchanged with the MultiLangDaemon
//!
//! Inbound lines decode into an [`Action`]; outbound lines are built from
//! [`OutboundMessage`]. Both are one JSON object per line.

mod decode;
mod outbound;
mod record;

pub use decode::decode;
pub use outbound::OutboundMessage;
pub use record::Record;

/// The closed set of action names the daemon may send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Initialize,
    ProcessRecords,
    Shutdown,
    Checkpoint,
    Record,
    ShutdownRequested,
    LeaseLost,
    ShardEnded,
}

impl ActionKind {
    pub const ALL: [ActionKind; 8] = [
        ActionKind::Initialize,
        ActionKind::ProcessRecords,
        ActionKind::Shutdown,
        ActionKind::Checkpoint,
        ActionKind::Record,
        ActionKind::ShutdownRequested,
        ActionKind::LeaseLost,
        ActionKind::ShardEnded,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Wire name used in the `action` field
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Initialize => "initialize",
            ActionKind::ProcessRecords => "processRecords",
            ActionKind::Shutdown => "shutdown",
            ActionKind::Checkpoint => "checkpoint",
            ActionKind::Record => "record",
            ActionKind::ShutdownRequested => "shutdownRequested",
            ActionKind::LeaseLost => "leaseLost",
            ActionKind::ShardEnded => "shardEnded",
        }
    }

    /// All recognized names, quoted and comma separated
    pub fn allowed_names() -> String {
        Self::ALL
            .iter()
            .map(|kind| format!("\"{}\"", kind.name()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Initialize(InitializeInput),
    ProcessRecords(RecordBatch),
    Shutdown(ShutdownReason),
    ShutdownRequested,
    LeaseLost,
    ShardEnded,
    /// Only ever consumed by a checkpointer waiting for its response
    Checkpoint(CheckpointResponse),
    Record(Record),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Initialize(_) => ActionKind::Initialize,
            Action::ProcessRecords(_) => ActionKind::ProcessRecords,
            Action::Shutdown(_) => ActionKind::Shutdown,
            Action::ShutdownRequested => ActionKind::ShutdownRequested,
            Action::LeaseLost => ActionKind::LeaseLost,
            Action::ShardEnded => ActionKind::ShardEnded,
            Action::Checkpoint(_) => ActionKind::Checkpoint,
            Action::Record(_) => ActionKind::Record,
        }
    }

    /// The action name this message arrived with
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}

/// Assignment of a shard to this processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeInput {
    pub shard_id: String,
    /// Where processing resumes; `None` on a fresh shard
    pub sequence_number: Option<String>,
    pub sub_sequence_number: Option<i64>,
}

/// Records delivered by a `processRecords` action
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    pub records: Vec<Record>,
    pub millis_behind_latest: i64,
}

/// Why the legacy `shutdown` action was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownReason {
    /// End of shard reached; a final checkpoint is required
    Terminate,
    /// Lease lost; checkpointing will fail
    Zombie,
}

impl ShutdownReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ShutdownReason::Terminate => "TERMINATE",
            ShutdownReason::Zombie => "ZOMBIE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "TERMINATE" => Some(ShutdownReason::Terminate),
            "ZOMBIE" => Some(ShutdownReason::Zombie),
            _ => None,
        }
    }
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The daemon's answer to a checkpoint request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointResponse {
    pub sequence_number: Option<String>,
    pub sub_sequence_number: Option<i64>,
    /// Exception name when the checkpoint failed
    pub error: Option<String>,
}
