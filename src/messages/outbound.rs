use serde::Serialize;

/// Messages written back to the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Sent after every dispatched action, whether or not the processor failed
    Status {
        #[serde(rename = "responseFor")]
        response_for: String,
    },
    /// Request to record progress; both fields `null` means "as far as delivered"
    Checkpoint {
        #[serde(rename = "sequenceNumber")]
        sequence_number: Option<String>,
        #[serde(rename = "subSequenceNumber")]
        sub_sequence_number: Option<i64>,
    },
}

impl OutboundMessage {
    pub fn status(response_for: impl Into<String>) -> Self {
        OutboundMessage::Status {
            response_for: response_for.into(),
        }
    }

    pub fn checkpoint(sequence_number: Option<&str>, sub_sequence_number: Option<i64>) -> Self {
        OutboundMessage::Checkpoint {
            sequence_number: sequence_number.map(str::to_string),
            sub_sequence_number,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
