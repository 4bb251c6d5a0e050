//! Action decoder
//!
//! Turns one inbound line into an [`Action`]. Decoding is pure: it never
//! touches the line channel and keeps no state between calls.

use serde_json::{Map, Value};

use super::{
    Action, ActionKind, CheckpointResponse, InitializeInput, Record, RecordBatch, ShutdownReason,
};
use crate::error::MalformedAction;

type DecodeResult<T> = std::result::Result<T, MalformedAction>;

/// Decodes a single JSON line into an [`Action`]
///
/// Fails with [`MalformedAction`] if the line is not a JSON object, has no
/// `action` key, names an action outside [`ActionKind::ALL`], or is missing
/// a field that action requires.
pub fn decode(line: &str) -> DecodeResult<Action> {
    let value: Value = serde_json::from_str(line)?;
    let Value::Object(map) = value else {
        return Err(MalformedAction::NotAnObject(line.trim().to_string()));
    };

    let kind = match map.get("action") {
        None => {
            return Err(MalformedAction::MissingAction {
                line: line.trim().to_string(),
                allowed: ActionKind::allowed_names(),
            })
        }
        Some(Value::String(name)) => {
            ActionKind::from_name(name).ok_or_else(|| unknown_action(name))?
        }
        Some(other) => return Err(unknown_action(&other.to_string())),
    };

    let fields = Fields::new(kind, &map);
    let action = match kind {
        ActionKind::Initialize => Action::Initialize(InitializeInput {
            shard_id: fields.string("shardId")?,
            sequence_number: fields.nullable_string("sequenceNumber")?,
            sub_sequence_number: fields.nullable_int("subSequenceNumber")?,
        }),
        ActionKind::ProcessRecords => Action::ProcessRecords(RecordBatch {
            records: records(&fields)?,
            millis_behind_latest: fields.int("millisBehindLatest")?,
        }),
        ActionKind::Shutdown => {
            let reason = fields.string("reason")?;
            Action::Shutdown(
                ShutdownReason::from_name(&reason)
                    .ok_or_else(|| fields.invalid("reason", "\"TERMINATE\" or \"ZOMBIE\""))?,
            )
        }
        ActionKind::Checkpoint => Action::Checkpoint(CheckpointResponse {
            sequence_number: fields.nullable_string("sequenceNumber")?,
            sub_sequence_number: fields.nullable_int("subSequenceNumber")?,
            error: fields.optional_string("error")?,
        }),
        ActionKind::Record => Action::Record(record(&fields)?),
        ActionKind::ShutdownRequested => Action::ShutdownRequested,
        ActionKind::LeaseLost => Action::LeaseLost,
        ActionKind::ShardEnded => Action::ShardEnded,
    };

    Ok(action)
}

fn unknown_action(action: &str) -> MalformedAction {
    MalformedAction::UnknownAction {
        action: action.to_string(),
        allowed: ActionKind::allowed_names(),
    }
}

fn records(fields: &Fields<'_>) -> DecodeResult<Vec<Record>> {
    let Value::Array(items) = fields.required("records")? else {
        return Err(fields.invalid("records", "an array of record objects"));
    };

    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => record(&Fields::new(ActionKind::Record, map)),
            _ => Err(fields.invalid("records", "an array of record objects")),
        })
        .collect()
}

fn record(fields: &Fields<'_>) -> DecodeResult<Record> {
    Ok(Record {
        sequence_number: fields.string("sequenceNumber")?,
        sub_sequence_number: fields.optional_int("subSequenceNumber")?.unwrap_or(0),
        approximate_arrival_millis: fields.int("approximateArrivalTimestamp")?,
        partition_key: fields.string("partitionKey")?,
        data: fields.string("data")?,
        raw: fields.map.clone(),
    })
}

/// Typed access to the fields of one action object
struct Fields<'a> {
    action: &'static str,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn new(kind: ActionKind, map: &'a Map<String, Value>) -> Self {
        Self {
            action: kind.name(),
            map,
        }
    }

    fn missing(&self, field: &'static str) -> MalformedAction {
        MalformedAction::MissingField {
            action: self.action,
            field,
        }
    }

    fn invalid(&self, field: &'static str, expected: &'static str) -> MalformedAction {
        MalformedAction::InvalidField {
            action: self.action,
            field,
            expected,
        }
    }

    fn required(&self, field: &'static str) -> DecodeResult<&'a Value> {
        self.map.get(field).ok_or_else(|| self.missing(field))
    }

    fn string(&self, field: &'static str) -> DecodeResult<String> {
        self.nullable_string(field)?
            .ok_or_else(|| self.invalid(field, "a string"))
    }

    /// Key must be present; `null` is allowed
    fn nullable_string(&self, field: &'static str) -> DecodeResult<Option<String>> {
        as_string(self.required(field)?).ok_or_else(|| self.invalid(field, "a string or null"))
    }

    fn optional_string(&self, field: &'static str) -> DecodeResult<Option<String>> {
        match self.map.get(field) {
            None => Ok(None),
            Some(value) => as_string(value).ok_or_else(|| self.invalid(field, "a string or null")),
        }
    }

    fn int(&self, field: &'static str) -> DecodeResult<i64> {
        self.nullable_int(field)?
            .ok_or_else(|| self.invalid(field, "an integer"))
    }

    fn nullable_int(&self, field: &'static str) -> DecodeResult<Option<i64>> {
        as_int(self.required(field)?).ok_or_else(|| self.invalid(field, "an integer or null"))
    }

    fn optional_int(&self, field: &'static str) -> DecodeResult<Option<i64>> {
        match self.map.get(field) {
            None => Ok(None),
            Some(value) => as_int(value).ok_or_else(|| self.invalid(field, "an integer or null")),
        }
    }
}

/// `Some(None)` for null, `None` when the value has the wrong type
fn as_string(value: &Value) -> Option<Option<String>> {
    match value {
        Value::Null => Some(None),
        Value::String(s) => Some(Some(s.clone())),
        _ => None,
    }
}

/// Integers may arrive as JSON numbers or numeric strings
fn as_int(value: &Value) -> Option<Option<i64>> {
    match value {
        Value::Null => Some(None),
        Value::Number(n) => n.as_i64().map(Some),
        Value::String(s) => s.trim().parse().ok().map(Some),
        _ => None,
    }
}
