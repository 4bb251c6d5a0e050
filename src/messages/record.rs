use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// A single Kinesis record, possibly deaggregated from a KPL record
///
/// `data` stays base64 text until [`Record::binary_data`] is called, so
/// processors that only look at metadata never pay for the decode.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub(crate) sequence_number: String,
    pub(crate) sub_sequence_number: i64,
    pub(crate) approximate_arrival_millis: i64,
    pub(crate) partition_key: String,
    pub(crate) data: String,
    pub(crate) raw: Map<String, Value>,
}

impl Record {
    /// Shared by every record deaggregated from the same Kinesis record
    pub fn sequence_number(&self) -> &str {
        &self.sequence_number
    }

    /// Zero unless the record came out of a KPL aggregate
    pub fn sub_sequence_number(&self) -> i64 {
        self.sub_sequence_number
    }

    pub fn approximate_arrival_millis(&self) -> i64 {
        self.approximate_arrival_millis
    }

    pub fn approximate_arrival_timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.approximate_arrival_millis)
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Base64 payload as delivered
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Decodes the base64 payload
    pub fn binary_data(&self) -> Result<Bytes, base64::DecodeError> {
        STANDARD.decode(&self.data).map(Bytes::from)
    }

    /// Raw access to any field of the record object
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.raw.get(field)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.raw
    }
}
