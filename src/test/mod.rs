//! Test utilities and mock implementations for exercising the bridge


use serde_json::{json, Value};
use std::io::Cursor;

use crate::io::IoHandler;

/// Handler reading from an in-memory script and writing to in-memory buffers
pub type TestHandler = IoHandler<Cursor<Vec<u8>>, Vec<u8>, Vec<u8>>;

/// Helper functions for building daemon messages and reading our responses
pub struct TestUtils;

impl TestUtils {
    pub fn initialize_line(shard_id: &str, sequence_number: Option<&str>) -> String {
        json!({
            "action": "initialize",
            "shardId": shard_id,
            "sequenceNumber": sequence_number,
            "subSequenceNumber": 0,
        })
        .to_string()
    }

    /// A `processRecords` action with one record per sequence number
    pub fn process_records_line(sequence_numbers: &[&str]) -> String {
        let records: Vec<Value> = sequence_numbers
            .iter()
            .enumerate()
            .map(|(i, sequence_number)| {
                json!({
                    "action": "record",
                    "data": "bWVvdw==",
                    "partitionKey": format!("key-{}", i),
                    "sequenceNumber": sequence_number,
                    "subSequenceNumber": 0,
                    "approximateArrivalTimestamp": 1_476_889_707_000_i64,
                })
            })
            .collect();

        json!({
            "action": "processRecords",
            "millisBehindLatest": 0,
            "records": records,
        })
        .to_string()
    }

    pub fn shutdown_line(reason: &str) -> String {
        json!({ "action": "shutdown", "reason": reason }).to_string()
    }

    /// Any action without fields, e.g. `leaseLost`
    pub fn bare_line(action: &str) -> String {
        json!({ "action": action }).to_string()
    }

    pub fn checkpoint_response_line(sequence_number: Option<&str>, error: Option<&str>) -> String {
        let mut response = json!({
            "action": "checkpoint",
            "sequenceNumber": sequence_number,
            "subSequenceNumber": sequence_number.map(|_| 0),
        });
        if let Some(error) = error {
            response["error"] = json!(error);
        }
        response.to_string()
    }

    /// Handler whose input is `lines` joined by newlines
    pub fn handler<S: AsRef<str>>(lines: &[S]) -> TestHandler {
        let mut input = String::new();
        for line in lines {
            input.push_str(line.as_ref());
            input.push('\n');
        }
        IoHandler::new(Cursor::new(input.into_bytes()), Vec::new(), Vec::new())
    }

    /// Parses every non-blank line written to the outbound stream
    pub fn parse_output(output: &[u8]) -> Vec<Value> {
        String::from_utf8_lossy(output)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).expect("outbound line is not JSON"))
            .collect()
    }

    pub fn status(response_for: &str) -> Value {
        json!({ "action": "status", "responseFor": response_for })
    }

    pub fn checkpoint_request(
        sequence_number: Option<&str>,
        sub_sequence_number: Option<i64>,
    ) -> Value {
        json!({
            "action": "checkpoint",
            "sequenceNumber": sequence_number,
            "subSequenceNumber": sub_sequence_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{decode, Action};

    #[test]
    fn test_generated_lines_decode() {
        assert!(matches!(
            decode(&TestUtils::initialize_line("shardId-1", None)).unwrap(),
            Action::Initialize(_)
        ));
        assert!(matches!(
            decode(&TestUtils::shutdown_line("TERMINATE")).unwrap(),
            Action::Shutdown(_)
        ));
        assert!(matches!(
            decode(&TestUtils::checkpoint_response_line(Some("1"), Some("ThrottlingException")))
                .unwrap(),
            Action::Checkpoint(_)
        ));

        let Action::ProcessRecords(batch) =
            decode(&TestUtils::process_records_line(&["1", "2", "3"])).unwrap()
        else {
            panic!("expected processRecords");
        };
        assert_eq!(batch.records.len(), 3);
    }

    #[test]
    fn test_parse_output_skips_framing() {
        let output = b"\n{\"action\":\"status\",\"responseFor\":\"leaseLost\"}\n\n{\"action\":\"status\",\"responseFor\":\"shardEnded\"}\n";
        assert_eq!(
            TestUtils::parse_output(output),
            vec![TestUtils::status("leaseLost"), TestUtils::status("shardEnded")]
        );
    }
}
