//! Wire types for log records and batches.
//!
//! These mirror the JSON bodies exchanged with producing agents and with
//! downstream analyzers. Timestamps are RFC 3339; the optional metadata maps
//! carry free-form producer context and are omitted from the wire when absent.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a single log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

/// A single log entry inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub level: Severity,
    pub source: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

/// A batch of log records sent by one producing agent in a single request.
///
/// `sent_at` is stamped by the producer; `received_at` is stamped by the
/// ingress facade immediately before the batch is handed to the dispatch
/// engine, so it is absent on the inbound wire and present on the outbound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogBatch {
    pub packet_id: String,
    pub agent_id: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
    pub log_messages: Vec<LogRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch() -> LogBatch {
        LogBatch {
            packet_id: "packet-1".to_string(),
            agent_id: "agent-1".to_string(),
            sent_at: Utc::now(),
            received_at: None,
            log_messages: vec![LogRecord {
                id: "msg-1".to_string(),
                timestamp: Utc::now(),
                level: Severity::Info,
                source: "web-server".to_string(),
                message: "User logged in successfully".to_string(),
                metadata: None,
            }],
            metadata: None,
        }
    }

    #[test]
    fn severity_uses_uppercase_wire_names() {
        let json = serde_json::to_string(&Severity::Warning).unwrap();
        assert_eq!(json, "\"WARNING\"");

        let parsed: Severity = serde_json::from_str("\"FATAL\"").unwrap();
        assert_eq!(parsed, Severity::Fatal);
    }

    #[test]
    fn batch_round_trips_through_json() {
        let batch = sample_batch();
        let json = serde_json::to_string(&batch).unwrap();
        let parsed: LogBatch = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.packet_id, batch.packet_id);
        assert_eq!(parsed.agent_id, batch.agent_id);
        assert_eq!(parsed.log_messages.len(), 1);
        assert_eq!(parsed.log_messages[0].level, Severity::Info);
    }

    #[test]
    fn absent_fields_are_omitted_from_the_wire() {
        let batch = sample_batch();
        let json = serde_json::to_string(&batch).unwrap();

        assert!(!json.contains("received_at"));
        assert!(!json.contains("\"metadata\""));
    }

    #[test]
    fn batch_without_received_at_decodes() {
        let json = r#"{
            "packet_id": "p1",
            "agent_id": "a1",
            "sent_at": "2025-01-01T00:00:00Z",
            "log_messages": []
        }"#;

        let parsed: LogBatch = serde_json::from_str(json).unwrap();
        assert!(parsed.received_at.is_none());
        assert!(parsed.log_messages.is_empty());
    }

    #[test]
    fn received_at_is_serialized_once_stamped() {
        let mut batch = sample_batch();
        batch.received_at = Some(Utc::now());

        let json = serde_json::to_string(&batch).unwrap();
        assert!(json.contains("received_at"));
    }
}
