//! Flow snapshot data model.
//!
//! A [`FlowBatch`] is one collection interval's dump of observed sessions.
//! The JSON shape below is the single canonical ingestion schema; unknown
//! fields are rejected so that an alternately-named document fails loudly
//! instead of being half-read.
//!
//! ```json
//! { "collectedAt": 1622505600, "size": 4096,
//!   "sessions": [ { "localIP": 167772161, "remoteIP": 134744072,
//!                   "beginTime": 1622505540,
//!                   "tcpTuples": [ { "packetsIn": 5, "packetsOut": 3,
//!                                    "bytesIn": 500, "bytesOut": 300 } ],
//!                   "udpTuples": [], "tcpPortCount": 1, "udpPortCount": 0 } ] }
//! ```

use std::net::Ipv4Addr;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::error::IngestionError;

/// Timestamp layout used for every formatted time in reports.
pub const TIME_FORMAT: &str = "%Y-%m-%d.%H:%M:%S";

/// One ingested snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FlowBatch {
    /// End of the collection interval, epoch seconds.
    pub collected_at: i64,
    /// Size of the source dump in bytes. Informational only.
    #[serde(rename = "size")]
    pub byte_size: u64,
    pub sessions: Vec<SessionRecord>,
}

impl FlowBatch {
    pub fn new(collected_at: i64, sessions: Vec<SessionRecord>) -> Self {
        Self {
            collected_at,
            byte_size: 0,
            sessions,
        }
    }

    /// Parses a batch from its canonical JSON form and validates it.
    pub fn from_json(json: &str) -> Result<Self, IngestionError> {
        let batch: FlowBatch = serde_json::from_str(json)?;
        batch.validate()?;
        Ok(batch)
    }

    /// Checks that no session begins after the batch was collected.
    pub fn validate(&self) -> Result<(), IngestionError> {
        for (index, session) in self.sessions.iter().enumerate() {
            if session.begin_time > self.collected_at {
                return Err(IngestionError::BeginAfterCollect {
                    index,
                    begin_time: session.begin_time,
                    collected_at: self.collected_at,
                });
            }
        }
        Ok(())
    }
}

/// One observed local/remote pairing within a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SessionRecord {
    #[serde(rename = "localIP")]
    pub local_ip: u32,
    #[serde(rename = "remoteIP")]
    pub remote_ip: u32,
    pub begin_time: i64,
    #[serde(default)]
    pub tcp_tuples: Vec<ProtocolTuple>,
    #[serde(default)]
    pub udp_tuples: Vec<ProtocolTuple>,
    #[serde(default)]
    pub tcp_port_count: u64,
    #[serde(default)]
    pub udp_port_count: u64,
}

impl SessionRecord {
    pub fn new(local: Ipv4Addr, remote: Ipv4Addr, begin_time: i64) -> Self {
        Self {
            local_ip: ip_to_int(local),
            remote_ip: ip_to_int(remote),
            begin_time,
            ..Default::default()
        }
    }

    pub fn local_addr(&self) -> Ipv4Addr {
        int_to_ip(self.local_ip)
    }

    pub fn remote_addr(&self) -> Ipv4Addr {
        int_to_ip(self.remote_ip)
    }

    /// Iterates every tuple of both protocols.
    pub fn tuples(&self) -> impl Iterator<Item = &ProtocolTuple> {
        self.tcp_tuples.iter().chain(self.udp_tuples.iter())
    }
}

/// Packet and byte counters for one port-level flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProtocolTuple {
    pub packets_in: u64,
    pub packets_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// Local port, when the collector recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_port: Option<u16>,
    /// Remote port, when the collector recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_port: Option<u16>,
}

impl ProtocolTuple {
    pub fn new(packets_in: u64, packets_out: u64, bytes_in: u64, bytes_out: u64) -> Self {
        Self {
            packets_in,
            packets_out,
            bytes_in,
            bytes_out,
            local_port: None,
            remote_port: None,
        }
    }

    pub fn with_ports(mut self, local_port: u16, remote_port: u16) -> Self {
        self.local_port = Some(local_port);
        self.remote_port = Some(remote_port);
        self
    }

    /// Packets in both directions, saturating at `u64::MAX`.
    pub fn packets(&self) -> u64 {
        self.packets_in.saturating_add(self.packets_out)
    }

    /// Bytes in both directions, saturating at `u64::MAX`.
    pub fn octets(&self) -> u64 {
        self.bytes_in.saturating_add(self.bytes_out)
    }
}

/// Converts an IP-as-integer to an address.
pub fn int_to_ip(addr: u32) -> Ipv4Addr {
    Ipv4Addr::from(addr)
}

/// Converts an address to its IP-as-integer form.
pub fn ip_to_int(addr: Ipv4Addr) -> u32 {
    u32::from(addr)
}

/// Formats epoch seconds as a UTC report timestamp.
pub fn format_epoch(secs: i64) -> String {
    match DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.format(TIME_FORMAT).to_string(),
        None => secs.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_round_trip() {
        for text in ["0.0.0.0", "10.0.0.1", "192.168.1.254", "255.255.255.255"] {
            let addr: Ipv4Addr = text.parse().unwrap();
            assert_eq!(int_to_ip(ip_to_int(addr)), addr);
            assert_eq!(int_to_ip(ip_to_int(addr)).to_string(), text);
        }
        for value in [0u32, 1, 167_772_161, u32::MAX] {
            assert_eq!(ip_to_int(int_to_ip(value)), value);
        }
    }

    #[test]
    fn test_int_to_ip_octet_order() {
        assert_eq!(int_to_ip(167_772_161).to_string(), "10.0.0.1");
        assert_eq!(int_to_ip(134_744_072).to_string(), "8.8.8.8");
    }

    #[test]
    fn test_parse_canonical_batch() {
        let json = r#"{
            "collectedAt": 1622505600,
            "size": 4096,
            "sessions": [{
                "localIP": 167772161,
                "remoteIP": 134744072,
                "beginTime": 1622505540,
                "tcpTuples": [{"packetsIn": 5, "packetsOut": 3, "bytesIn": 500, "bytesOut": 300,
                               "localPort": 51000, "remotePort": 443}],
                "udpTuples": [],
                "tcpPortCount": 1,
                "udpPortCount": 0
            }]
        }"#;

        let batch = FlowBatch::from_json(json).unwrap();
        assert_eq!(batch.collected_at, 1_622_505_600);
        assert_eq!(batch.byte_size, 4096);
        assert_eq!(batch.sessions.len(), 1);

        let session = &batch.sessions[0];
        assert_eq!(session.local_addr().to_string(), "10.0.0.1");
        assert_eq!(session.remote_addr().to_string(), "8.8.8.8");
        assert_eq!(session.tcp_tuples[0].packets(), 8);
        assert_eq!(session.tcp_tuples[0].octets(), 800);
        assert_eq!(session.tcp_tuples[0].remote_port, Some(443));
    }

    #[test]
    fn test_alternate_schema_rejected() {
        // `watch-data` / `start-time` naming is not accepted alongside the canonical one.
        let json = r#"{"end-time": 10, "size": 0, "watch-data": []}"#;
        assert!(matches!(
            FlowBatch::from_json(json),
            Err(IngestionError::Malformed(_))
        ));

        let json = r#"{"collectedAt": 10, "size": 0, "sessions": [], "start-time": 5}"#;
        assert!(FlowBatch::from_json(json).is_err());
    }

    #[test]
    fn test_begin_after_collect_rejected() {
        let json = r#"{"collectedAt": 100, "size": 0,
                       "sessions": [{"localIP": 1, "remoteIP": 2, "beginTime": 101}]}"#;
        match FlowBatch::from_json(json) {
            Err(IngestionError::BeginAfterCollect { index, .. }) => assert_eq!(index, 0),
            other => panic!("expected BeginAfterCollect, got {:?}", other),
        }
    }

    #[test]
    fn test_format_epoch() {
        assert_eq!(format_epoch(0), "1970-01-01.00:00:00");
        assert_eq!(format_epoch(1_622_505_600), "2021-06-01.00:00:00");
    }
}
