//! Column sets and human-readable labels for report fields.

use crate::aggregate::{LocalHostRecord, PointToPointRecord, RawRecord};
use crate::model::ProtocolTuple;
use crate::settings::{ProtocolGroup, SortKey};

/// A report column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    LocalIp,
    RemoteIp,
    EndTime,
    BeginTime,
    TcpPortCount,
    UdpPortCount,
    TcpTuples,
    UdpTuples,
    Connections,
    Sessions,
    TcpPorts,
    TcpPackets,
    TcpOctets,
    UdpPorts,
    UdpPackets,
    UdpOctets,
    AllPorts,
    AllPackets,
    AllOctets,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalIp => "local-ip",
            Self::RemoteIp => "remote-ip",
            Self::EndTime => "end-time",
            Self::BeginTime => "begin-time",
            Self::TcpPortCount => "tcp-port-count",
            Self::UdpPortCount => "udp-port-count",
            Self::TcpTuples => "tcp-tuples",
            Self::UdpTuples => "udp-tuples",
            Self::Connections => "connections",
            Self::Sessions => "sessions",
            Self::TcpPorts => "tcp-ports",
            Self::TcpPackets => "tcp-packets",
            Self::TcpOctets => "tcp-octets",
            Self::UdpPorts => "udp-ports",
            Self::UdpPackets => "udp-packets",
            Self::UdpOctets => "udp-octets",
            Self::AllPorts => "all-ports",
            Self::AllPackets => "all-packets",
            Self::AllOctets => "all-octets",
        }
    }

    pub fn label(&self) -> String {
        label(self.as_str())
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const RAW_FIELDS: [Field; 8] = [
    Field::LocalIp,
    Field::RemoteIp,
    Field::EndTime,
    Field::BeginTime,
    Field::TcpPortCount,
    Field::UdpPortCount,
    Field::TcpTuples,
    Field::UdpTuples,
];
const TCP_FIELDS: [Field; 3] = [Field::TcpPorts, Field::TcpPackets, Field::TcpOctets];
const UDP_FIELDS: [Field; 3] = [Field::UdpPorts, Field::UdpPackets, Field::UdpOctets];
const ALL_FIELDS: [Field; 3] = [Field::AllPorts, Field::AllPackets, Field::AllOctets];

fn group_fields(group: ProtocolGroup) -> &'static [Field] {
    match group {
        ProtocolGroup::Tcp => &TCP_FIELDS,
        ProtocolGroup::Udp => &UDP_FIELDS,
        ProtocolGroup::All => &ALL_FIELDS,
    }
}

/// Ordered columns for a sort key.
///
/// With `headers` set, per-protocol keys show only their own protocol's
/// counters; otherwise they show every counter.
pub fn fields_for(key: SortKey, headers: bool) -> Vec<Field> {
    match (key, key.protocol()) {
        (SortKey::Raw, _) => RAW_FIELDS.to_vec(),
        (_, None) => {
            let mut fields = vec![Field::LocalIp, Field::Connections, Field::Sessions];
            fields.extend_from_slice(&ALL_FIELDS[1..]);
            fields.extend_from_slice(&TCP_FIELDS);
            fields.extend_from_slice(&UDP_FIELDS);
            fields
        }
        (_, Some(group)) => {
            let mut fields = vec![Field::LocalIp, Field::RemoteIp];
            if headers {
                fields.extend_from_slice(group_fields(group));
            } else {
                fields.extend_from_slice(&TCP_FIELDS);
                fields.extend_from_slice(&UDP_FIELDS);
                fields.extend_from_slice(&ALL_FIELDS);
            }
            fields
        }
    }
}

/// Human-readable label for a field, filter or setting name. Unknown names
/// are title-cased.
pub fn label(name: &str) -> String {
    let known = match name {
        "sort-key" => "Sort Key",
        "threshold" => "Threshold",
        "local-ip" => "Local IP",
        "remote-ip" => "Remote IP",
        "source-port" => "Source Port",
        "destination-port" => "Destination Port",
        "begin-time" => "Beginning Time",
        "end-time" => "Ending Time",
        "latest" => "Latest Time",
        "tcp-tuples" => "TCP Ports",
        "udp-tuples" => "UDP Ports",
        "tcp-port-count" | "tcp-ports" => "# TCP Ports",
        "udp-port-count" | "udp-ports" => "# UDP Ports",
        "tcp-packets" => "# TCP Packets",
        "tcp-octets" => "# TCP Octets",
        "udp-packets" => "# UDP Packets",
        "udp-octets" => "# UDP Octets",
        "all-ports" => "# All Ports",
        "all-packets" => "# All Packets",
        "all-octets" => "# All Octets",
        _ => return title_case(name),
    };
    known.to_string()
}

fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut word_start = true;
    for c in name.chars() {
        if c.is_alphabetic() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}

/// Field lookup for rendering a record as a table row.
pub trait Columns {
    fn value(&self, field: Field) -> Option<String>;
}

impl Columns for RawRecord {
    fn value(&self, field: Field) -> Option<String> {
        Some(match field {
            Field::LocalIp => self.local_ip.to_string(),
            Field::RemoteIp => self.remote_ip.to_string(),
            Field::EndTime => self.end_time.clone(),
            Field::BeginTime => self.begin_time.clone(),
            Field::TcpPortCount => self.tcp_port_count.to_string(),
            Field::UdpPortCount => self.udp_port_count.to_string(),
            Field::TcpTuples => summarize_tuples(&self.tcp_tuples),
            Field::UdpTuples => summarize_tuples(&self.udp_tuples),
            _ => return None,
        })
    }
}

impl Columns for PointToPointRecord {
    fn value(&self, field: Field) -> Option<String> {
        let n = match field {
            Field::LocalIp => return Some(self.local_ip.to_string()),
            Field::RemoteIp => return Some(self.remote_ip.to_string()),
            Field::TcpPorts => self.tcp_ports,
            Field::TcpPackets => self.tcp_packets,
            Field::TcpOctets => self.tcp_octets,
            Field::UdpPorts => self.udp_ports,
            Field::UdpPackets => self.udp_packets,
            Field::UdpOctets => self.udp_octets,
            Field::AllPorts => self.all_ports,
            Field::AllPackets => self.all_packets,
            Field::AllOctets => self.all_octets,
            _ => return None,
        };
        Some(n.to_string())
    }
}

impl Columns for LocalHostRecord {
    fn value(&self, field: Field) -> Option<String> {
        let n = match field {
            Field::LocalIp => return Some(self.local_ip.to_string()),
            Field::Connections => self.connections,
            Field::Sessions => self.sessions,
            Field::TcpPorts => self.tcp_ports,
            Field::TcpPackets => self.tcp_packets,
            Field::TcpOctets => self.tcp_octets,
            Field::UdpPorts => self.udp_ports,
            Field::UdpPackets => self.udp_packets,
            Field::UdpOctets => self.udp_octets,
            Field::AllPackets => self.all_packets,
            Field::AllOctets => self.all_octets,
            _ => return None,
        };
        Some(n.to_string())
    }
}

/// Compact "tuples: packets/octets" summary.
fn summarize_tuples(tuples: &[ProtocolTuple]) -> String {
    let packets = tuples
        .iter()
        .fold(0u64, |acc, t| acc.saturating_add(t.packets()));
    let octets = tuples
        .iter()
        .fold(0u64, |acc, t| acc.saturating_add(t.octets()));
    format!("{}: {}p/{}B", tuples.len(), packets, octets)
}
