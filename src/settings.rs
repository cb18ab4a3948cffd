//! Report settings: which metric to rank by, the minimum value a record
//! must reach, and the active filters.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::filter::FilterSpec;

/// Metric and view selector for a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum SortKey {
    Raw,
    Connections,
    #[default]
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

impl SortKey {
    pub const ALL: [SortKey; 12] = [
        SortKey::Raw,
        SortKey::Connections,
        SortKey::Sessions,
        SortKey::TcpPorts,
        SortKey::TcpPackets,
        SortKey::TcpOctets,
        SortKey::UdpPorts,
        SortKey::UdpPackets,
        SortKey::UdpOctets,
        SortKey::AllPorts,
        SortKey::AllPackets,
        SortKey::AllOctets,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
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

    /// The aggregation view this key ranks.
    pub fn view(&self) -> View {
        match self {
            Self::Raw => View::Raw,
            Self::Connections | Self::Sessions => View::LocalHost,
            _ => View::PointToPoint,
        }
    }

    /// Protocol group of a per-protocol metric key.
    pub fn protocol(&self) -> Option<ProtocolGroup> {
        match self {
            Self::TcpPorts | Self::TcpPackets | Self::TcpOctets => Some(ProtocolGroup::Tcp),
            Self::UdpPorts | Self::UdpPackets | Self::UdpOctets => Some(ProtocolGroup::Udp),
            Self::AllPorts | Self::AllPackets | Self::AllOctets => Some(ProtocolGroup::All),
            Self::Raw | Self::Connections | Self::Sessions => None,
        }
    }
}

impl FromStr for SortKey {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| QueryError::UnknownSortKey(s.to_string()))
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for SortKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SortKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Counter group selected by the prefix of a metric key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolGroup {
    Tcp,
    Udp,
    All,
}

/// Granularity of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// One row per observed session.
    Raw,
    /// One row per (local, remote) address pair.
    PointToPoint,
    /// One row per local address.
    LocalHost,
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::PointToPoint => write!(f, "point-to-point"),
            Self::LocalHost => write!(f, "local-host"),
        }
    }
}

/// Caller-held report configuration, read by every pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub sort_key: SortKey,
    pub threshold: u64,
    pub filters: FilterSpec,
}

impl Settings {
    pub fn new(sort_key: SortKey, threshold: u64) -> Self {
        Self {
            sort_key,
            threshold,
            filters: FilterSpec::default(),
        }
    }
}
