//! Aggregation engine.
//!
//! Derives three progressively coarser views from filtered batches.
//!
//! # Raw
//! One [`RawRecord`] per surviving session, with addresses and times
//! formatted for display. No merging.
//!
//! # Point-to-Point
//! Sessions grouped by the ordered pair `(local, remote)`. Per group:
//!
//! - `tcp-ports += tcp_port_count`, `tcp-packets += Σ(in + out)`,
//!   `tcp-octets += Σ(bytes in + bytes out)`, and likewise for UDP;
//! - `all-* = tcp-* + udp-*`, computed once from the final totals.
//!
//! # Local-Host
//! Point-to-Point groups merged by local address. All nine counters are
//! summed, `connections` counts contributing peer groups, and the summed
//! `all-ports` is reported as `sessions`.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::Serialize;
use tracing::debug;

use crate::filter::FilteredBatch;
use crate::model::{format_epoch, int_to_ip, ProtocolTuple, SessionRecord};

/// Running port/packet/octet totals for one protocol. Sums saturate at
/// `u64::MAX`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub ports: u64,
    pub packets: u64,
    pub octets: u64,
}

impl Totals {
    /// Adds one session's port count and tuple counters.
    fn add_session(&mut self, port_count: u64, tuples: &[ProtocolTuple]) {
        self.ports = self.ports.saturating_add(port_count);
        for tuple in tuples {
            self.packets = self.packets.saturating_add(tuple.packets());
            self.octets = self.octets.saturating_add(tuple.octets());
        }
    }
}

impl std::ops::Add for Totals {
    type Output = Totals;

    fn add(self, rhs: Totals) -> Totals {
        Totals {
            ports: self.ports.saturating_add(rhs.ports),
            packets: self.packets.saturating_add(rhs.packets),
            octets: self.octets.saturating_add(rhs.octets),
        }
    }
}

/// A single session flattened to a top-level row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawRecord {
    pub local_ip: Ipv4Addr,
    pub remote_ip: Ipv4Addr,
    pub end_time: String,
    pub begin_time: String,
    pub tcp_port_count: u64,
    pub udp_port_count: u64,
    pub tcp_tuples: Vec<ProtocolTuple>,
    pub udp_tuples: Vec<ProtocolTuple>,
    #[serde(skip)]
    pub collected_at: i64,
}

impl RawRecord {
    fn from_session(collected_at: i64, session: &SessionRecord) -> Self {
        Self {
            local_ip: session.local_addr(),
            remote_ip: session.remote_addr(),
            end_time: format_epoch(collected_at),
            begin_time: format_epoch(session.begin_time),
            tcp_port_count: session.tcp_port_count,
            udp_port_count: session.udp_port_count,
            tcp_tuples: session.tcp_tuples.clone(),
            udp_tuples: session.udp_tuples.clone(),
            collected_at,
        }
    }
}

/// Traffic between one local and one remote address across all batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PointToPointRecord {
    pub local_ip: Ipv4Addr,
    pub remote_ip: Ipv4Addr,
    pub tcp_ports: u64,
    pub tcp_packets: u64,
    pub tcp_octets: u64,
    pub udp_ports: u64,
    pub udp_packets: u64,
    pub udp_octets: u64,
    pub all_ports: u64,
    pub all_packets: u64,
    pub all_octets: u64,
}

impl PointToPointRecord {
    fn from_totals(local: u32, remote: u32, tcp: Totals, udp: Totals) -> Self {
        let all = tcp + udp;
        Self {
            local_ip: int_to_ip(local),
            remote_ip: int_to_ip(remote),
            tcp_ports: tcp.ports,
            tcp_packets: tcp.packets,
            tcp_octets: tcp.octets,
            udp_ports: udp.ports,
            udp_packets: udp.packets,
            udp_octets: udp.octets,
            all_ports: all.ports,
            all_packets: all.packets,
            all_octets: all.octets,
        }
    }
}

/// Traffic from one local address to all of its peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LocalHostRecord {
    pub local_ip: Ipv4Addr,
    pub connections: u64,
    pub sessions: u64,
    pub tcp_ports: u64,
    pub tcp_packets: u64,
    pub tcp_octets: u64,
    pub udp_ports: u64,
    pub udp_packets: u64,
    pub udp_octets: u64,
    pub all_packets: u64,
    pub all_octets: u64,
}

impl LocalHostRecord {
    fn new(local_ip: Ipv4Addr) -> Self {
        Self {
            local_ip,
            connections: 0,
            sessions: 0,
            tcp_ports: 0,
            tcp_packets: 0,
            tcp_octets: 0,
            udp_ports: 0,
            udp_packets: 0,
            udp_octets: 0,
            all_packets: 0,
            all_octets: 0,
        }
    }

    /// Folds one peer group into this host.
    fn add_peer(&mut self, peer: &PointToPointRecord) {
        self.connections = self.connections.saturating_add(1);
        self.sessions = self.sessions.saturating_add(peer.all_ports);
        self.tcp_ports = self.tcp_ports.saturating_add(peer.tcp_ports);
        self.tcp_packets = self.tcp_packets.saturating_add(peer.tcp_packets);
        self.tcp_octets = self.tcp_octets.saturating_add(peer.tcp_octets);
        self.udp_ports = self.udp_ports.saturating_add(peer.udp_ports);
        self.udp_packets = self.udp_packets.saturating_add(peer.udp_packets);
        self.udp_octets = self.udp_octets.saturating_add(peer.udp_octets);
        self.all_packets = self.all_packets.saturating_add(peer.all_packets);
        self.all_octets = self.all_octets.saturating_add(peer.all_octets);
    }
}

/// Flattens every surviving session, in batch order.
pub fn raw_view(batches: &[FilteredBatch<'_>]) -> Vec<RawRecord> {
    batches
        .iter()
        .flat_map(|batch| {
            batch
                .sessions
                .iter()
                .map(move |session| RawRecord::from_session(batch.collected_at, session))
        })
        .collect()
}

/// Groups sessions by `(local, remote)`. Output is ordered by address pair.
pub fn point_to_point(batches: &[FilteredBatch<'_>]) -> Vec<PointToPointRecord> {
    let mut groups: BTreeMap<(u32, u32), (Totals, Totals)> = BTreeMap::new();

    for batch in batches {
        for session in &batch.sessions {
            let (tcp, udp) = groups
                .entry((session.local_ip, session.remote_ip))
                .or_default();
            tcp.add_session(session.tcp_port_count, &session.tcp_tuples);
            udp.add_session(session.udp_port_count, &session.udp_tuples);
        }
    }

    debug!("Point-to-point aggregation: {} groups", groups.len());

    groups
        .into_iter()
        .map(|((local, remote), (tcp, udp))| PointToPointRecord::from_totals(local, remote, tcp, udp))
        .collect()
}

/// Merges point-to-point groups by local address. Output is ordered by
/// local address.
pub fn local_hosts(peers: &[PointToPointRecord]) -> Vec<LocalHostRecord> {
    let mut hosts: BTreeMap<Ipv4Addr, LocalHostRecord> = BTreeMap::new();

    for peer in peers {
        hosts
            .entry(peer.local_ip)
            .or_insert_with(|| LocalHostRecord::new(peer.local_ip))
            .add_peer(peer);
    }

    debug!("Local-host aggregation: {} hosts", hosts.len());

    hosts.into_values().collect()
}
