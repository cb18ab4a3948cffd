//! Ranking stage: threshold, then descending sort by the selected metric.
//!
//! Ties are broken by ascending local address, then ascending remote
//! address, so equal-metric rows always come out in the same order.

use std::net::Ipv4Addr;

use crate::aggregate::{LocalHostRecord, PointToPointRecord, RawRecord};
use crate::error::QueryError;
use crate::settings::{SortKey, View};

/// A record that can be ranked by a numeric metric.
pub trait Ranked {
    const VIEW: View;

    /// The metric value for `key`, or `None` if this record type does not
    /// carry that metric.
    fn metric(&self, key: SortKey) -> Option<u64>;

    /// Secondary ordering for equal metrics.
    fn tie_key(&self) -> (Ipv4Addr, Option<Ipv4Addr>);
}

impl Ranked for PointToPointRecord {
    const VIEW: View = View::PointToPoint;

    fn metric(&self, key: SortKey) -> Option<u64> {
        match key {
            SortKey::TcpPorts => Some(self.tcp_ports),
            SortKey::TcpPackets => Some(self.tcp_packets),
            SortKey::TcpOctets => Some(self.tcp_octets),
            SortKey::UdpPorts => Some(self.udp_ports),
            SortKey::UdpPackets => Some(self.udp_packets),
            SortKey::UdpOctets => Some(self.udp_octets),
            SortKey::AllPorts => Some(self.all_ports),
            SortKey::AllPackets => Some(self.all_packets),
            SortKey::AllOctets => Some(self.all_octets),
            SortKey::Raw | SortKey::Connections | SortKey::Sessions => None,
        }
    }

    fn tie_key(&self) -> (Ipv4Addr, Option<Ipv4Addr>) {
        (self.local_ip, Some(self.remote_ip))
    }
}

impl Ranked for LocalHostRecord {
    const VIEW: View = View::LocalHost;

    fn metric(&self, key: SortKey) -> Option<u64> {
        match key {
            SortKey::Connections => Some(self.connections),
            SortKey::Sessions => Some(self.sessions),
            SortKey::TcpPorts => Some(self.tcp_ports),
            SortKey::TcpPackets => Some(self.tcp_packets),
            SortKey::TcpOctets => Some(self.tcp_octets),
            SortKey::UdpPorts => Some(self.udp_ports),
            SortKey::UdpPackets => Some(self.udp_packets),
            SortKey::UdpOctets => Some(self.udp_octets),
            SortKey::AllPackets => Some(self.all_packets),
            SortKey::AllOctets => Some(self.all_octets),
            // all-ports is reported as `sessions` in this view.
            SortKey::AllPorts | SortKey::Raw => None,
        }
    }

    fn tie_key(&self) -> (Ipv4Addr, Option<Ipv4Addr>) {
        (self.local_ip, None)
    }
}

/// Drops records whose metric is below `threshold` and sorts the rest
/// by that metric, largest first.
pub fn rank<T: Ranked>(records: Vec<T>, key: SortKey, threshold: u64) -> Result<Vec<T>, QueryError> {
    let mut scored = Vec::with_capacity(records.len());
    for record in records {
        let value = record
            .metric(key)
            .ok_or(QueryError::MetricUnavailable { key, view: T::VIEW })?;
        if value >= threshold {
            scored.push((value, record));
        }
    }

    scored.sort_by(|(va, a), (vb, b)| {
        vb.cmp(va).then_with(|| a.tie_key().cmp(&b.tie_key()))
    });

    Ok(scored.into_iter().map(|(_, record)| record).collect())
}

/// Orders raw rows newest batch first. Rows from the same batch keep
/// their original order.
pub fn sort_raw(rows: &mut [RawRecord]) {
    rows.sort_by(|a, b| b.collected_at.cmp(&a.collected_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProtocolTuple;

    fn p2p(local: &str, remote: &str, all_octets: u64) -> PointToPointRecord {
        PointToPointRecord {
            local_ip: local.parse().unwrap(),
            remote_ip: remote.parse().unwrap(),
            tcp_ports: 0,
            tcp_packets: 0,
            tcp_octets: all_octets,
            udp_ports: 0,
            udp_packets: 0,
            udp_octets: 0,
            all_ports: 0,
            all_packets: 0,
            all_octets,
        }
    }

    #[test]
    fn test_rank_descending_and_thresholded() {
        let records = vec![
            p2p("10.0.0.1", "1.1.1.1", 50),
            p2p("10.0.0.2", "1.1.1.1", 500),
            p2p("10.0.0.3", "1.1.1.1", 100),
            p2p("10.0.0.4", "1.1.1.1", 99),
        ];

        let ranked = rank(records, SortKey::AllOctets, 100).unwrap();
        let values: Vec<u64> = ranked.iter().map(|r| r.all_octets).collect();
        assert_eq!(values, vec![500, 100]);

        for pair in ranked.windows(2) {
            assert!(pair[0].all_octets >= pair[1].all_octets);
        }
        assert!(ranked.iter().all(|r| r.all_octets >= 100));
    }

    #[test]
    fn test_rank_threshold_is_inclusive() {
        let ranked = rank(vec![p2p("10.0.0.1", "1.1.1.1", 100)], SortKey::TcpOctets, 100).unwrap();
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn test_rank_ties_break_by_address() {
        let records = vec![
            p2p("10.0.0.9", "1.1.1.1", 10),
            p2p("10.0.0.1", "9.9.9.9", 10),
            p2p("10.0.0.1", "2.2.2.2", 10),
        ];

        let ranked = rank(records, SortKey::AllOctets, 0).unwrap();
        let order: Vec<String> = ranked
            .iter()
            .map(|r| format!("{}>{}", r.local_ip, r.remote_ip))
            .collect();
        assert_eq!(order, vec!["10.0.0.1>2.2.2.2", "10.0.0.1>9.9.9.9", "10.0.0.9>1.1.1.1"]);
    }

    #[test]
    fn test_rank_unavailable_metric() {
        let err = rank(vec![p2p("10.0.0.1", "1.1.1.1", 1)], SortKey::Connections, 0).unwrap_err();
        assert_eq!(
            err,
            QueryError::MetricUnavailable {
                key: SortKey::Connections,
                view: View::PointToPoint
            }
        );

        // An empty input has nothing to look up.
        let empty: Vec<PointToPointRecord> = Vec::new();
        assert!(rank(empty, SortKey::Connections, 0).unwrap().is_empty());
    }

    #[test]
    fn test_sort_raw_newest_first_stable() {
        let row = |collected_at: i64, tcp_port_count: u64| RawRecord {
            local_ip: "10.0.0.1".parse().unwrap(),
            remote_ip: "8.8.8.8".parse().unwrap(),
            end_time: String::new(),
            begin_time: String::new(),
            tcp_port_count,
            udp_port_count: 0,
            tcp_tuples: vec![ProtocolTuple::default()],
            udp_tuples: Vec::new(),
            collected_at,
        };

        let mut rows = vec![row(100, 1), row(300, 2), row(100, 3), row(200, 4)];
        sort_raw(&mut rows);
        let order: Vec<u64> = rows.iter().map(|r| r.tcp_port_count).collect();
        assert_eq!(order, vec![2, 4, 1, 3]);
    }
}
