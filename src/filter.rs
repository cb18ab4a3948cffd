//! Filter engine.
//!
//! Filters are configured as raw strings keyed by [`FilterName`] and
//! compiled into typed predicates once per query. Two rules hold for every
//! filter:
//!
//! - a filter that is not configured always passes;
//! - a filter whose value does not match its grammar also always passes,
//!   and compiling it yields a [`FilterError::InvalidFormat`] warning so the
//!   misconfiguration is visible.
//!
//! Batch-level filters (`end-time`, `latest`) test a batch's `collected_at`.
//! Session-level filters (`local-ip`, `remote-ip`, `begin-time`, and the two
//! port filters) test individual sessions.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::{FilterError, QueryError};
use crate::model::{FlowBatch, ProtocolTuple, SessionRecord};

/// Names of the supported filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterName {
    LocalIp,
    RemoteIp,
    SourcePort,
    DestinationPort,
    BeginTime,
    EndTime,
    Latest,
}

impl FilterName {
    pub const ALL: [FilterName; 7] = [
        FilterName::LocalIp,
        FilterName::RemoteIp,
        FilterName::SourcePort,
        FilterName::DestinationPort,
        FilterName::BeginTime,
        FilterName::EndTime,
        FilterName::Latest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalIp => "local-ip",
            Self::RemoteIp => "remote-ip",
            Self::SourcePort => "source-port",
            Self::DestinationPort => "destination-port",
            Self::BeginTime => "begin-time",
            Self::EndTime => "end-time",
            Self::Latest => "latest",
        }
    }

    /// Example of the literal format this filter accepts.
    pub fn expected_format(&self) -> &'static str {
        match self {
            Self::LocalIp | Self::RemoteIp => "a.b.c.d[/bits]",
            Self::SourcePort | Self::DestinationPort => "port, lo-hi or p1,p2,...",
            Self::BeginTime | Self::EndTime => "YYYY[MM[DD[HH[MM[SS]]]]]",
            Self::Latest => "seconds",
        }
    }
}

impl FromStr for FilterName {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| QueryError::UnknownFilter(s.to_string()))
    }
}

impl std::fmt::Display for FilterName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for FilterName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FilterName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Raw filter values as configured by the caller. Absent names mean
/// "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSpec(BTreeMap<FilterName, String>);

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: FilterName, value: impl Into<String>) {
        self.0.insert(name, value.into());
    }

    pub fn remove(&mut self, name: FilterName) -> Option<String> {
        self.0.remove(&name)
    }

    pub fn get(&self, name: FilterName) -> Option<&str> {
        self.0.get(&name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilterName, &str)> {
        self.0.iter().map(|(name, value)| (*name, value.as_str()))
    }
}

/// An IPv4 address constraint, optionally restricted to a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressMatch {
    addr: u32,
    prefix_len: Option<u8>,
}

impl AddressMatch {
    /// Parses `a.b.c.d` or `a.b.c.d/bits` with `bits` in 0..=32.
    pub fn parse(raw: &str) -> Option<Self> {
        let (addr, bits) = match raw.split_once('/') {
            Some((addr, bits)) => (addr, Some(bits)),
            None => (raw, None),
        };
        let addr = parse_dotted_quad(addr)?;
        let prefix_len = match bits {
            Some(bits) => {
                if bits.is_empty() || bits.len() > 2 || !bits.bytes().all(|b| b.is_ascii_digit())
                {
                    return None;
                }
                let bits: u8 = bits.parse().ok()?;
                if bits > 32 {
                    return None;
                }
                Some(bits)
            }
            None => None,
        };
        Some(Self { addr, prefix_len })
    }

    /// Left-aligned mask of `bits` ones.
    pub fn mask(bits: u8) -> u32 {
        u32::MAX.checked_shl(32 - u32::from(bits)).unwrap_or(0)
    }

    pub fn matches(&self, ip: u32) -> bool {
        match self.prefix_len {
            None => ip == self.addr,
            Some(bits) => {
                let mask = Self::mask(bits);
                ip & mask == self.addr & mask
            }
        }
    }
}

/// Four dot-separated decimal octets of one to three digits each. Leading
/// zeros are accepted and read as decimal (`010` is 10).
fn parse_dotted_quad(raw: &str) -> Option<u32> {
    let mut octets = raw.split('.');
    let mut addr = 0u32;
    for _ in 0..4 {
        let octet = octets.next()?;
        if octet.is_empty() || octet.len() > 3 || !octet.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value: u8 = octet.parse().ok()?;
        addr = (addr << 8) | u32::from(value);
    }
    if octets.next().is_some() {
        return None;
    }
    Some(addr)
}

/// A set of ports: single values and inclusive ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    ranges: Vec<(u16, u16)>,
}

impl PortSpec {
    /// Parses `p`, `lo-hi`, or a comma-separated list of either.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut ranges = Vec::new();
        for item in raw.split(',') {
            let range = match item.split_once('-') {
                Some((lo, hi)) => {
                    let (lo, hi) = (parse_port(lo)?, parse_port(hi)?);
                    if lo > hi {
                        return None;
                    }
                    (lo, hi)
                }
                None => {
                    let port = parse_port(item)?;
                    (port, port)
                }
            };
            ranges.push(range);
        }
        Some(Self { ranges })
    }

    pub fn contains(&self, port: u16) -> bool {
        self.ranges.iter().any(|&(lo, hi)| lo <= port && port <= hi)
    }
}

fn parse_port(raw: &str) -> Option<u16> {
    if raw.is_empty() || raw.len() > 5 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// A timestamp given to some prefix of `YYYYMMDDHHMMSS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialTime {
    year: i32,
    month: Option<u32>,
    day: Option<u32>,
    hour: Option<u32>,
    minute: Option<u32>,
    second: Option<u32>,
}

impl PartialTime {
    /// Parses a four-digit year followed by up to five fields of one or two
    /// digits each. Each field takes two digits while two remain.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() < 4 || raw.len() > 14 || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let year: i32 = raw[..4].parse().ok()?;
        let mut fields: [Option<u32>; 5] = [None; 5];
        let mut rest = &raw[4..];
        for field in fields.iter_mut() {
            if rest.is_empty() {
                break;
            }
            let width = rest.len().min(2);
            *field = Some(rest[..width].parse().ok()?);
            rest = &rest[width..];
        }
        if !rest.is_empty() {
            return None;
        }
        let [month, day, hour, minute, second] = fields;
        Some(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    /// Earliest instant consistent with the given prefix, epoch seconds.
    pub fn floor(&self) -> Option<i64> {
        let date = NaiveDate::from_ymd_opt(self.year, self.month.unwrap_or(1), self.day.unwrap_or(1))?;
        let dt = date.and_hms_opt(
            self.hour.unwrap_or(0),
            self.minute.unwrap_or(0),
            self.second.unwrap_or(0),
        )?;
        Some(dt.and_utc().timestamp())
    }

    /// Latest instant consistent with the given prefix, epoch seconds.
    pub fn ceiling(&self) -> Option<i64> {
        let month = self.month.unwrap_or(12);
        let day = match self.day {
            Some(day) => day,
            None => last_day_of_month(self.year, month)?,
        };
        let date = NaiveDate::from_ymd_opt(self.year, month, day)?;
        let dt = date.and_hms_opt(
            self.hour.unwrap_or(23),
            self.minute.unwrap_or(59),
            self.second.unwrap_or(59),
        )?;
        Some(dt.and_utc().timestamp())
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    first_of_next.pred_opt().map(|d| chrono::Datelike::day(&d))
}

/// A batch that survived filtering, borrowing its surviving sessions.
#[derive(Debug, Clone)]
pub struct FilteredBatch<'a> {
    pub collected_at: i64,
    pub byte_size: u64,
    pub sessions: Vec<&'a SessionRecord>,
}

/// Compiled filters, ready to evaluate.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    local_ip: Option<AddressMatch>,
    remote_ip: Option<AddressMatch>,
    source_port: Option<PortSpec>,
    destination_port: Option<PortSpec>,
    /// Sessions must begin at or after this instant.
    begin_floor: Option<i64>,
    /// Batches must be collected at or before this instant.
    end_ceiling: Option<i64>,
    /// Batches must be collected strictly after this instant.
    latest_cutoff: Option<i64>,
}

impl Filters {
    /// Compiles a filter spec. Values that fail to parse are left
    /// unconstrained and returned as warnings.
    pub fn compile(spec: &FilterSpec, now: DateTime<Utc>) -> (Self, Vec<FilterError>) {
        let mut filters = Self::default();
        let mut warnings = Vec::new();

        for (name, raw) in spec.iter() {
            let compiled = match name {
                FilterName::LocalIp => AddressMatch::parse(raw).map(|m| filters.local_ip = Some(m)),
                FilterName::RemoteIp => {
                    AddressMatch::parse(raw).map(|m| filters.remote_ip = Some(m))
                }
                FilterName::SourcePort => {
                    PortSpec::parse(raw).map(|p| filters.source_port = Some(p))
                }
                FilterName::DestinationPort => {
                    PortSpec::parse(raw).map(|p| filters.destination_port = Some(p))
                }
                FilterName::BeginTime => PartialTime::parse(raw)
                    .and_then(|t| t.floor())
                    .map(|floor| filters.begin_floor = Some(floor)),
                FilterName::EndTime => PartialTime::parse(raw)
                    .and_then(|t| t.ceiling())
                    .map(|ceiling| filters.end_ceiling = Some(ceiling)),
                FilterName::Latest => parse_seconds(raw).map(|secs| {
                    filters.latest_cutoff = Some(now.timestamp().saturating_sub(secs))
                }),
            };

            if compiled.is_none() {
                let error = FilterError::InvalidFormat {
                    filter: name,
                    value: raw.to_string(),
                    expected: name.expected_format(),
                };
                warn!("{}", error);
                warnings.push(error);
            }
        }

        (filters, warnings)
    }

    /// Oldest excluded collection instant for `latest`, if set.
    pub fn latest_cutoff(&self) -> Option<i64> {
        self.latest_cutoff
    }

    /// Single-field check. `value` is an address as integer for the IP
    /// filters, a port for the port filters, and epoch seconds for the
    /// time filters.
    pub fn passes(&self, name: FilterName, value: i64) -> bool {
        match name {
            FilterName::LocalIp => address_passes(self.local_ip.as_ref(), value),
            FilterName::RemoteIp => address_passes(self.remote_ip.as_ref(), value),
            FilterName::SourcePort => port_passes(self.source_port.as_ref(), value),
            FilterName::DestinationPort => port_passes(self.destination_port.as_ref(), value),
            FilterName::BeginTime => self.begin_floor.map_or(true, |floor| value >= floor),
            FilterName::EndTime => self.end_ceiling.map_or(true, |ceiling| value <= ceiling),
            FilterName::Latest => self.latest_cutoff.map_or(true, |cutoff| value > cutoff),
        }
    }

    /// Batch-level filters.
    pub fn keep_batch(&self, batch: &FlowBatch) -> bool {
        self.passes(FilterName::EndTime, batch.collected_at)
            && self.passes(FilterName::Latest, batch.collected_at)
    }

    /// Session-level filters.
    pub fn keep_session(&self, session: &SessionRecord) -> bool {
        self.passes(FilterName::LocalIp, i64::from(session.local_ip))
            && self.passes(FilterName::RemoteIp, i64::from(session.remote_ip))
            && self.passes(FilterName::BeginTime, session.begin_time)
            && self.session_ports_pass(FilterName::SourcePort, session, |t| t.local_port)
            && self.session_ports_pass(FilterName::DestinationPort, session, |t| t.remote_port)
    }

    /// A session without port-annotated tuples has nothing to test and
    /// passes; otherwise at least one annotated tuple must match.
    fn session_ports_pass(
        &self,
        name: FilterName,
        session: &SessionRecord,
        port_of: impl Fn(&ProtocolTuple) -> Option<u16>,
    ) -> bool {
        let mut ports = session.tuples().filter_map(port_of).peekable();
        if ports.peek().is_none() {
            return true;
        }
        ports.any(|port| self.passes(name, i64::from(port)))
    }

    /// Runs every filter over the batches, in order. Rejected batches are
    /// dropped; surviving batches keep only their surviving sessions.
    pub fn apply<'a>(&self, batches: impl IntoIterator<Item = &'a FlowBatch>) -> Vec<FilteredBatch<'a>> {
        let filtered: Vec<FilteredBatch<'a>> = batches
            .into_iter()
            .filter(|batch| self.keep_batch(batch))
            .map(|batch| FilteredBatch {
                collected_at: batch.collected_at,
                byte_size: batch.byte_size,
                sessions: batch
                    .sessions
                    .iter()
                    .filter(|session| self.keep_session(session))
                    .collect(),
            })
            .collect();

        trace!(
            "Filtering kept {} batches, {} sessions",
            filtered.len(),
            filtered.iter().map(|b| b.sessions.len()).sum::<usize>()
        );
        filtered
    }
}

fn address_passes(filter: Option<&AddressMatch>, value: i64) -> bool {
    match filter {
        None => true,
        Some(m) => u32::try_from(value).map_or(false, |ip| m.matches(ip)),
    }
}

fn port_passes(filter: Option<&PortSpec>, value: i64) -> bool {
    match filter {
        None => true,
        Some(spec) => u16::try_from(value).map_or(false, |port| spec.contains(port)),
    }
}

fn parse_seconds(raw: &str) -> Option<i64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ip_to_int;
    use chrono::TimeZone;
    use std::net::Ipv4Addr;

    fn ip(s: &str) -> i64 {
        i64::from(ip_to_int(s.parse().unwrap()))
    }

    fn epoch(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap().timestamp()
    }

    fn compile(name: FilterName, raw: &str) -> (Filters, Vec<FilterError>) {
        let mut spec = FilterSpec::new();
        spec.set(name, raw);
        Filters::compile(&spec, Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    }

    #[test]
    fn test_absent_filter_passes() {
        let (filters, warnings) = Filters::compile(&FilterSpec::new(), Utc::now());
        assert!(warnings.is_empty());
        for name in FilterName::ALL {
            assert!(filters.passes(name, 0));
            assert!(filters.passes(name, 12345));
        }
    }

    #[test]
    fn test_exact_ip_match() {
        let (filters, _) = compile(FilterName::LocalIp, "10.0.0.1");
        assert!(filters.passes(FilterName::LocalIp, ip("10.0.0.1")));
        assert!(!filters.passes(FilterName::LocalIp, ip("10.0.0.2")));
        // Only local-ip is constrained.
        assert!(filters.passes(FilterName::RemoteIp, ip("10.0.0.2")));
    }

    #[test]
    fn test_cidr_match() {
        let (filters, warnings) = compile(FilterName::LocalIp, "10.0.0.0/8");
        assert!(warnings.is_empty());
        assert!(filters.passes(FilterName::LocalIp, ip("10.1.2.3")));
        assert!(!filters.passes(FilterName::LocalIp, ip("11.0.0.0")));
    }

    #[test]
    fn test_cidr_edges() {
        let (filters, _) = compile(FilterName::RemoteIp, "192.168.1.77/0");
        assert!(filters.passes(FilterName::RemoteIp, ip("8.8.8.8")));

        let (filters, _) = compile(FilterName::RemoteIp, "192.168.1.77/32");
        assert!(filters.passes(FilterName::RemoteIp, ip("192.168.1.77")));
        assert!(!filters.passes(FilterName::RemoteIp, ip("192.168.1.76")));

        assert_eq!(AddressMatch::mask(0), 0);
        assert_eq!(AddressMatch::mask(8), 0xff00_0000);
        assert_eq!(AddressMatch::mask(32), u32::MAX);
    }

    #[test]
    fn test_leading_zero_octets_accepted() {
        let (filters, warnings) = compile(FilterName::LocalIp, "010.000.000.001");
        assert!(warnings.is_empty());
        assert!(filters.passes(FilterName::LocalIp, ip("10.0.0.1")));

        let (filters, warnings) = compile(FilterName::RemoteIp, "192.168.001.000/24");
        assert!(warnings.is_empty());
        assert!(filters.passes(FilterName::RemoteIp, ip("192.168.1.200")));
    }

    #[test]
    fn test_invalid_ip_fails_open_with_warning() {
        for raw in ["10.0.0", "10.0.0.256", "10.0.0.0/33", "10.0.0.0/", "host", "10.0.0.1.2", "0010.0.0.1", "10..0.1"] {
            let (filters, warnings) = compile(FilterName::LocalIp, raw);
            assert_eq!(warnings.len(), 1, "expected a warning for {}", raw);
            assert!(matches!(
                &warnings[0],
                FilterError::InvalidFormat { filter: FilterName::LocalIp, .. }
            ));
            assert!(filters.passes(FilterName::LocalIp, ip("1.2.3.4")));
        }
    }

    // Single port, inclusive range and comma list.
    #[test]
    fn test_port_single() {
        let (filters, _) = compile(FilterName::SourcePort, "443");
        assert!(filters.passes(FilterName::SourcePort, 443));
        assert!(!filters.passes(FilterName::SourcePort, 80));
    }

    #[test]
    fn test_port_range_inclusive() {
        let (filters, _) = compile(FilterName::DestinationPort, "1000-2000");
        assert!(filters.passes(FilterName::DestinationPort, 1000));
        assert!(filters.passes(FilterName::DestinationPort, 1500));
        assert!(filters.passes(FilterName::DestinationPort, 2000));
        assert!(!filters.passes(FilterName::DestinationPort, 999));
        assert!(!filters.passes(FilterName::DestinationPort, 2001));
    }

    #[test]
    fn test_port_list() {
        let (filters, _) = compile(FilterName::DestinationPort, "22,80,443");
        for port in [22, 80, 443] {
            assert!(filters.passes(FilterName::DestinationPort, port));
        }
        assert!(!filters.passes(FilterName::DestinationPort, 8080));
    }

    #[test]
    fn test_invalid_port_spec_fails_open() {
        for raw in ["", "http", "70000", "2000-1000", "22,,80", "-5"] {
            let (filters, warnings) = compile(FilterName::SourcePort, raw);
            assert_eq!(warnings.len(), 1, "expected a warning for {:?}", raw);
            assert!(filters.passes(FilterName::SourcePort, 1));
        }
    }

    #[test]
    fn test_session_port_filter() {
        let (filters, _) = compile(FilterName::DestinationPort, "443");

        let mut https = SessionRecord::new("10.0.0.1".parse().unwrap(), "1.1.1.1".parse().unwrap(), 0);
        https.tcp_tuples.push(ProtocolTuple::new(1, 1, 1, 1).with_ports(50000, 443));
        assert!(filters.keep_session(&https));

        let mut ssh = https.clone();
        ssh.tcp_tuples = vec![ProtocolTuple::new(1, 1, 1, 1).with_ports(50000, 22)];
        assert!(!filters.keep_session(&ssh));

        // No port information recorded: nothing to reject on.
        let mut bare = https.clone();
        bare.tcp_tuples = vec![ProtocolTuple::new(1, 1, 1, 1)];
        assert!(filters.keep_session(&bare));
    }

    #[test]
    fn test_partial_time_parse() {
        let t = PartialTime::parse("2021").unwrap();
        assert_eq!(t.year, 2021);
        assert_eq!(t.month, None);

        let t = PartialTime::parse("20210615").unwrap();
        assert_eq!((t.month, t.day, t.hour), (Some(6), Some(15), None));

        // Trailing single digit becomes its own field.
        let t = PartialTime::parse("20211").unwrap();
        assert_eq!(t.month, Some(1));

        assert!(PartialTime::parse("202").is_none());
        assert!(PartialTime::parse("20210101000000").is_some());
        assert!(PartialTime::parse("202101010000001").is_none());
        assert!(PartialTime::parse("2021-06").is_none());
    }

    #[test]
    fn test_begin_time_year_floor() {
        let (filters, _) = compile(FilterName::BeginTime, "2021");
        assert!(filters.passes(FilterName::BeginTime, epoch(2021, 6, 1, 0, 0, 0)));
        assert!(filters.passes(FilterName::BeginTime, epoch(2021, 1, 1, 0, 0, 0)));
        assert!(!filters.passes(FilterName::BeginTime, epoch(2020, 12, 31, 0, 0, 0)));
        assert!(!filters.passes(FilterName::BeginTime, epoch(2020, 12, 31, 23, 59, 59)));
    }

    #[test]
    fn test_end_time_fills_every_field_to_max() {
        let t = PartialTime::parse("2021").unwrap();
        assert_eq!(t.ceiling(), Some(epoch(2021, 12, 31, 23, 59, 59)));

        // Minutes fill to 59, not 0.
        let t = PartialTime::parse("2021061512").unwrap();
        assert_eq!(t.ceiling(), Some(epoch(2021, 6, 15, 12, 59, 59)));

        // Day fills to the real end of the month.
        let t = PartialTime::parse("202102").unwrap();
        assert_eq!(t.ceiling(), Some(epoch(2021, 2, 28, 23, 59, 59)));
        let t = PartialTime::parse("202402").unwrap();
        assert_eq!(t.ceiling(), Some(epoch(2024, 2, 29, 23, 59, 59)));
        let t = PartialTime::parse("202104").unwrap();
        assert_eq!(t.ceiling(), Some(epoch(2021, 4, 30, 23, 59, 59)));
    }

    #[test]
    fn test_end_time_filter() {
        let (filters, _) = compile(FilterName::EndTime, "202106");
        assert!(filters.passes(FilterName::EndTime, epoch(2021, 6, 30, 23, 59, 59)));
        assert!(!filters.passes(FilterName::EndTime, epoch(2021, 7, 1, 0, 0, 0)));
    }

    #[test]
    fn test_impossible_time_fails_open() {
        for raw in ["202113", "20210231", "2021010125"] {
            let (filters, warnings) = compile(FilterName::BeginTime, raw);
            assert_eq!(warnings.len(), 1, "expected a warning for {}", raw);
            assert!(filters.passes(FilterName::BeginTime, 0));
        }
    }

    #[test]
    fn test_latest_window() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut spec = FilterSpec::new();
        spec.set(FilterName::Latest, "60");
        let (filters, _) = Filters::compile(&spec, now);

        assert!(filters.passes(FilterName::Latest, now.timestamp() - 10));
        assert!(!filters.passes(FilterName::Latest, now.timestamp() - 120));
        // Exactly N seconds old is outside the window.
        assert!(!filters.passes(FilterName::Latest, now.timestamp() - 60));
    }

    #[test]
    fn test_latest_invalid_fails_open() {
        let (filters, warnings) = compile(FilterName::Latest, "1m");
        assert_eq!(warnings.len(), 1);
        assert!(filters.passes(FilterName::Latest, 0));
    }

    #[test]
    fn test_apply_keeps_batch_order_and_drops_sessions() {
        let local: Ipv4Addr = "10.0.0.1".parse().unwrap();
        let other: Ipv4Addr = "172.16.0.1".parse().unwrap();
        let remote: Ipv4Addr = "8.8.8.8".parse().unwrap();
        let batches = vec![
            FlowBatch::new(100, vec![SessionRecord::new(local, remote, 50)]),
            FlowBatch::new(200, vec![
                SessionRecord::new(other, remote, 150),
                SessionRecord::new(local, remote, 150),
            ]),
        ];

        let mut spec = FilterSpec::new();
        spec.set(FilterName::LocalIp, "10.0.0.0/8");
        let (filters, _) = Filters::compile(&spec, Utc::now());
        let filtered = filters.apply(&batches);

        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].collected_at, 100);
        assert_eq!(filtered[1].sessions.len(), 1);
        assert_eq!(filtered[1].sessions[0].local_addr(), local);
    }

    #[test]
    fn test_filter_name_parse() {
        for name in FilterName::ALL {
            assert_eq!(name.as_str().parse::<FilterName>().unwrap(), name);
        }
        assert_eq!(
            "port".parse::<FilterName>(),
            Err(QueryError::UnknownFilter("port".to_string()))
        );
    }
}
