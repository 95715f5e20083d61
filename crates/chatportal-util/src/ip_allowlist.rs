//! IPv4 allow-list matching for per-app access rules.
//!
//! Rule text is a comma separated list of dotted-quad addresses or CIDR
//! blocks (`10.0.0.0/8`). Blank rule text allows every client.

use std::net::Ipv4Addr;

/// An inclusive numeric address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    pub start: u32,
    pub end: u32,
}

impl IpRange {
    pub fn contains(&self, addr: u32) -> bool {
        self.start <= addr && addr <= self.end
    }
}

pub fn ipv4_to_u32(raw: &str) -> Option<u32> {
    raw.trim().parse::<Ipv4Addr>().ok().map(u32::from)
}

/// Parse a single rule into its range. `None` for malformed rules.
pub fn parse_rule(rule: &str) -> Option<IpRange> {
    let rule = rule.trim();
    match rule.split_once('/') {
        Some((addr, prefix)) => {
            let addr = ipv4_to_u32(addr)?;
            let prefix: u32 = prefix.trim().parse().ok()?;
            if prefix > 32 {
                return None;
            }
            let mask = if prefix == 0 {
                0
            } else {
                u32::MAX << (32 - prefix)
            };
            let start = addr & mask;
            Some(IpRange {
                start,
                end: start | !mask,
            })
        }
        None => {
            let addr = ipv4_to_u32(rule)?;
            Some(IpRange {
                start: addr,
                end: addr,
            })
        }
    }
}

/// Rules that fail to parse, for reporting back to whoever saved them.
pub fn invalid_rules(rules: &str) -> Vec<String> {
    rules
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .filter(|r| parse_rule(r).is_none())
        .map(str::to_string)
        .collect()
}

pub fn is_allowed(ip: &str, rules: &str) -> bool {
    if rules.trim().is_empty() {
        return true;
    }
    let Some(candidate) = ipv4_to_u32(ip) else {
        return false;
    };
    rules
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .filter_map(parse_rule)
        .any(|range| range.contains(candidate))
}
