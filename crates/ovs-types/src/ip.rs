//! Host address parsing for anti-spoofing matches.
//!
//! Allowed-address lists arrive either as bare addresses or in CIDR form with
//! a full host prefix (`10.0.0.1/32`, `fe80::1/128`). Anything wider cannot be
//! expressed as an exact `arp_spa` / `ipv6_nd_target` match and is rejected.

use crate::ParseError;
use std::net::{Ipv4Addr, Ipv6Addr};

fn split_host(s: &str, host_len: u8) -> Result<&str, ParseError> {
    match s.split_once('/') {
        None => Ok(s),
        Some((addr, len)) => match len.parse::<u8>() {
            Ok(len) if len == host_len => Ok(addr),
            _ => Err(ParseError::InvalidHostAddress(s.to_string())),
        },
    }
}

/// Parses an IPv4 host address, accepting an optional `/32` suffix.
pub fn parse_ipv4_host(s: &str) -> Result<Ipv4Addr, ParseError> {
    split_host(s.trim(), 32)?
        .parse()
        .map_err(|_| ParseError::InvalidHostAddress(s.to_string()))
}

/// Parses an IPv6 host address, accepting an optional `/128` suffix.
pub fn parse_ipv6_host(s: &str) -> Result<Ipv6Addr, ParseError> {
    split_host(s.trim(), 128)?
        .parse()
        .map_err(|_| ParseError::InvalidHostAddress(s.to_string()))
}
