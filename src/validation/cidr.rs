//! Address range parsing and overlap tests.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::validation::ValidationError;

/// An inclusive address interval derived from a CIDR or a bare address.
///
/// IPv4 and IPv6 ranges never overlap each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    v6: bool,
    start: u128,
    end: u128,
}

impl IpRange {
    pub fn overlaps(&self, other: &IpRange) -> bool {
        self.v6 == other.v6 && self.start <= other.end && other.start <= self.end
    }
}

impl FromStr for IpRange {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidRange(s.to_string());
        let (addr, prefix) = match s.trim().split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s.trim(), None),
        };
        let addr: IpAddr = addr.parse().map_err(|_| invalid())?;

        let (v6, bits, value) = match addr {
            IpAddr::V4(v4) => (false, 32u32, u128::from(u32::from(v4))),
            IpAddr::V6(v6) => (true, 128u32, u128::from(v6)),
        };
        let prefix = match prefix {
            Some(p) => p.parse::<u32>().map_err(|_| invalid())?,
            None => bits,
        };
        if prefix > bits {
            return Err(invalid());
        }

        let host_bits = bits - prefix;
        let host_mask = if host_bits == 128 {
            u128::MAX
        } else {
            (1u128 << host_bits) - 1
        };
        let start = value & !host_mask;
        Ok(IpRange {
            v6,
            start,
            end: start | host_mask,
        })
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.v6 {
            write!(
                f,
                "{}-{}",
                std::net::Ipv6Addr::from(self.start),
                std::net::Ipv6Addr::from(self.end)
            )
        } else {
            // Both bounds fit in 32 bits for v4 ranges.
            write!(
                f,
                "{}-{}",
                std::net::Ipv4Addr::from(self.start as u32),
                std::net::Ipv4Addr::from(self.end as u32)
            )
        }
    }
}
