//! CIDR network values used by prefix-typed fields.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::VeritasError;

/// An IPv4 or IPv6 network, e.g. `192.168.0.0/23`.
///
/// A bare address parses as a host network (`/32` or `/128`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    addr: IpAddr,
    len: u8,
}

impl Cidr {
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    fn max_len(addr: &IpAddr) -> u8 {
        match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        }
    }

    fn bits(addr: &IpAddr) -> u128 {
        match addr {
            IpAddr::V4(a) => u32::from(*a) as u128,
            IpAddr::V6(a) => u128::from(*a),
        }
    }

    fn masked(&self, len: u8) -> u128 {
        let width = Self::max_len(&self.addr) as u32;
        let bits = Self::bits(&self.addr);
        if len == 0 {
            return 0;
        }
        let host_bits = width - len as u32;
        bits >> host_bits << host_bits
    }

    /// True when `other` lies entirely inside this network (equal included).
    pub fn contains(&self, other: &Cidr) -> bool {
        if Self::max_len(&self.addr) != Self::max_len(&other.addr) || other.len < self.len {
            return false;
        }
        self.masked(self.len) == other.masked(self.len)
    }
}

impl FromStr for Cidr {
    type Err = VeritasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VeritasError::ParseError {
            reason: format!("'{s}' is not a valid CIDR network"),
        };
        let (addr_part, len_part) = match s.trim().split_once('/') {
            Some((a, l)) => (a, Some(l)),
            None => (s.trim(), None),
        };
        let addr: IpAddr = addr_part.parse().map_err(|_| invalid())?;
        let max = Self::max_len(&addr);
        let len = match len_part {
            Some(l) => l.parse::<u8>().map_err(|_| invalid())?,
            None => max,
        };
        if len > max {
            return Err(invalid());
        }
        Ok(Self { addr, len })
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}
