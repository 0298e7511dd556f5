//! Protocol identification and protocol bitmasks

use serde::{Deserialize, Serialize};
use std::fmt;

/// Decoded transport protocol of a traffic unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Protocol {
    /// IP without a recognized transport
    Ip = 0,
    /// ICMP / ICMPv6
    Icmp = 1,
    /// TCP
    Tcp = 2,
    /// UDP
    Udp = 3,
}

impl Protocol {
    /// Bit for this protocol in a [`ProtoBits`] mask
    #[inline(always)]
    pub const fn bit(self) -> ProtoBits {
        ProtoBits(1 << self as u8)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip => write!(f, "ip"),
            Self::Icmp => write!(f, "icmp"),
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Bitmask over {IP, ICMP, TCP, UDP}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ProtoBits(u8);

impl ProtoBits {
    /// Plain IP
    pub const IP: Self = Protocol::Ip.bit();
    /// ICMP
    pub const ICMP: Self = Protocol::Icmp.bit();
    /// TCP
    pub const TCP: Self = Protocol::Tcp.bit();
    /// UDP
    pub const UDP: Self = Protocol::Udp.bit();
    /// Every protocol
    pub const ALL: Self = Self(Self::IP.0 | Self::ICMP.0 | Self::TCP.0 | Self::UDP.0);

    /// Masks selected by the `proto` enumeration, in table order
    /// (`any | ip | icmp | tcp | udp`)
    pub const BY_CHOICE: [Self; 5] = [Self::ALL, Self::IP, Self::ICMP, Self::TCP, Self::UDP];

    /// Raw mask bits
    #[inline(always)]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Build from raw bits, dropping unknown bits
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Check whether `proto` is included
    #[inline(always)]
    pub const fn includes(self, proto: Protocol) -> bool {
        self.0 & proto.bit().0 != 0
    }

    /// Check whether every protocol is included
    pub const fn is_all(self) -> bool {
        self.0 == Self::ALL.0
    }
}

impl Default for ProtoBits {
    fn default() -> Self {
        Self::ALL
    }
}

impl std::ops::BitOr for ProtoBits {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
