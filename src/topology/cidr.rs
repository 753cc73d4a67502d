//! IPv4 CIDR arithmetic for subnet carving.

use std::fmt;
use std::net::Ipv4Addr;

/// An IPv4 network block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Block {
    network: u32,
    prefix: u8,
}

impl Ipv4Block {
    /// Parses `a.b.c.d/n`, normalising host bits away.
    #[must_use]
    pub fn parse(cidr: &str) -> Option<Self> {
        let (addr, prefix) = cidr.split_once('/')?;
        let addr: Ipv4Addr = addr.trim().parse().ok()?;
        let prefix: u8 = prefix.trim().parse().ok()?;
        if prefix > 32 {
            return None;
        }
        Some(Self {
            network: u32::from(addr) & netmask(prefix),
            prefix,
        })
    }

    /// Prefix length of the block.
    #[must_use]
    pub const fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Number of `/mask` blocks that fit in this block.
    #[must_use]
    pub fn capacity(&self, mask: u8) -> u64 {
        if mask < self.prefix || mask > 32 {
            return 0;
        }
        1u64 << (mask - self.prefix)
    }

    /// Returns the `index`-th `/mask` block inside this block.
    #[must_use]
    pub fn subdivide(&self, mask: u8, index: u64) -> Option<Self> {
        if index >= self.capacity(mask) {
            return None;
        }
        let size = 1u64 << (32 - mask);
        let start = u64::from(self.network) + index * size;
        Some(Self {
            network: u32::try_from(start).ok()?,
            prefix: mask,
        })
    }

    /// Returns true if the two blocks share any address.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let shorter = self.prefix.min(other.prefix);
        let mask = netmask(shorter);
        self.network & mask == other.network & mask
    }
}

const fn netmask(prefix: u8) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    }
}

impl fmt::Display for Ipv4Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", Ipv4Addr::from(self.network), self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalises_host_bits() {
        let block = Ipv4Block::parse("10.0.3.7/16").unwrap();
        assert_eq!(block.to_string(), "10.0.0.0/16");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Ipv4Block::parse("10.0.0.0").is_none());
        assert!(Ipv4Block::parse("10.0.0.0/33").is_none());
        assert!(Ipv4Block::parse("ten/8").is_none());
    }

    #[test]
    fn test_subdivide_sequential_24s() {
        let vpc = Ipv4Block::parse("10.0.0.0/16").unwrap();
        assert_eq!(vpc.capacity(24), 256);
        assert_eq!(vpc.subdivide(24, 0).unwrap().to_string(), "10.0.0.0/24");
        assert_eq!(vpc.subdivide(24, 5).unwrap().to_string(), "10.0.5.0/24");
        assert!(vpc.subdivide(24, 256).is_none());
        assert!(vpc.subdivide(8, 0).is_none());
    }

    #[test]
    fn test_overlaps() {
        let vpc = Ipv4Block::parse("10.0.0.0/16").unwrap();
        let a = vpc.subdivide(24, 1).unwrap();
        let b = vpc.subdivide(24, 2).unwrap();
        assert!(vpc.overlaps(&a));
        assert!(!a.overlaps(&b));
    }
}
