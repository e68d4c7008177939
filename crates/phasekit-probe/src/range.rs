//! Half-open instruction address ranges used to filter retire events.

use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

/// Address range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AddrRange {
    pub start: u64,
    pub end: u64,
}

impl AddrRange {
    /// Create a range, rejecting `start > end`.
    pub const fn new(start: u64, end: u64) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::MalformedRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Range matching no address.
    pub const fn empty() -> Self {
        Self { start: 0, end: 0 }
    }

    /// Range matching every address below `u64::MAX`.
    pub const fn all() -> Self {
        Self {
            start: 0,
            end: u64::MAX,
        }
    }

    #[inline]
    pub const fn contains(&self, pc: u64) -> bool {
        pc >= self.start && pc < self.end
    }

    /// Whether every address of `other` is also in `self`.
    pub const fn covers(&self, other: &Self) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub const fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Check the invariant for ranges built from public fields.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.start > self.end {
            return Err(ConfigError::MalformedRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

impl Default for AddrRange {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for AddrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}..{:#x}", self.start, self.end)
    }
}

/// Parses `START..END` with hex bounds (`0x` prefix optional).
impl FromStr for AddrRange {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidRange(s.to_string());
        let (start, end) = s.trim().split_once("..").ok_or_else(invalid)?;
        let parse_hex = |part: &str| {
            let part = part.trim().trim_start_matches("0x").trim_start_matches("0X");
            u64::from_str_radix(part, 16).map_err(|_| invalid())
        };
        Self::new(parse_hex(start)?, parse_hex(end)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_half_open() {
        let range = AddrRange::new(0x1000, 0x2000).unwrap();
        assert!(range.contains(0x1000));
        assert!(range.contains(0x1fff));
        assert!(!range.contains(0x2000));
        assert!(!range.contains(0xfff));
        assert_eq!(range.len(), 0x1000);
    }

    #[test]
    fn test_malformed_range_rejected() {
        assert_eq!(
            AddrRange::new(0x20, 0x10),
            Err(ConfigError::MalformedRange {
                start: 0x20,
                end: 0x10
            })
        );
        let range = AddrRange {
            start: 5,
            end: 1,
        };
        assert!(range.validate().is_err());
    }

    #[test]
    fn test_covers() {
        let outer = AddrRange::new(0x1000, 0x2000).unwrap();
        assert!(outer.covers(&AddrRange::new(0x1000, 0x2000).unwrap()));
        assert!(outer.covers(&AddrRange::new(0x1800, 0x1900).unwrap()));
        assert!(!outer.covers(&AddrRange::new(0x1800, 0x2001).unwrap()));
        assert!(!outer.covers(&AddrRange::new(0x800, 0x1001).unwrap()));
        assert!(AddrRange::all().covers(&outer));
    }

    #[test]
    fn test_empty_range_matches_nothing() {
        let range = AddrRange::empty();
        assert!(range.is_empty());
        assert!(!range.contains(0));
    }

    #[test]
    fn test_parse() {
        let range: AddrRange = "0x400000..0x401000".parse().unwrap();
        assert_eq!(range, AddrRange::new(0x40_0000, 0x40_1000).unwrap());

        let range: AddrRange = "10..20".parse().unwrap();
        assert_eq!(range.start, 0x10);
        assert_eq!(range.end, 0x20);

        assert!(matches!(
            "0x10".parse::<AddrRange>(),
            Err(ConfigError::InvalidRange(_))
        ));
        assert!(matches!(
            "zz..0x10".parse::<AddrRange>(),
            Err(ConfigError::InvalidRange(_))
        ));
        assert!(matches!(
            "0x20..0x10".parse::<AddrRange>(),
            Err(ConfigError::MalformedRange { .. })
        ));
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        let range = AddrRange::new(0x80, 0x100).unwrap();
        assert_eq!(range.to_string(), "0x80..0x100");
        assert_eq!(range.to_string().parse::<AddrRange>().unwrap(), range);
    }
}
