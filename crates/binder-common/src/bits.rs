//! Bounded bit lists for VLAN and port sets
//!
//! Membership is a single word load and mask, so a list is checked in
//! constant time regardless of how many members it holds.

use crate::{BindError, BindResult};

/// Highest VLAN identifier
pub const MAX_VLAN: u32 = 4095;

/// Highest port number
pub const MAX_PORT: u32 = 65535;

/// Set of small integers over the closed domain `[0, max]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitList {
    words: Vec<u64>,
    max: u32,
    count: usize,
}

impl BitList {
    /// Create empty list over `[0, max]`
    pub fn new(max: u32) -> Self {
        let num_words = (max as usize + 64) / 64;
        Self {
            words: vec![0u64; num_words],
            max,
            count: 0,
        }
    }

    /// Build a list from members, rejecting anything beyond `max`
    ///
    /// `path` names the configuration key in the error.
    pub fn from_members(path: &str, max: u32, members: &[u32]) -> BindResult<Self> {
        let mut list = Self::new(max);
        for &member in members {
            if !list.set(member) {
                return Err(BindError::OutOfRange {
                    path: path.to_string(),
                    value: i64::from(member),
                    max: i64::from(max),
                });
            }
        }
        Ok(list)
    }

    /// Set bit; returns false if `bit` is outside the domain
    #[inline]
    pub fn set(&mut self, bit: u32) -> bool {
        if bit > self.max {
            return false;
        }
        let (word, mask) = Self::locate(bit);
        if self.words[word] & mask == 0 {
            self.words[word] |= mask;
            self.count += 1;
        }
        true
    }

    /// Check membership (values outside the domain are never members)
    #[inline(always)]
    pub fn contains(&self, bit: u32) -> bool {
        if bit > self.max {
            return false;
        }
        let (word, mask) = Self::locate(bit);
        self.words[word] & mask != 0
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if no member is set
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterate members in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.words.iter().enumerate().flat_map(|(idx, &word)| {
            (0..64u32)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| idx as u32 * 64 + bit)
        })
    }

    #[inline(always)]
    fn locate(bit: u32) -> (usize, u64) {
        ((bit / 64) as usize, 1u64 << (bit % 64))
    }
}
