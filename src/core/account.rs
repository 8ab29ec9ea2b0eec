//! Account model: priority bands, banked balances and per-account policy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of paid priority bands.
pub const NUM_PRIORITIES: usize = 3;

/// Scheduling band. Lower values are more important.
///
/// Bands `0..NUM_PRIORITIES` are paid for with banked quota;
/// [`Priority::FREE_BUCKET`] is the unpaid band scheduled last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(u8);

impl Priority {
    /// The lowest, unpaid band.
    #[allow(clippy::cast_possible_truncation)]
    pub const FREE_BUCKET: Self = Self(NUM_PRIORITIES as u8);

    /// Build a priority from a band index. Bands past the free bucket clamp to it.
    pub const fn new(band: u8) -> Self {
        if band > Self::FREE_BUCKET.0 {
            Self::FREE_BUCKET
        } else {
            Self(band)
        }
    }

    /// Band index.
    pub const fn band(self) -> u8 {
        self.0
    }

    /// True for the unpaid band.
    pub const fn is_free_bucket(self) -> bool {
        self.0 == Self::FREE_BUCKET.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_free_bucket() {
            write!(f, "free")
        } else {
            write!(f, "p{}", self.0)
        }
    }
}

/// Banked quota per paid band, index 0 being the most important.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(pub [f64; NUM_PRIORITIES]);

impl Balance {
    /// Best band with positive balance, or the free bucket.
    pub fn best_priority(&self) -> Priority {
        self.0
            .iter()
            .position(|&quota| quota > 0.0)
            .and_then(|band| u8::try_from(band).ok())
            .map_or(Priority::FREE_BUCKET, Priority::new)
    }
}

/// Best priority an account can pay for. Accounts without a balance get the free bucket.
pub fn best_priority_for(balance: Option<&Balance>) -> Priority {
    balance.map_or(Priority::FREE_BUCKET, Balance::best_priority)
}

/// Per-account scheduling policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Maximum running plus about-to-run tasks before further requests are
    /// demoted to the free bucket. Zero means unbounded.
    #[serde(default)]
    pub max_fanout: u32,
}

impl AccountConfig {
    /// Config with the given fan-out ceiling.
    pub const fn with_max_fanout(max_fanout: u32) -> Self {
        Self { max_fanout }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_priority_picks_first_positive_band() {
        assert_eq!(Balance([0.0, 2.0, 5.0]).best_priority(), Priority::new(1));
        assert_eq!(Balance([1.0, 0.0, 0.0]).best_priority(), Priority::new(0));
    }

    #[test]
    fn test_exhausted_balance_is_free_bucket() {
        assert_eq!(Balance([0.0, -1.0, 0.0]).best_priority(), Priority::FREE_BUCKET);
        assert_eq!(best_priority_for(None), Priority::FREE_BUCKET);
    }

    #[test]
    fn test_priority_clamps_to_free_bucket() {
        assert_eq!(Priority::new(200), Priority::FREE_BUCKET);
        assert!(Priority::new(0) < Priority::FREE_BUCKET);
        assert_eq!(Priority::FREE_BUCKET.to_string(), "free");
        assert_eq!(Priority::new(2).to_string(), "p2");
    }
}
