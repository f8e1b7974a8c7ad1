//! 128-bit asset identity
//!
//! A `Guid` names a logical asset independently of where its source lives.
//! It is minted once, written into the asset's sidecar, and read back on
//! every later session.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::AssetError;

/// Durable identity of a source asset
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Guid {
    high: u64,
    low: u64,
}

impl Guid {
    /// The null GUID. Never minted.
    pub const NULL: Guid = Guid { high: 0, low: 0 };

    /// Create from the two 64-bit halves
    #[inline]
    pub const fn from_parts(high: u64, low: u64) -> Self {
        Self { high, low }
    }

    /// Mint a fresh random GUID
    pub fn generate() -> Self {
        loop {
            let (high, low) = Uuid::new_v4().as_u64_pair();
            let guid = Self { high, low };
            if !guid.is_null() {
                return guid;
            }
        }
    }

    /// High 64 bits
    #[inline]
    pub const fn high(&self) -> u64 {
        self.high
    }

    /// Low 64 bits
    #[inline]
    pub const fn low(&self) -> u64 {
        self.low
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        self.high == 0 && self.low == 0
    }

    fn as_uuid(&self) -> Uuid {
        Uuid::from_u64_pair(self.high, self.low)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_uuid().hyphenated())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

impl FromStr for Guid {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s.trim()).map_err(|_| AssetError::InvalidGuid(s.to_string()))?;
        let (high, low) = uuid.as_u64_pair();
        Ok(Self { high, low })
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
