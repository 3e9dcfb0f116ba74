//! Canonical class table shared by preprocessing, classification and enrichment.
//!
//! Indices, identities and labels are defined here once. Every other crate goes
//! through [`ClassIdentity`] instead of repeating string literals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of classes the model outputs. Any other output length is invalid.
pub const TAXONOMY_SIZE: usize = 4;

/// Stable class key. This is what the knowledge store is queried with; the
/// numeric index is local to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassIdentity {
    AppleScab = 0,
    AppleBlackRot = 1,
    CedarAppleRust = 2,
    Healthy = 3,
}

#[derive(Debug)]
pub struct TaxonomyEntry {
    pub identity: ClassIdentity,
    pub key: &'static str,
    pub label: &'static str,
    pub default_symptoms: &'static str,
}

pub const TAXONOMY: [TaxonomyEntry; TAXONOMY_SIZE] = [
    TaxonomyEntry {
        identity: ClassIdentity::AppleScab,
        key: "apple_scab",
        label: "Apple Scab",
        default_symptoms: "Olive-green to brown velvety spots on leaves and fruit; \
                           heavily infected leaves yellow and drop early.",
    },
    TaxonomyEntry {
        identity: ClassIdentity::AppleBlackRot,
        key: "apple_black_rot",
        label: "Apple Black Rot",
        default_symptoms: "Purple-edged leaf spots with tan centres; fruit rot turns \
                           black and the fruit shrivels on the branch.",
    },
    TaxonomyEntry {
        identity: ClassIdentity::CedarAppleRust,
        key: "cedar_apple_rust",
        label: "Cedar Apple Rust",
        default_symptoms: "Bright yellow-orange spots on the upper leaf surface, \
                           later with small tube-like growths underneath.",
    },
    TaxonomyEntry {
        identity: ClassIdentity::Healthy,
        key: "healthy",
        label: "Healthy",
        default_symptoms: "No visible symptoms.",
    },
];

impl ClassIdentity {
    pub const ALL: [ClassIdentity; TAXONOMY_SIZE] = [
        ClassIdentity::AppleScab,
        ClassIdentity::AppleBlackRot,
        ClassIdentity::CedarAppleRust,
        ClassIdentity::Healthy,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn entry(self) -> &'static TaxonomyEntry {
        &TAXONOMY[self.index()]
    }

    pub fn key(self) -> &'static str {
        self.entry().key
    }

    pub fn label(self) -> &'static str {
        self.entry().label
    }

    pub fn default_symptoms(self) -> &'static str {
        self.entry().default_symptoms
    }

    /// Only disease classes carry a severity or a knowledge record.
    #[inline]
    pub fn is_healthy(self) -> bool {
        self == ClassIdentity::Healthy
    }
}

impl fmt::Display for ClassIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown class identity: {0}")]
pub struct UnknownClass(pub String);

impl FromStr for ClassIdentity {
    type Err = UnknownClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TAXONOMY
            .iter()
            .find(|entry| entry.key == s)
            .map(|entry| entry.identity)
            .ok_or_else(|| UnknownClass(s.to_string()))
    }
}
