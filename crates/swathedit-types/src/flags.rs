//! Per-beam quality flags.
//!
//! The byte layout matches the flag convention used by the swath format
//! readers, so a ping's flag array can be wrapped without translation:
//!
//! | bit    | meaning                          |
//! |--------|----------------------------------|
//! | `0x01` | flagged (some reason bit is set) |
//! | `0x02` | null, no data                    |
//! | `0x04` | manual edit                      |
//! | `0x08` | automatic filter                 |
//! | `0x10` | secondary filter                 |
//! | `0x20` | sonar flagged                    |
//! | `0x40` | interpolated                     |
//! | `0x80` | multipick                        |

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct BeamFlag: u8 {
        const FLAG = 0x01;
        const NULL = 0x02;
        const MANUAL = 0x04;
        const FILTER = 0x08;
        const FILTER2 = 0x10;
        const SONAR = 0x20;
        const INTERPOLATE = 0x40;
        const MULTIPICK = 0x80;
    }
}

impl BeamFlag {
    /// Unflagged beam with valid data.
    pub const GOOD: Self = Self::empty();
    /// Beam without data.
    pub const NULL_BEAM: Self = Self::NULL;
    /// Beam rejected by a manual edit.
    pub const FLAGGED_MANUAL: Self = Self::FLAG.union(Self::MANUAL);
    /// Beam rejected by a filter.
    pub const FLAGGED_FILTER: Self = Self::FLAG.union(Self::FILTER);

    /// Wrap a raw flag byte, keeping unknown bits.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self::from_bits_retain(byte)
    }

    /// A null beam cannot be flagged or unflagged, only zeroed again.
    #[must_use]
    pub const fn is_unusable(self) -> bool {
        self.contains(Self::NULL)
    }

    #[must_use]
    pub const fn is_flagged(self) -> bool {
        self.contains(Self::FLAG)
    }

    #[must_use]
    pub const fn is_good(self) -> bool {
        !self.is_unusable() && !self.is_flagged()
    }

    #[must_use]
    pub const fn state(self) -> BeamState {
        if self.is_unusable() {
            BeamState::Null
        } else if !self.is_flagged() {
            BeamState::Good
        } else if self.contains(Self::MANUAL) {
            BeamState::FlaggedManual
        } else if self.contains(Self::FILTER) {
            BeamState::FlaggedFilter
        } else {
            BeamState::FlaggedOther
        }
    }
}

impl From<BeamState> for BeamFlag {
    fn from(state: BeamState) -> Self {
        match state {
            BeamState::Good => Self::GOOD,
            BeamState::Null => Self::NULL_BEAM,
            BeamState::FlaggedManual => Self::FLAGGED_MANUAL,
            BeamState::FlaggedFilter => Self::FLAGGED_FILTER,
            BeamState::FlaggedOther => Self::FLAG,
        }
    }
}

/// Coarse classification of a [`BeamFlag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeamState {
    Good,
    Null,
    FlaggedManual,
    FlaggedFilter,
    /// Flagged for a reason other than a manual edit or the primary filter
    /// (sonar, secondary filter, ...).
    FlaggedOther,
}
