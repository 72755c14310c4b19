//! Edit events and the closed action enumeration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Beam numbers of the k-th ping sharing one timestamp are stored offset by
/// `k * MULTIPLICITY_FACTOR`.
pub const MULTIPLICITY_FACTOR: i32 = 1_000_000;

/// Requested change to one beam's flag.
///
/// The integer codes are part of the on-disk format and are shared with every
/// installation reading the same edit save files. They must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum EditAction {
    /// Flag the beam as manually rejected.
    Flag = 1,
    /// Clear any flag, returning the beam to good.
    Unflag = 2,
    /// Mark the beam as carrying no data.
    Zero = 3,
    /// Flag the beam as rejected by an automated filter.
    Filter = 4,
}

impl EditAction {
    pub const ALL: [Self; 4] = [Self::Flag, Self::Unflag, Self::Zero, Self::Filter];

    /// On-disk action code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Decode an on-disk action code. Unknown codes yield `None`.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Flag),
            2 => Some(Self::Unflag),
            3 => Some(Self::Zero),
            4 => Some(Self::Filter),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::Unflag => "unflag",
            Self::Zero => "zero",
            Self::Filter => "filter",
        }
    }
}

impl fmt::Display for EditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One edit decision as stored in an edit save file.
///
/// `beam` and `action_code` are kept exactly as read so that damaged records
/// survive a load and can be reported; neither is trusted until the apply
/// engine checks it against a concrete ping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EditEvent {
    /// Ping timestamp in seconds, same epoch as the survey data.
    pub timestamp: f64,
    /// Beam number, possibly offset by ping multiplicity.
    pub beam: i32,
    /// Raw action code; see [`EditAction`].
    pub action_code: i32,
}

impl EditEvent {
    #[must_use]
    pub const fn new(timestamp: f64, beam: i32, action: EditAction) -> Self {
        Self {
            timestamp,
            beam,
            action_code: action.code(),
        }
    }

    /// Build an event from raw fields without validating the action code.
    #[must_use]
    pub const fn from_raw(timestamp: f64, beam: i32, action_code: i32) -> Self {
        Self {
            timestamp,
            beam,
            action_code,
        }
    }

    /// Decoded action, or `None` for an unrecognized code.
    #[must_use]
    pub const fn action(&self) -> Option<EditAction> {
        EditAction::from_code(self.action_code)
    }

    /// Beam number with any multiplicity offset removed.
    #[must_use]
    pub const fn base_beam(&self) -> i32 {
        self.beam % MULTIPLICITY_FACTOR
    }
}
