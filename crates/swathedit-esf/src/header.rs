//! Version header at the start of an edit save file.
//!
//! Files written since format version 2 open with a zero-padded text block of
//! [`HEADER_BYTES`] bytes beginning `ESFVERSION0N`. Version 3 adds an
//! `ESF Mode: <n>` line naming the default applied to beams no edit touches.
//! Files without the block are version 1; their timestamps may have been
//! truncated to millisecond precision, so they are matched with a coarser
//! tolerance.
//!
//! The header is a whole number of records wide, so a headered file still
//! has a length that is a multiple of the record width.

use serde::{Deserialize, Serialize};
use swathedit_types::{BeamFlag, EditAction};

use crate::record::RECORD_BYTES;

/// Width of the version header block.
pub const HEADER_BYTES: usize = 1024;

/// Record slots occupied by one header block.
pub const HEADER_RECORD_SLOTS: usize = HEADER_BYTES / RECORD_BYTES;

/// A record whose decoded timestamp is at or beyond this value is the first
/// 16 bytes of a header block (the `ESFV...` text read as a double), not an
/// edit. Such blocks appear mid-file when headered logs are concatenated.
pub const EMBEDDED_HEADER_TIMESTAMP: f64 = 4.294_97e9;

/// Tolerance multiplier for version 1 files.
pub const LEGACY_TOLERANCE_FACTOR: f64 = 10.0;

const MAGIC_V2: &[u8; 12] = b"ESFVERSION02";
const MAGIC_V3: &[u8; 12] = b"ESFVERSION03";
const MODE_OFFSET: usize = 13;
const MODE_PREFIX: &str = "ESF Mode: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EsfVersion {
    /// No header block.
    V1,
    V2,
    V3,
}

impl EsfVersion {
    /// Apply-window tolerance for files of this version.
    #[must_use]
    pub fn tolerance(self, max_time_diff: f64) -> f64 {
        match self {
            Self::V1 => max_time_diff * LEGACY_TOLERANCE_FACTOR,
            Self::V2 | Self::V3 => max_time_diff,
        }
    }
}

/// What a beam with no effective edit in a matched ping is set to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EsfMode {
    /// Untouched beams keep their flag.
    #[default]
    Explicit,
    /// Untouched beams become null.
    ImplicitNull,
    /// Untouched beams become good.
    ImplicitGood,
}

impl EsfMode {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Explicit => 0,
            Self::ImplicitNull => 1,
            Self::ImplicitGood => 2,
        }
    }

    /// Unknown codes read as [`EsfMode::Explicit`].
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            1 => Self::ImplicitNull,
            2 => Self::ImplicitGood,
            _ => Self::Explicit,
        }
    }

    /// Flag given to untouched beams, if any.
    #[must_use]
    pub const fn fill(self) -> Option<BeamFlag> {
        match self {
            Self::Explicit => None,
            Self::ImplicitNull => Some(BeamFlag::NULL_BEAM),
            Self::ImplicitGood => Some(BeamFlag::GOOD),
        }
    }

    /// Action recorded when an untouched beam is filled.
    #[must_use]
    pub const fn fill_action(self) -> Option<EditAction> {
        match self {
            Self::Explicit => None,
            Self::ImplicitNull => Some(EditAction::Zero),
            Self::ImplicitGood => Some(EditAction::Unflag),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub version: EsfVersion,
    pub mode: EsfMode,
}

impl FileHeader {
    /// Header written on every new file.
    pub const CURRENT: Self = Self {
        version: EsfVersion::V3,
        mode: EsfMode::Explicit,
    };

    /// Header of a file that has no header block.
    pub const LEGACY: Self = Self {
        version: EsfVersion::V1,
        mode: EsfMode::Explicit,
    };

    #[must_use]
    pub const fn with_mode(mut self, mode: EsfMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Recognize a header block. `None` means the bytes are records.
#[must_use]
pub fn parse_header(block: &[u8]) -> Option<FileHeader> {
    if block.starts_with(MAGIC_V3) {
        let mode = block
            .get(MODE_OFFSET..)
            .and_then(|rest| std::str::from_utf8(rest.split(|b| *b == b'\n').next()?).ok())
            .and_then(|line| line.strip_prefix(MODE_PREFIX))
            .and_then(|value| value.trim().parse::<i32>().ok())
            .map_or(EsfMode::Explicit, EsfMode::from_code);
        Some(FileHeader {
            version: EsfVersion::V3,
            mode,
        })
    } else if block.starts_with(MAGIC_V2) {
        Some(FileHeader {
            version: EsfVersion::V2,
            mode: EsfMode::Explicit,
        })
    } else {
        None
    }
}

/// Encode a version 3 header block for `mode`.
#[must_use]
pub fn encode_header(mode: EsfMode) -> [u8; HEADER_BYTES] {
    let text = format!(
        "ESFVERSION03\n{MODE_PREFIX}{}\nProgram: {} {}\n",
        mode.code(),
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    );
    let mut block = [0_u8; HEADER_BYTES];
    let len = text.len().min(HEADER_BYTES);
    block[..len].copy_from_slice(&text.as_bytes()[..len]);
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ByteSwap, decode_record};

    #[test]
    fn encoded_header_parses_back() {
        for mode in [EsfMode::Explicit, EsfMode::ImplicitNull, EsfMode::ImplicitGood] {
            let block = encode_header(mode);
            assert_eq!(
                parse_header(&block),
                Some(FileHeader::CURRENT.with_mode(mode))
            );
        }
    }

    #[test]
    fn version_two_has_explicit_mode() {
        let mut block = [0_u8; HEADER_BYTES];
        block[..12].copy_from_slice(MAGIC_V2);
        let header = parse_header(&block).expect("v2 header");
        assert_eq!(header.version, EsfVersion::V2);
        assert_eq!(header.mode, EsfMode::Explicit);
    }

    #[test]
    fn records_are_not_a_header() {
        assert_eq!(parse_header(&[0_u8; HEADER_BYTES]), None);
        assert_eq!(parse_header(b"ESFVERSION0"), None);
    }

    #[test]
    fn header_reads_as_out_of_band_timestamp() {
        let block = encode_header(EsfMode::Explicit);
        let mut first = [0_u8; RECORD_BYTES];
        first.copy_from_slice(&block[..RECORD_BYTES]);
        let event = decode_record(&first, ByteSwap::for_host());
        assert!(event.timestamp >= EMBEDDED_HEADER_TIMESTAMP);
    }

    #[test]
    fn legacy_files_use_wider_tolerance() {
        assert!((EsfVersion::V1.tolerance(0.00011) - 0.0011).abs() < 1e-12);
        assert_eq!(EsfVersion::V3.tolerance(0.00011), 0.00011);
    }
}
