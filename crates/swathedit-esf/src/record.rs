//! Fixed-width edit record codec.
//!
//! Layout (16 bytes, canonical big-endian):
//! - `timestamp: f64` (IEEE-754)
//! - `beam: i32`
//! - `action: i32`
//!
//! Whether bytes must be reversed is decided once per log from the host byte
//! order ([`ByteSwap::for_host`]) and applied to every record read or written
//! through that log.

use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use serde::Serialize;
use swathedit_error::{EditLogError, Result};
use swathedit_types::EditEvent;

/// Exact on-disk width of one edit record.
pub const RECORD_BYTES: usize = 16;

const TIMESTAMP_RANGE: std::ops::Range<usize> = 0..8;
const BEAM_RANGE: std::ops::Range<usize> = 8..12;
const ACTION_RANGE: std::ops::Range<usize> = 12..16;

/// Byte-order conversion between host memory and the canonical file layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteSwap {
    /// Host order already matches the canonical order.
    Identity,
    /// Every multi-byte field is reversed on the way in and out.
    Reverse,
}

impl ByteSwap {
    /// Conversion required on the running host for canonical big-endian files.
    #[must_use]
    pub const fn for_host() -> Self {
        if cfg!(target_endian = "little") {
            Self::Reverse
        } else {
            Self::Identity
        }
    }

    #[must_use]
    pub const fn is_swapped(self) -> bool {
        matches!(self, Self::Reverse)
    }

    const fn convert_u64(self, value: u64) -> u64 {
        match self {
            Self::Identity => value,
            Self::Reverse => value.swap_bytes(),
        }
    }

    const fn convert_i32(self, value: i32) -> i32 {
        match self {
            Self::Identity => value,
            Self::Reverse => value.swap_bytes(),
        }
    }
}

/// Encode one event using host layout plus the requested conversion.
#[must_use]
pub fn encode_record(event: &EditEvent, swap: ByteSwap) -> [u8; RECORD_BYTES] {
    let mut out = [0_u8; RECORD_BYTES];
    let timestamp = swap.convert_u64(event.timestamp.to_bits());
    out[TIMESTAMP_RANGE].copy_from_slice(&timestamp.to_ne_bytes());
    out[BEAM_RANGE].copy_from_slice(&swap.convert_i32(event.beam).to_ne_bytes());
    out[ACTION_RANGE].copy_from_slice(&swap.convert_i32(event.action_code).to_ne_bytes());
    out
}

/// Decode one full record. The action code is preserved even if unknown.
#[must_use]
pub fn decode_record(bytes: &[u8; RECORD_BYTES], swap: ByteSwap) -> EditEvent {
    let mut timestamp = [0_u8; 8];
    let mut beam = [0_u8; 4];
    let mut action = [0_u8; 4];
    timestamp.copy_from_slice(&bytes[TIMESTAMP_RANGE]);
    beam.copy_from_slice(&bytes[BEAM_RANGE]);
    action.copy_from_slice(&bytes[ACTION_RANGE]);
    EditEvent::from_raw(
        f64::from_bits(swap.convert_u64(u64::from_ne_bytes(timestamp))),
        swap.convert_i32(i32::from_ne_bytes(beam)),
        swap.convert_i32(i32::from_ne_bytes(action)),
    )
}

/// Read the next record from `reader`.
///
/// Returns `Ok(None)` on a clean end of stream. A partial record is an error:
/// the caller must stop reading rather than resynchronize.
pub fn read_record<R: Read>(
    reader: &mut R,
    swap: ByteSwap,
    path: &Path,
) -> Result<Option<EditEvent>> {
    let mut buf = [0_u8; RECORD_BYTES];
    let mut filled = 0;
    while filled < RECORD_BYTES {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => {
                return Err(EditLogError::ReadFailed {
                    path: path.to_path_buf(),
                    detail: err.to_string(),
                });
            }
        }
    }
    match filled {
        0 => Ok(None),
        RECORD_BYTES => Ok(Some(decode_record(&buf, swap))),
        len => Err(EditLogError::TruncatedRecord {
            path: path.to_path_buf(),
            len,
        }),
    }
}

/// Write one record in full.
pub fn write_record<W: Write>(
    writer: &mut W,
    event: &EditEvent,
    swap: ByteSwap,
    path: &Path,
) -> Result<()> {
    writer
        .write_all(&encode_record(event, swap))
        .map_err(|source| EditLogError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })
}
