//! Load a persisted edit log into memory, ordered by timestamp.

use std::fs::{self, File};
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use serde::Serialize;
use swathedit_error::{EditLogError, Result};
use swathedit_types::EditEvent;
use tracing::{debug, info};

use crate::header::{
    EMBEDDED_HEADER_TIMESTAMP, FileHeader, HEADER_BYTES, HEADER_RECORD_SLOTS, parse_header,
};
use crate::record::{ByteSwap, RECORD_BYTES, read_record};
use crate::sort::stable_sort_by;

/// Contents of one edit log file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedFile {
    /// Leading header, or [`FileHeader::LEGACY`] if the file has none.
    pub header: FileHeader,
    /// Edits in ascending timestamp order.
    pub events: Vec<EditEvent>,
    /// Header blocks found after the start of the file and skipped.
    pub embedded_headers: usize,
}

/// Order events by ascending timestamp, keeping file order among ties.
pub fn sort_by_timestamp(events: &mut [EditEvent]) {
    stable_sort_by(events, |a, b| a.timestamp.total_cmp(&b.timestamp));
}

/// Number of record slots in a log of `len` bytes.
///
/// A length that is not a multiple of [`RECORD_BYTES`] means the last append
/// was torn or the file is not an edit log at all.
pub fn record_count(path: &Path, len: u64) -> Result<usize> {
    let width = RECORD_BYTES as u64;
    let tail = len % width;
    if tail != 0 {
        return Err(EditLogError::TruncatedRecord {
            path: path.to_path_buf(),
            len: tail as usize,
        });
    }
    usize::try_from(len / width).map_err(|_| EditLogError::ReadFailed {
        path: path.to_path_buf(),
        detail: format!("{len} bytes exceeds the addressable record count"),
    })
}

fn read_failed(path: &Path, err: &std::io::Error) -> EditLogError {
    EditLogError::ReadFailed {
        path: path.to_path_buf(),
        detail: err.to_string(),
    }
}

/// Read every record of the log at `path` and return them sorted.
///
/// See [`load_edit_log`].
pub fn load_edit_file(path: &Path, swap: ByteSwap) -> Result<Vec<EditEvent>> {
    load_edit_log(path, swap).map(|loaded| loaded.events)
}

/// Read the log at `path`: its header, if any, and every edit, sorted.
///
/// A missing file or a directory yields no events. Header blocks embedded
/// after the first record are skipped. Any damage (length not a whole number
/// of records, unreadable bytes, failed allocation) is returned as an error;
/// the caller decides whether to continue without edits.
pub fn load_edit_log(path: &Path, swap: ByteSwap) -> Result<LoadedFile> {
    let mut loaded = LoadedFile {
        header: FileHeader::LEGACY,
        events: Vec::new(),
        embedded_headers: 0,
    };
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(loaded),
        Err(err) => return Err(read_failed(path, &err)),
    };
    if metadata.is_dir() {
        debug!(path = %path.display(), "edit log path is a directory; nothing to load");
        return Ok(loaded);
    }

    let slots = record_count(path, metadata.len())?;
    if slots == 0 {
        return Ok(loaded);
    }

    let file = File::open(path).map_err(|source| EditLogError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let mut consumed = 0;
    if slots >= HEADER_RECORD_SLOTS {
        let mut block = [0_u8; HEADER_BYTES];
        reader
            .read_exact(&mut block)
            .map_err(|err| read_failed(path, &err))?;
        if let Some(header) = parse_header(&block) {
            loaded.header = header;
            consumed = HEADER_RECORD_SLOTS;
        } else {
            reader.rewind().map_err(|err| read_failed(path, &err))?;
        }
    }

    let capacity = slots - consumed;
    loaded
        .events
        .try_reserve_exact(capacity)
        .map_err(|_| EditLogError::MemoryExhausted { records: capacity })?;
    info!(
        path = %path.display(),
        records = capacity,
        version = ?loaded.header.version,
        "reading old edits"
    );

    let mut skip = [0_u8; HEADER_BYTES - RECORD_BYTES];
    while consumed < slots {
        let Some(event) = read_record(&mut reader, swap, path)? else {
            return Err(EditLogError::ReadFailed {
                path: path.to_path_buf(),
                detail: format!("expected {slots} records, file ended after {consumed}"),
            });
        };
        if event.timestamp >= EMBEDDED_HEADER_TIMESTAMP {
            reader
                .read_exact(&mut skip)
                .map_err(|err| read_failed(path, &err))?;
            loaded.embedded_headers += 1;
            consumed += HEADER_RECORD_SLOTS;
        } else {
            loaded.events.push(event);
            consumed += 1;
        }
    }

    sort_by_timestamp(&mut loaded.events);
    debug!(
        path = %path.display(),
        records = loaded.events.len(),
        embedded_headers = loaded.embedded_headers,
        "sorted old edits"
    );
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use swathedit_types::EditAction;
    use tempfile::tempdir;

    use super::*;
    use crate::header::{EsfMode, EsfVersion, encode_header};
    use crate::record::encode_record;

    fn write_events(path: &Path, events: &[EditEvent]) {
        let mut file = File::create(path).expect("create log");
        for event in events {
            file.write_all(&encode_record(event, ByteSwap::for_host()))
                .expect("write record");
        }
    }

    #[test]
    fn missing_file_loads_nothing() {
        let dir = tempdir().expect("tempdir");
        let events =
            load_edit_file(&dir.path().join("absent.esf"), ByteSwap::for_host()).expect("load");
        assert!(events.is_empty());
    }

    #[test]
    fn empty_file_loads_nothing() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("empty.esf");
        File::create(&path).expect("create");
        let events = load_edit_file(&path, ByteSwap::for_host()).expect("load");
        assert!(events.is_empty());
    }

    #[test]
    fn directory_loads_nothing() {
        let dir = tempdir().expect("tempdir");
        let events = load_edit_file(dir.path(), ByteSwap::for_host()).expect("load");
        assert!(events.is_empty());
    }

    #[test]
    fn non_multiple_length_is_surfaced() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("torn.esf");
        write_events(&path, &[EditEvent::new(1.0, 0, EditAction::Flag)]);
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .expect("reopen");
        file.write_all(&[1, 2, 3]).expect("torn tail");
        drop(file);

        let err = load_edit_file(&path, ByteSwap::for_host()).expect_err("torn log");
        assert!(matches!(err, EditLogError::TruncatedRecord { len: 3, .. }));
        assert!(err.is_load_recoverable());
    }

    #[test]
    fn loads_sorted_and_stable() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("line.esf");
        let written = vec![
            EditEvent::new(20.0, 1, EditAction::Flag),
            EditEvent::new(10.0, 4, EditAction::Flag),
            EditEvent::new(10.0, 4, EditAction::Unflag),
            EditEvent::new(5.0, 2, EditAction::Zero),
            EditEvent::new(10.0, 4, EditAction::Filter),
            EditEvent::new(15.0, 3, EditAction::Flag),
        ];
        write_events(&path, &written);

        let loaded = load_edit_file(&path, ByteSwap::for_host()).expect("load");
        let actions_at_ten: Vec<_> = loaded
            .iter()
            .filter(|e| e.timestamp == 10.0)
            .map(|e| e.action())
            .collect();
        assert_eq!(
            actions_at_ten,
            vec![
                Some(EditAction::Flag),
                Some(EditAction::Unflag),
                Some(EditAction::Filter)
            ]
        );
        let times: Vec<f64> = loaded.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![5.0, 10.0, 10.0, 10.0, 15.0, 20.0]);
    }

    #[test]
    fn leading_header_is_skipped_and_read() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("headered.esf");
        let mut file = File::create(&path).expect("create");
        file.write_all(&encode_header(EsfMode::ImplicitGood))
            .expect("header");
        for event in [
            EditEvent::new(2.0, 1, EditAction::Flag),
            EditEvent::new(1.0, 0, EditAction::Zero),
        ] {
            file.write_all(&encode_record(&event, ByteSwap::for_host()))
                .expect("record");
        }
        drop(file);

        let loaded = load_edit_log(&path, ByteSwap::for_host()).expect("load");
        assert_eq!(loaded.header.version, EsfVersion::V3);
        assert_eq!(loaded.header.mode, EsfMode::ImplicitGood);
        assert_eq!(
            loaded.events,
            vec![
                EditEvent::new(1.0, 0, EditAction::Zero),
                EditEvent::new(2.0, 1, EditAction::Flag),
            ]
        );
    }

    #[test]
    fn version_two_header_is_recognized() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("v2.esf");
        let mut block = vec![0_u8; HEADER_BYTES];
        block[..12].copy_from_slice(b"ESFVERSION02");
        block.extend_from_slice(&encode_record(
            &EditEvent::new(3.0, 4, EditAction::Filter),
            ByteSwap::for_host(),
        ));
        fs::write(&path, block).expect("write");

        let loaded = load_edit_log(&path, ByteSwap::for_host()).expect("load");
        assert_eq!(loaded.header.version, EsfVersion::V2);
        assert_eq!(loaded.events.len(), 1);
    }

    #[test]
    fn headerless_log_of_header_size_is_all_records() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("legacy.esf");
        let events: Vec<EditEvent> = (0..HEADER_RECORD_SLOTS)
            .map(|i| EditEvent::new(i as f64, 0, EditAction::Flag))
            .collect();
        write_events(&path, &events);

        let loaded = load_edit_log(&path, ByteSwap::for_host()).expect("load");
        assert_eq!(loaded.header, FileHeader::LEGACY);
        assert_eq!(loaded.events.len(), HEADER_RECORD_SLOTS);
    }

    #[test]
    fn embedded_header_blocks_are_skipped() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("concatenated.esf");
        let swap = ByteSwap::for_host();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&encode_header(EsfMode::Explicit));
        bytes.extend_from_slice(&encode_record(&EditEvent::new(5.0, 1, EditAction::Flag), swap));
        bytes.extend_from_slice(&encode_header(EsfMode::Explicit));
        bytes.extend_from_slice(&encode_record(&EditEvent::new(6.0, 2, EditAction::Flag), swap));
        fs::write(&path, bytes).expect("write");

        let loaded = load_edit_log(&path, swap).expect("load");
        assert_eq!(loaded.embedded_headers, 1);
        let beams: Vec<i32> = loaded.events.iter().map(|e| e.beam).collect();
        assert_eq!(beams, vec![1, 2]);
    }

    #[test]
    fn record_count_accepts_whole_records() {
        let path = Path::new("x.esf");
        assert_eq!(record_count(path, 0).expect("zero"), 0);
        assert_eq!(record_count(path, 160).expect("ten"), 10);
        assert!(record_count(path, 161).is_err());
    }

    #[cfg(target_pointer_width = "32")]
    #[test]
    fn oversized_record_count_is_a_read_failure() {
        let err = record_count(Path::new("huge.esf"), 1 << 40).expect_err("too many records");
        assert!(matches!(err, EditLogError::ReadFailed { .. }));
        assert!(err.to_string().contains("1099511627776 bytes"));
    }
}
