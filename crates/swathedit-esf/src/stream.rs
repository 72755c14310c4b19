//! Append-only record streams.
//!
//! Each append hands one whole 16-byte record to the OS in a single
//! `write_all` on an unbuffered handle, so a process that dies between two
//! appends leaves only complete records behind. A file that was torn anyway
//! (by another writer, or a full disk) is cut back to its last whole record
//! before appending resumes, so later records stay aligned.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use swathedit_error::{EditLogError, Result};
use swathedit_types::EditEvent;
use tracing::{debug, error, warn};

use crate::header::{EsfMode, encode_header};
use crate::record::{ByteSwap, RECORD_BYTES, write_record};

/// How output streams are opened for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// No output streams; the log is read-only for this session.
    #[default]
    None,
    /// Truncate and rewrite.
    Write,
    /// Extend existing files.
    Append,
}

impl OutputMode {
    #[must_use]
    pub const fn is_output(self) -> bool {
        !matches!(self, Self::None)
    }
}

#[derive(Debug)]
pub struct RecordStream {
    path: PathBuf,
    file: File,
    swap: ByteSwap,
    sync_on_append: bool,
    appended: u64,
    fresh: bool,
}

impl RecordStream {
    /// Open `path` for output. Returns `Ok(None)` for [`OutputMode::None`].
    ///
    /// In [`OutputMode::Append`], a trailing partial record is truncated
    /// away first.
    pub fn open(
        path: &Path,
        mode: OutputMode,
        swap: ByteSwap,
        sync_on_append: bool,
    ) -> Result<Option<Self>> {
        let mut options = OpenOptions::new();
        match mode {
            OutputMode::None => return Ok(None),
            OutputMode::Write => options.write(true).create(true).truncate(true),
            OutputMode::Append => options.append(true).create(true),
        };
        let file = options.open(path).map_err(|source| EditLogError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let mut len = file
            .metadata()
            .map_err(|source| EditLogError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?
            .len();
        let tail = len % RECORD_BYTES as u64;
        if mode == OutputMode::Append && tail != 0 {
            let whole = len - tail;
            file.set_len(whole)
                .map_err(|source| EditLogError::WriteFailed {
                    path: path.to_path_buf(),
                    source,
                })?;
            warn!(
                path = %path.display(),
                len,
                dropped = tail,
                "cut torn record tail before appending"
            );
            len = whole;
        }
        debug!(path = %path.display(), ?mode, len, "opened record stream");
        Ok(Some(Self {
            path: path.to_path_buf(),
            file,
            swap,
            sync_on_append,
            appended: 0,
            fresh: len == 0,
        }))
    }

    /// Whether the file was empty when opened and nothing has been written.
    #[must_use]
    pub const fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Write the version header block. Only meaningful on a fresh stream.
    pub fn write_header(&mut self, mode: EsfMode) -> Result<()> {
        self.file
            .write_all(&encode_header(mode))
            .map_err(|source| EditLogError::WriteFailed {
                path: self.path.clone(),
                source,
            })?;
        self.fresh = false;
        debug!(path = %self.path.display(), mode = mode.code(), "wrote edit log header");
        Ok(())
    }

    pub fn append(&mut self, event: &EditEvent) -> Result<()> {
        if let Err(err) = write_record(&mut self.file, event, self.swap, &self.path) {
            error!(
                path = %self.path.display(),
                beam = event.beam,
                action_code = event.action_code,
                error = %err,
                "edit record append failed"
            );
            return Err(err);
        }
        if self.sync_on_append {
            self.file
                .sync_data()
                .map_err(|source| EditLogError::WriteFailed {
                    path: self.path.clone(),
                    source,
                })?;
        }
        self.appended += 1;
        self.fresh = false;
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this handle.
    #[must_use]
    pub const fn appended(&self) -> u64 {
        self.appended
    }

    /// Flush and release the handle, returning the number of records appended.
    pub fn finish(mut self) -> Result<u64> {
        self.file
            .flush()
            .and_then(|()| self.file.sync_all())
            .map_err(|source| EditLogError::WriteFailed {
                path: self.path.clone(),
                source,
            })?;
        Ok(self.appended)
    }
}
