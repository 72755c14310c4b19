//! Error type shared by every swath edit-save-file crate.
//!
//! Load-side failures ([`EditLogError::ReadFailed`],
//! [`EditLogError::TruncatedRecord`], [`EditLogError::MemoryExhausted`]) are
//! absorbed by the loader, which downgrades a damaged log to an empty one.
//! Write-side failures are always returned to the caller.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EditLogError {
    /// A log, stream, or backup file could not be created or opened.
    #[error("failed to open {}: {source}", .path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The log could not be read.
    #[error("failed to read {}: {detail}", .path.display())]
    ReadFailed { path: PathBuf, detail: String },

    /// The log length is not a whole number of records, or a record read came
    /// back short.
    #[error(
        "truncated edit record in {}: got {len} bytes, record width is 16",
        .path.display()
    )]
    TruncatedRecord { path: PathBuf, len: usize },

    /// An append did not complete in full.
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Storage for the loaded events could not be reserved.
    #[error("unable to allocate memory for {records} edit events")]
    MemoryExhausted { records: usize },

    #[error("invalid edit log configuration: {detail}")]
    InvalidConfig { detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl EditLogError {
    /// Construct an [`EditLogError::InvalidConfig`] from any displayable detail.
    pub fn invalid_config(detail: impl Into<String>) -> Self {
        Self::InvalidConfig {
            detail: detail.into(),
        }
    }

    /// Whether a failure while loading an existing log may be absorbed by
    /// continuing with an empty log.
    #[must_use]
    pub const fn is_load_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ReadFailed { .. }
                | Self::TruncatedRecord { .. }
                | Self::MemoryExhausted { .. }
                | Self::OpenFailed { .. }
                | Self::Io(_)
        )
    }
}

pub type Result<T, E = EditLogError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_record_names_the_width() {
        let err = EditLogError::TruncatedRecord {
            path: PathBuf::from("line001.all.esf"),
            len: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains("line001.all.esf"));
        assert!(msg.contains("got 7 bytes"));
        assert!(msg.contains("16"));
    }

    #[test]
    fn write_failures_are_not_load_recoverable() {
        let err = EditLogError::WriteFailed {
            path: PathBuf::from("x.esf"),
            source: io::Error::new(io::ErrorKind::WriteZero, "short write"),
        };
        assert!(!err.is_load_recoverable());
        assert!(!EditLogError::invalid_config("bad").is_load_recoverable());
        assert!(EditLogError::MemoryExhausted { records: 3 }.is_load_recoverable());
    }

    #[test]
    fn io_errors_convert() {
        fn fails() -> Result<()> {
            Err(io::Error::other("boom"))?;
            Ok(())
        }
        let err = fails().expect_err("io error must propagate");
        assert!(matches!(err, EditLogError::Io(_)));
    }
}
