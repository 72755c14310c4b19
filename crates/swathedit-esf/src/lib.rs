//! Edit save files: a persistent, append-only journal of per-beam edit
//! decisions for a swath survey file, and the engine that replays it.
//!
//! An [`EditLog`] is opened once per survey file and processing session.
//! Loaded edits are sorted by timestamp (stably, so later edits at the same
//! time win) and replayed onto each ping's beam flags by [`EditLog::apply`].
//! New decisions are appended with [`EditLog::save_requested`]; the net beam
//! changes that replay produces go to a separate applied-edit stream.
//! Files open with a version header ([`FileHeader`]); headerless logs from
//! older writers are still read.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use swathedit_esf::{EditLog, EditLogConfig, NoProcessingParameters, OutputMode};
//! use swathedit_types::{BeamFlag, EditAction};
//!
//! # fn main() -> swathedit_error::Result<()> {
//! let mut log = EditLog::load(
//!     Path::new("line0001.mb58"),
//!     &NoProcessingParameters,
//!     true,
//!     OutputMode::Append,
//!     EditLogConfig::default(),
//! )?;
//! let mut flags = vec![BeamFlag::GOOD; 256];
//! log.apply(1_234_567_890.125, &mut flags)?;
//! log.save_requested(1_234_567_890.125, 17, EditAction::Flag)?;
//! log.close()?;
//! # Ok(())
//! # }
//! ```

pub mod apply;
pub mod config;
pub mod header;
pub mod loader;
pub mod location;
pub mod log;
pub mod record;
pub mod sort;
pub mod stream;
pub mod telemetry;

pub use apply::{ApplyReport, LoadedEdit, UseState};
pub use config::EditLogConfig;
pub use header::{EsfMode, EsfVersion, FileHeader, HEADER_BYTES, encode_header, parse_header};
pub use loader::{LoadedFile, load_edit_file, load_edit_log};
pub use location::{
    EditLogLocation, NoProcessingParameters, ProcessingParameters, StaticProcessingParameters,
    check, resolve_path,
};
pub use log::{CloseSummary, EditLog};
pub use record::{ByteSwap, RECORD_BYTES, decode_record, encode_record};
pub use stream::OutputMode;
pub use telemetry::{
    EditLogEvent, EditLogEventRing, EditLogMetrics, EditLogMetricsSnapshot, EditLogObserver,
    NoOpEditLogObserver,
};
