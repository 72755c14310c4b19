//! Edit log session: load, apply, append, close.

use std::fmt;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use swathedit_error::{EditLogError, Result};
use swathedit_types::{BeamFlag, EditAction, EditEvent};
use tracing::{debug, info, warn};

use crate::apply::{ApplyReport, LoadedEdit, UseState, apply_window, find_window};
use crate::config::EditLogConfig;
use crate::header::{EsfMode, EsfVersion, FileHeader};
use crate::loader::{LoadedFile, load_edit_log};
use crate::location::{ProcessingParameters, resolve_path, with_suffix};
use crate::record::ByteSwap;
use crate::stream::{OutputMode, RecordStream};
use crate::telemetry::{EditLogEvent, EditLogObserver, NoOpEditLogObserver};

/// Per-state tally of loaded edits, returned by [`EditLog::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CloseSummary {
    /// Records appended to the authoritative log this session.
    pub requested_written: u64,
    /// Records appended to the applied-edit stream this session.
    pub applied_written: u64,
    pub loaded: usize,
    pub unused: usize,
    pub applied: usize,
    pub out_of_range: usize,
    pub no_effect: usize,
}

/// One session against one survey file's edit log.
///
/// Owns the loaded, timestamp-sorted edits and the two output streams: the
/// authoritative log (requested edits) and the applied-edit stream (net
/// changes produced by [`EditLog::apply`]).
pub struct EditLog {
    path: PathBuf,
    stream_path: PathBuf,
    config: EditLogConfig,
    swap: ByteSwap,
    mode: OutputMode,
    header: FileHeader,
    edits: Vec<LoadedEdit>,
    requested: Option<RecordStream>,
    applied: Option<RecordStream>,
    observer: Arc<dyn EditLogObserver>,
    load_diagnostic: Option<String>,
}

impl fmt::Debug for EditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditLog")
            .field("path", &self.path)
            .field("stream_path", &self.stream_path)
            .field("swap", &self.swap)
            .field("mode", &self.mode)
            .field("header", &self.header)
            .field("edits", &self.edits.len())
            .field("load_diagnostic", &self.load_diagnostic)
            .finish_non_exhaustive()
    }
}

impl EditLog {
    /// Open the edit log at `path`.
    ///
    /// With `load`, existing edits are read and sorted; a damaged log is
    /// downgraded to an empty one and the reason kept in
    /// [`EditLog::load_diagnostic`]. With an output mode, an existing log that
    /// was also loaded is first copied aside, then both streams are opened in
    /// that mode. A stream that starts out empty gets a version header
    /// carrying the loaded log's mode.
    pub fn open(path: &Path, load: bool, mode: OutputMode, config: EditLogConfig) -> Result<Self> {
        Self::open_observed(path, load, mode, config, Arc::new(NoOpEditLogObserver))
    }

    /// [`EditLog::open`] reporting load and backup events to `observer`.
    pub fn open_observed(
        path: &Path,
        load: bool,
        mode: OutputMode,
        config: EditLogConfig,
        observer: Arc<dyn EditLogObserver>,
    ) -> Result<Self> {
        config.validate()?;
        let swap = ByteSwap::for_host();
        let stream_path = with_suffix(path, &config.stream_suffix);

        let mut load_diagnostic = None;
        let mut header = FileHeader::CURRENT;
        let events = if load {
            match load_edit_log(path, swap) {
                Ok(LoadedFile {
                    header: file_header,
                    events,
                    embedded_headers,
                }) => {
                    if !events.is_empty() || file_header.version != EsfVersion::V1 {
                        header = file_header;
                    }
                    if embedded_headers > 0 {
                        debug!(
                            path = %path.display(),
                            embedded_headers,
                            "skipped embedded header blocks"
                        );
                    }
                    observer.on_event(&EditLogEvent::Loaded {
                        records: events.len(),
                        byte_swap: swap,
                    });
                    events
                }
                Err(err) if err.is_load_recoverable() => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "edit log unreadable; continuing without edits"
                    );
                    let reason = err.to_string();
                    observer.on_event(&EditLogEvent::LoadRecovered {
                        reason: reason.clone(),
                    });
                    load_diagnostic = Some(reason);
                    Vec::new()
                }
                Err(err) => return Err(err),
            }
        } else {
            Vec::new()
        };

        if mode.is_output() && load && path.is_file() {
            let backup = with_suffix(path, &config.backup_suffix);
            let bytes = fs::copy(path, &backup).map_err(|source| EditLogError::OpenFailed {
                path: backup.clone(),
                source,
            })?;
            info!(
                path = %path.display(),
                backup = %backup.display(),
                bytes,
                "backed up edit log"
            );
            observer.on_event(&EditLogEvent::BackupCreated { bytes });
        }

        let mut requested = RecordStream::open(path, mode, swap, config.sync_on_append)?;
        let mut applied = RecordStream::open(&stream_path, mode, swap, config.sync_on_append)?;
        for stream in requested.iter_mut().chain(applied.iter_mut()) {
            if stream.is_fresh() {
                stream.write_header(header.mode)?;
            }
        }

        info!(
            path = %path.display(),
            records = events.len(),
            byte_swap = swap.is_swapped(),
            version = ?header.version,
            esf_mode = header.mode.code(),
            ?mode,
            "opened edit log"
        );

        Ok(Self {
            path: path.to_path_buf(),
            stream_path,
            config,
            swap,
            mode,
            header,
            edits: events.into_iter().map(LoadedEdit::new).collect(),
            requested,
            applied,
            observer,
            load_diagnostic,
        })
    }

    /// Resolve the edit log for `survey_file` and open it.
    pub fn load(
        survey_file: &Path,
        params: &dyn ProcessingParameters,
        load: bool,
        mode: OutputMode,
        config: EditLogConfig,
    ) -> Result<Self> {
        let (path, configured) = resolve_path(survey_file, params, &config);
        debug!(
            survey_file = %survey_file.display(),
            path = %path.display(),
            configured,
            "resolved edit log path"
        );
        Self::open(&path, load, mode, config)
    }

    /// Report subsequent events to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn EditLogObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn stream_path(&self) -> &Path {
        &self.stream_path
    }

    #[must_use]
    pub const fn config(&self) -> &EditLogConfig {
        &self.config
    }

    #[must_use]
    pub const fn byte_swap(&self) -> ByteSwap {
        self.swap
    }

    #[must_use]
    pub const fn output_mode(&self) -> OutputMode {
        self.mode
    }

    /// Format version of the loaded log. Version 1 logs are matched with a
    /// wider tolerance.
    #[must_use]
    pub const fn version(&self) -> EsfVersion {
        self.header.version
    }

    /// Fill applied to beams no edit touches in a matched ping.
    #[must_use]
    pub const fn esf_mode(&self) -> EsfMode {
        self.header.mode
    }

    /// Why loading fell back to an empty log, if it did.
    #[must_use]
    pub fn load_diagnostic(&self) -> Option<&str> {
        self.load_diagnostic.as_deref()
    }

    /// Loaded edits in timestamp order with their replay state.
    #[must_use]
    pub fn edits(&self) -> &[LoadedEdit] {
        &self.edits
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Index range of loaded edits that [`EditLog::apply_multiplicity`] would
    /// consider for this ping.
    #[must_use]
    pub fn window(&self, ping_time: f64, multiplicity: u32) -> Range<usize> {
        let tolerance = self.header.version.tolerance(self.config.max_time_diff);
        find_window(&self.edits, ping_time, multiplicity, tolerance)
    }

    /// Apply loaded edits to a ping's beam flags.
    pub fn apply(&mut self, ping_time: f64, flags: &mut [BeamFlag]) -> Result<ApplyReport> {
        self.apply_multiplicity(ping_time, 0, flags)
    }

    /// Apply loaded edits to the `multiplicity`-th ping sharing `ping_time`.
    pub fn apply_multiplicity(
        &mut self,
        ping_time: f64,
        multiplicity: u32,
        flags: &mut [BeamFlag],
    ) -> Result<ApplyReport> {
        let window = self.window(ping_time, multiplicity);
        let (mut report, changes) =
            apply_window(
                &mut self.edits,
                window,
                ping_time,
                multiplicity,
                self.header.mode,
                flags,
            );

        if report.out_of_range > 0 || report.no_effect > 0 {
            warn!(
                ping_time,
                beams = flags.len(),
                out_of_range = report.out_of_range,
                no_effect = report.no_effect,
                "edits could not be applied to ping"
            );
        }

        for change in &changes {
            if self.save_applied(change)? {
                report.emitted += 1;
            }
        }

        if !report.window.is_empty() {
            debug!(
                ping_time,
                multiplicity,
                window = report.window_len(),
                applied = report.applied,
                changed = report.changed,
                emitted = report.emitted,
                "applied edits to ping"
            );
        }
        self.observer.on_event(&EditLogEvent::PingApplied {
            window_len: report.window_len(),
            applied: report.applied,
            out_of_range: report.out_of_range,
            no_effect: report.no_effect,
            emitted: report.emitted,
        });
        Ok(report)
    }

    /// Append one requested edit to the authoritative log.
    ///
    /// Loaded edits and beam flags are untouched. Without an output stream
    /// the edit is dropped with a warning.
    pub fn save_requested(&mut self, timestamp: f64, beam: i32, action: EditAction) -> Result<()> {
        let event = EditEvent::new(timestamp, beam, action);
        let Some(stream) = self.requested.as_mut() else {
            warn!(
                path = %self.path.display(),
                beam,
                action = %action,
                "edit log not open for output; requested edit not saved"
            );
            return Ok(());
        };
        stream.append(&event)?;
        debug!(timestamp, beam, action = %action, "saved requested edit");
        self.observer.on_event(&EditLogEvent::RequestedAppended {
            beam,
            action_code: event.action_code,
        });
        Ok(())
    }

    /// Append one net change to the applied-edit stream. Returns whether a
    /// stream was open to receive it.
    pub(crate) fn save_applied(&mut self, event: &EditEvent) -> Result<bool> {
        let Some(stream) = self.applied.as_mut() else {
            return Ok(false);
        };
        stream.append(event)?;
        self.observer.on_event(&EditLogEvent::AppliedAppended {
            beam: event.beam,
            action_code: event.action_code,
        });
        Ok(true)
    }

    /// Snap every loaded edit within `tolerance` (exclusive) of `ping_time`
    /// onto `ping_time`. Returns the number of edits moved.
    pub fn fix_timestamps(&mut self, ping_time: f64, tolerance: f64) -> usize {
        let mut moved = 0;
        for edit in &mut self.edits {
            let timestamp = edit.event.timestamp;
            if timestamp != ping_time && (timestamp - ping_time).abs() < tolerance {
                edit.event.timestamp = ping_time;
                moved += 1;
            }
        }
        if moved > 0 {
            debug!(ping_time, tolerance, moved, "rectified edit timestamps");
        }
        moved
    }

    /// Loaded edits that have not matched any beam yet.
    #[must_use]
    pub fn unused_edits(&self) -> Vec<EditEvent> {
        self.edits
            .iter()
            .filter(|edit| edit.use_state == UseState::Unused)
            .map(|edit| edit.event)
            .collect()
    }

    fn tally(&self) -> CloseSummary {
        let mut summary = CloseSummary {
            loaded: self.edits.len(),
            ..CloseSummary::default()
        };
        for edit in &self.edits {
            match edit.use_state {
                UseState::Unused => summary.unused += 1,
                UseState::Applied(_) => summary.applied += 1,
                UseState::OutOfRange => summary.out_of_range += 1,
                UseState::NoEffect => summary.no_effect += 1,
            }
        }
        summary
    }

    /// Flush and release both streams. Safe on a log opened without output.
    pub fn close(self) -> Result<CloseSummary> {
        let mut summary = self.tally();
        if let Some(stream) = self.requested {
            summary.requested_written = stream.finish()?;
        }
        if let Some(stream) = self.applied {
            summary.applied_written = stream.finish()?;
        }

        if summary.unused > 0 {
            warn!(
                path = %self.path.display(),
                unused = summary.unused,
                loaded = summary.loaded,
                "loaded edits never matched a beam"
            );
        }
        info!(
            path = %self.path.display(),
            requested_written = summary.requested_written,
            applied_written = summary.applied_written,
            applied = summary.applied,
            "closed edit log"
        );
        self.observer.on_event(&EditLogEvent::Closed {
            requested_written: summary.requested_written,
            applied_written: summary.applied_written,
            unused: summary.unused,
        });
        Ok(summary)
    }
}
