//! Replay of loaded edits onto one ping's beam flags.
//!
//! For each ping the engine:
//! 1. selects the window of loaded edits whose timestamps lie strictly within
//!    the configured tolerance of the ping time (rescanning from the start of
//!    the sorted array every call, so pings may arrive in any order);
//! 2. retires window edits of this ping's multiplicity whose beam does not
//!    exist in the ping;
//! 3. replays, beam by beam, the remaining edits in timestamp order, so the
//!    last effective edit for a beam decides its final flag;
//! 4. reports one net change per beam whose flag differs from its value on
//!    entry.

use std::ops::Range;

use serde::Serialize;
use swathedit_types::{BeamFlag, EditAction, EditEvent, MULTIPLICITY_FACTOR};

use crate::header::EsfMode;

/// Replay bookkeeping attached to each loaded edit. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UseState {
    /// Not yet matched to any beam.
    #[default]
    Unused,
    /// Changed a beam flag this many times. Still eligible on later replays.
    Applied(u32),
    /// Beam number outside the ping it was matched against. Retired.
    OutOfRange,
    /// Matched a null beam with an action that cannot touch null beams.
    /// Retired.
    NoEffect,
}

impl UseState {
    /// Whether an edit in this state may still act on a beam.
    #[must_use]
    pub const fn is_eligible(self) -> bool {
        matches!(self, Self::Unused | Self::Applied(_))
    }

    const fn bump(self) -> Self {
        match self {
            Self::Applied(count) => Self::Applied(count.saturating_add(1)),
            _ => Self::Applied(1),
        }
    }
}

/// A loaded edit plus its replay state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadedEdit {
    pub event: EditEvent,
    pub use_state: UseState,
}

impl LoadedEdit {
    #[must_use]
    pub const fn new(event: EditEvent) -> Self {
        Self {
            event,
            use_state: UseState::Unused,
        }
    }
}

/// Summary of one apply call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ApplyReport {
    /// Index range of loaded edits considered for this ping.
    pub window: Range<usize>,
    /// Edits that changed (or re-set) a beam flag.
    pub applied: usize,
    /// Edits retired because their beam is not in this ping.
    pub out_of_range: usize,
    /// Edits retired because they targeted a null beam.
    pub no_effect: usize,
    /// Edits skipped because their action code is not recognized.
    pub inert: usize,
    /// Beams whose flag differs from its value on entry.
    pub changed: usize,
    /// Net-change records written to the applied-edit stream.
    pub emitted: usize,
}

impl ApplyReport {
    #[must_use]
    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}

/// Beam-number range `[offset, offset + MULTIPLICITY_FACTOR)` for the given
/// ping multiplicity.
fn multiplicity_beams(multiplicity: u32) -> Range<i64> {
    let offset = i64::from(MULTIPLICITY_FACTOR) * i64::from(multiplicity);
    offset..offset + i64::from(MULTIPLICITY_FACTOR)
}

/// Index range of edits matching `ping_time` within `max_time_diff` and
/// belonging to this ping multiplicity. Empty if nothing matches.
///
/// `edits` must be sorted by timestamp.
#[must_use]
pub fn find_window(
    edits: &[LoadedEdit],
    ping_time: f64,
    multiplicity: u32,
    max_time_diff: f64,
) -> Range<usize> {
    let beams = multiplicity_beams(multiplicity);
    let mut window: Option<Range<usize>> = None;
    for (idx, edit) in edits.iter().enumerate() {
        if ping_time < edit.event.timestamp - max_time_diff {
            break;
        }
        if (edit.event.timestamp - ping_time).abs() < max_time_diff
            && beams.contains(&i64::from(edit.event.beam))
        {
            match window.as_mut() {
                Some(range) => range.end = idx + 1,
                None => window = Some(idx..idx + 1),
            }
        }
    }
    window.unwrap_or(0..0)
}

/// Flag value an effective action leaves on a usable beam.
const fn flag_after(action: EditAction) -> BeamFlag {
    match action {
        EditAction::Flag => BeamFlag::FLAGGED_MANUAL,
        EditAction::Filter => BeamFlag::FLAGGED_FILTER,
        EditAction::Unflag => BeamFlag::GOOD,
        EditAction::Zero => BeamFlag::NULL_BEAM,
    }
}

/// Replay `edits[window]` onto `flags` and return the report together with
/// one net-change event per beam whose flag changed.
///
/// Net-change events carry the ping time, the (multiplicity-offset) beam
/// number, and the last action that took effect on that beam. Under an
/// implicit `mode`, beams that no edit took effect on are set to the mode's
/// fill value and reported the same way.
pub fn apply_window(
    edits: &mut [LoadedEdit],
    window: Range<usize>,
    ping_time: f64,
    multiplicity: u32,
    mode: EsfMode,
    flags: &mut [BeamFlag],
) -> (ApplyReport, Vec<EditEvent>) {
    let mut report = ApplyReport {
        window: window.clone(),
        ..ApplyReport::default()
    };
    let mut changes = Vec::new();
    if window.is_empty() {
        return (report, changes);
    }

    // Edits of other pings sharing this timestamp can sit inside the window;
    // they are judged against their own ping, never this one.
    let beams = multiplicity_beams(multiplicity);
    let beam_count = flags.len();
    for edit in &mut edits[window.clone()] {
        let beam = i64::from(edit.event.beam);
        if beam >= 0 && !beams.contains(&beam) {
            continue;
        }
        let in_range = beams.contains(&beam)
            && usize::try_from(beam - beams.start).is_ok_and(|b| b < beam_count);
        if !in_range && edit.use_state != UseState::OutOfRange {
            edit.use_state = UseState::OutOfRange;
            report.out_of_range += 1;
        }
    }

    for (idx, flag) in flags.iter_mut().enumerate() {
        let Ok(ibeam) = i32::try_from(beams.start + idx as i64) else {
            break;
        };
        let original = *flag;
        let mut pending: Option<EditAction> = None;

        for edit in &mut edits[window.clone()] {
            if edit.event.beam != ibeam || !edit.use_state.is_eligible() {
                continue;
            }
            let Some(action) = edit.event.action() else {
                report.inert += 1;
                continue;
            };
            if action != EditAction::Zero && flag.is_unusable() {
                edit.use_state = UseState::NoEffect;
                report.no_effect += 1;
                continue;
            }
            *flag = flag_after(action);
            edit.use_state = edit.use_state.bump();
            report.applied += 1;
            pending = Some(action);
        }

        if let (None, Some(fill), Some(action)) = (pending, mode.fill(), mode.fill_action()) {
            *flag = fill;
            pending = Some(action);
        }

        if *flag != original {
            report.changed += 1;
            if let Some(action) = pending {
                changes.push(EditEvent::new(ping_time, ibeam, action));
            }
        }
    }

    (report, changes)
}
