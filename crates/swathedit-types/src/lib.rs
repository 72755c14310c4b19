//! Value types shared by the edit-save-file engine and its clients.
//!
//! - [`EditEvent`] / [`EditAction`]: one persisted beam edit decision.
//! - [`flags::BeamFlag`] / [`flags::BeamState`]: the per-beam quality flag that
//!   edits are replayed onto.

pub mod edit;
pub mod flags;

pub use edit::{EditAction, EditEvent, MULTIPLICITY_FACTOR};
pub use flags::{BeamFlag, BeamState};
