//! Edit log configuration.

use serde::{Deserialize, Serialize};
use swathedit_error::{EditLogError, Result};

/// Default apply-window tolerance in seconds.
///
/// Slightly wider than 0.1 ms so that timestamps rounded to 0.1 ms by some
/// format writers still match their pings.
pub const DEFAULT_MAX_TIME_DIFF: f64 = 0.00011;
pub const DEFAULT_LOG_SUFFIX: &str = ".esf";
pub const DEFAULT_STREAM_SUFFIX: &str = ".stream";
pub const DEFAULT_BACKUP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditLogConfig {
    /// Maximum `|edit.timestamp - ping_timestamp|` (exclusive) for an edit to
    /// apply to a ping.
    pub max_time_diff: f64,
    /// Appended to the survey file name when no path is configured.
    pub log_suffix: String,
    /// Appended to the log path to name the applied-edit stream.
    pub stream_suffix: String,
    /// Appended to the log path to name the backup taken before rewriting.
    pub backup_suffix: String,
    /// `sync_data` after every appended record.
    pub sync_on_append: bool,
}

impl Default for EditLogConfig {
    fn default() -> Self {
        Self {
            max_time_diff: DEFAULT_MAX_TIME_DIFF,
            log_suffix: DEFAULT_LOG_SUFFIX.to_owned(),
            stream_suffix: DEFAULT_STREAM_SUFFIX.to_owned(),
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_owned(),
            sync_on_append: false,
        }
    }
}

impl EditLogConfig {
    /// Parse a TOML fragment; missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|err| EditLogError::invalid_config(format!("toml: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_max_time_diff(mut self, max_time_diff: f64) -> Self {
        self.max_time_diff = max_time_diff;
        self
    }

    #[must_use]
    pub fn with_sync_on_append(mut self, sync_on_append: bool) -> Self {
        self.sync_on_append = sync_on_append;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.max_time_diff.is_finite() || self.max_time_diff <= 0.0 {
            return Err(EditLogError::invalid_config(format!(
                "max_time_diff must be finite and positive, got {}",
                self.max_time_diff
            )));
        }
        for (name, suffix) in [
            ("log_suffix", &self.log_suffix),
            ("stream_suffix", &self.stream_suffix),
            ("backup_suffix", &self.backup_suffix),
        ] {
            if suffix.is_empty() {
                return Err(EditLogError::invalid_config(format!(
                    "{name} must not be empty"
                )));
            }
        }
        Ok(())
    }
}
