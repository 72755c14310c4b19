//! Where a survey file's edit log lives.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::EditLogConfig;

/// Source of explicitly configured edit log paths, typically a processing
/// parameter file that sits beside the survey file.
pub trait ProcessingParameters {
    /// Configured edit log path for `survey_file`, if any.
    fn edit_log_path(&self, survey_file: &Path) -> Option<PathBuf>;
}

/// No configured paths; every log uses the default suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProcessingParameters;

impl ProcessingParameters for NoProcessingParameters {
    fn edit_log_path(&self, _survey_file: &Path) -> Option<PathBuf> {
        None
    }
}

/// In-memory map from survey file to edit log path.
#[derive(Debug, Clone, Default)]
pub struct StaticProcessingParameters {
    paths: HashMap<PathBuf, PathBuf>,
}

impl StaticProcessingParameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_edit_log(
        mut self,
        survey_file: impl Into<PathBuf>,
        log: impl Into<PathBuf>,
    ) -> Self {
        self.paths.insert(survey_file.into(), log.into());
        self
    }
}

impl ProcessingParameters for StaticProcessingParameters {
    fn edit_log_path(&self, survey_file: &Path) -> Option<PathBuf> {
        self.paths.get(survey_file).cloned()
    }
}

/// Resolved edit log path for one survey file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditLogLocation {
    pub path: PathBuf,
    /// Path came from the processing parameters rather than the default suffix.
    pub configured: bool,
    /// A regular file is present at `path`.
    pub exists: bool,
}

/// `path` with `suffix` appended to its final component (`a/b.all` +
/// `.esf` = `a/b.all.esf`).
#[must_use]
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Edit log path for `survey_file` and whether it was explicitly configured.
pub fn resolve_path(
    survey_file: &Path,
    params: &dyn ProcessingParameters,
    config: &EditLogConfig,
) -> (PathBuf, bool) {
    params.edit_log_path(survey_file).map_or_else(
        || (with_suffix(survey_file, &config.log_suffix), false),
        |configured| (configured, true),
    )
}

/// Resolve the edit log for `survey_file` and report whether one exists.
pub fn check(
    survey_file: &Path,
    params: &dyn ProcessingParameters,
    config: &EditLogConfig,
) -> EditLogLocation {
    let (path, configured) = resolve_path(survey_file, params, config);
    let exists = path.is_file();
    EditLogLocation {
        path,
        configured,
        exists,
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn default_suffix_is_appended() {
        let (path, configured) = resolve_path(
            Path::new("/data/line0001.mb58"),
            &NoProcessingParameters,
            &EditLogConfig::default(),
        );
        assert_eq!(path, PathBuf::from("/data/line0001.mb58.esf"));
        assert!(!configured);
    }

    #[test]
    fn configured_path_wins() {
        let params = StaticProcessingParameters::new()
            .with_edit_log("/data/line0001.mb58", "/edits/line0001.esf");
        let (path, configured) = resolve_path(
            Path::new("/data/line0001.mb58"),
            &params,
            &EditLogConfig::default(),
        );
        assert_eq!(path, PathBuf::from("/edits/line0001.esf"));
        assert!(configured);
    }

    #[test]
    fn check_reports_existing_regular_file_only() {
        let dir = tempdir().expect("tempdir");
        let survey = dir.path().join("line.mb58");
        let config = EditLogConfig::default();

        let location = check(&survey, &NoProcessingParameters, &config);
        assert!(!location.exists);

        File::create(with_suffix(&survey, ".esf")).expect("create log");
        let location = check(&survey, &NoProcessingParameters, &config);
        assert!(location.exists);
        assert_eq!(location.path, dir.path().join("line.mb58.esf"));

        let params = StaticProcessingParameters::new().with_edit_log(&survey, dir.path());
        let location = check(&survey, &params, &config);
        assert!(location.configured);
        assert!(!location.exists, "a directory is not an edit log");
    }
}
