use std::path::{Path, PathBuf};

use datagate_check::{CheckOptions, ExceptionHandling, Selection, Verbosity};
use serde::{Deserialize, Serialize};

use crate::CliError;

/// Default settings file looked up in the working directory.
pub const SETTINGS_FILE: &str = "datagate.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Stop each scan after this many failures.
    pub max_failures: Option<usize>,
    pub as_table: Selection,
    pub verbosity: Verbosity,
    pub exception_handling: ExceptionHandling,
    /// Exit with an error when any problem is found.
    pub strict: bool,
    /// Write JSON logs here instead of human-readable logs to stderr.
    pub log_file: Option<PathBuf>,
    /// Problem rows shown in the markdown report.
    pub max_report_rows: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_failures: None,
            as_table: Selection::Table,
            verbosity: Verbosity::High,
            exception_handling: ExceptionHandling::AsFailure,
            strict: false,
            log_file: None,
            max_report_rows: 50,
        }
    }
}

impl Settings {
    pub fn check_options(&self) -> CheckOptions {
        CheckOptions {
            as_table: self.as_table,
            max_failures: self.max_failures,
            verbosity: self.verbosity,
            exception_handling: self.exception_handling,
        }
    }
}

/// Read settings from `path`, or from `datagate.toml` when present.
///
/// An explicitly named file must exist; the default one is optional.
pub fn load_or_default(path: Option<&Path>) -> Result<Settings, CliError> {
    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(SETTINGS_FILE), false),
    };
    if !path.exists() {
        if required {
            return Err(CliError::InvalidConfig(format!(
                "settings file not found: {}",
                path.display()
            )));
        }
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(&path)?;
    let settings: Settings = toml::from_str(&content)?;
    Ok(settings)
}
