//! Settings for the helpers and the command line tool.
//!
//! Values are layered: built-in defaults, then an optional settings file
//! (`csutils.toml`, `csutils.json`, ... found by base name), then environment
//! variables such as `CSUTILS__FILENAME__REPLACEMENT=-`.

use ::config::{Config, Environment, File};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, UtilsError};
use crate::filename::{SanitizeOptions, contains_illegal_characters};

pub const DEFAULT_SETTINGS_FILE: &str = "csutils";
pub const ENV_PREFIX: &str = "CSUTILS";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilenameSettings {
    pub replacement: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub log_level: String,
    pub filename: FilenameSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            filename: FilenameSettings { replacement: String::new() },
        }
    }
}

impl Settings {
    /// Loads settings from `file` (a path without extension is fine) or from
    /// [`DEFAULT_SETTINGS_FILE`]. A missing file is not an error.
    pub fn load(file: Option<&str>) -> Result<Settings> {
        let defaults = Settings::default();
        let name = file.unwrap_or(DEFAULT_SETTINGS_FILE);
        let settings: Settings = Config::builder()
            .set_default("log_level", defaults.log_level)?
            .set_default("filename.replacement", defaults.filename.replacement)?
            .add_source(File::with_name(name).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        debug!(source = name, ?settings, "settings loaded");
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        // a replacement must not reintroduce what it replaces
        if contains_illegal_characters(&self.filename.replacement) {
            return Err(UtilsError::Config(format!(
                "filename.replacement '{}' contains characters that are illegal in filenames",
                self.filename.replacement.escape_default()
            )));
        }
        Ok(())
    }

    pub fn sanitize_options(&self) -> SanitizeOptions {
        SanitizeOptions::with_replacement(self.filename.replacement.clone())
    }
}
