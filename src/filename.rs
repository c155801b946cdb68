//! Cross-platform filename sanitization.
//!
//! The rules follow the most restrictive common filesystem (Windows): a set of
//! forbidden characters, reserved device names that may not be used as a base
//! name even with an extension, and no trailing dots or spaces. A name that
//! passes [`is_valid_filename`] is safe on every mainstream platform.

use lazy_static::lazy_static;
use regex::{NoExpand, Regex};
use tracing::trace;

lazy_static! {
    // < > : " / \ | ? * and the C0 control block plus DEL
    static ref ILLEGAL_CHARACTERS: Regex = Regex::new(r#"[<>:"/\\|?*\x00-\x1F\x7F]"#).unwrap();
    // reserved with or without an extension, case-insensitive
    static ref RESERVED_FILENAMES: Regex = Regex::new(r"(?i)^(con|prn|aux|nul|com[1-9]|lpt[1-9])$").unwrap();
    static ref ONLY_DOTS: Regex = Regex::new(r"^\.+$").unwrap();
}

/// Returned when nothing usable survives sanitization.
pub const FALLBACK_FILENAME: &str = "_";
/// Returned by [`file_extension_from_path`] when there is no extension.
pub const UNKNOWN_EXTENSION: &str = "unknown";

// used by is_valid_filename to make removals visible
const PLACEHOLDER: &str = "X";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeOptions {
    /// Substituted for every illegal character. Empty means removal.
    pub replacement: String,
}

impl SanitizeOptions {
    pub fn with_replacement(replacement: impl Into<String>) -> Self {
        Self { replacement: replacement.into() }
    }
}

fn base_name(name: &str) -> &str {
    name.split('.').next().unwrap_or_default()
}

pub fn contains_illegal_characters(name: &str) -> bool {
    ILLEGAL_CHARACTERS.is_match(name)
}

pub fn is_reserved_name(base: &str) -> bool {
    RESERVED_FILENAMES.is_match(base)
}

/// Turns an arbitrary string into a filename that is safe on every platform.
///
/// Illegal characters are replaced by `options.replacement`, surrounding
/// whitespace and any trailing run of dots and spaces is removed, and a
/// reserved device name (`con`, `com1`, `lpt9`, ... also with an extension)
/// gets an underscore prefix. An empty result becomes [`FALLBACK_FILENAME`].
///
/// Applying the function to its own output returns it unchanged, as long as
/// the replacement holds no illegal characters itself.
pub fn sanitize_filename(name: &str, options: &SanitizeOptions) -> String {
    let replaced = ILLEGAL_CHARACTERS.replace_all(name, NoExpand(&options.replacement));
    let mut sanitized = replaced
        .trim_start()
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string();

    if is_reserved_name(base_name(&sanitized)) {
        trace!(name = %sanitized, "escaping reserved device name");
        sanitized.insert(0, '_');
    }

    if sanitized.is_empty() || ONLY_DOTS.is_match(&sanitized) {
        return FALLBACK_FILENAME.to_string();
    }
    sanitized
}

/// Checks that `name` is already a safe filename, i.e. that sanitizing it
/// would leave it untouched.
pub fn is_valid_filename(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    // a non-empty placeholder makes removed characters show up as a difference
    if sanitize_filename(name, &SanitizeOptions::with_replacement(PLACEHOLDER)) != name {
        return false;
    }
    // reserved names are prefixed rather than replaced, so check them directly
    let base = base_name(name);
    !base.is_empty() && !is_reserved_name(base)
}

/// The text after the last `.` of `path`, or [`UNKNOWN_EXTENSION`].
pub fn file_extension_from_path(path: &str) -> String {
    match path.rsplit_once('.') {
        Some((_, extension)) if !extension.is_empty() => extension.to_string(),
        _ => UNKNOWN_EXTENSION.to_string(),
    }
}
