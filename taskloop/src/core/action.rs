//! Action header grammar for model-emitted tasks.
//!
//! A task's raw text is expected to follow `[ordinal .] <action>: <filename>
//! [explanation]`. Parsing yields a typed [`ActionRequest`] or a
//! [`HeaderError`] naming exactly what was malformed; a failed parse is
//! non-fatal for the run (the dispatcher logs it and moves on).

use std::fmt;

use crate::core::task::Task;

/// The closed set of capabilities a task may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    WriteFile,
    ReadFile,
    RunFile,
    Research,
}

impl Action {
    /// Match order for header resolution. First match wins, so a header
    /// mentioning several action names resolves to the earliest entry.
    pub const PRIORITY: [Action; 4] = [
        Action::WriteFile,
        Action::ReadFile,
        Action::RunFile,
        Action::Research,
    ];

    /// The action name as the model is instructed to emit it.
    pub fn name(self) -> &'static str {
        match self {
            Action::WriteFile => "Write File",
            Action::ReadFile => "Read File",
            Action::RunFile => "Run File",
            Action::Research => "Research",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully parsed action invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub action: Action,
    /// First whitespace-delimited token after the colon.
    pub filename: String,
    /// Free text after the filename; may be empty.
    pub explanation: String,
}

/// Why a task header could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// No `:` separating the action name from its argument.
    MissingColon { raw: String },
    /// The header names no known action.
    UnrecognizedAction { header: String },
    /// Nothing after the colon to use as a filename.
    MissingFilename { action: Action },
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderError::MissingColon { raw } => {
                write!(f, "no ':' separating action from argument in '{}'", raw.trim())
            }
            HeaderError::UnrecognizedAction { header } => {
                write!(f, "unrecognized action '{header}'")
            }
            HeaderError::MissingFilename { action } => {
                write!(f, "{action} is missing a filename argument")
            }
        }
    }
}

/// Parse a task's raw text into an [`ActionRequest`].
pub fn parse_action(task: &Task) -> Result<ActionRequest, HeaderError> {
    let (header, rest) = task
        .raw
        .split_once(':')
        .ok_or_else(|| HeaderError::MissingColon {
            raw: task.raw.clone(),
        })?;

    let header = strip_ordinal(header).trim();
    let action = resolve_action(header).ok_or_else(|| HeaderError::UnrecognizedAction {
        header: header.to_string(),
    })?;

    let rest = rest.trim();
    let (filename, explanation) = match rest.split_once(char::is_whitespace) {
        Some((filename, explanation)) => (filename, explanation.trim()),
        None => (rest, ""),
    };
    if filename.is_empty() {
        return Err(HeaderError::MissingFilename { action });
    }

    Ok(ActionRequest {
        action,
        filename: filename.to_string(),
        explanation: explanation.to_string(),
    })
}

/// Resolve a header against the known action names.
///
/// Exact match is preferred; a containment fallback keeps slightly mangled
/// headers (stray prefixes, trailing punctuation) dispatchable. Both passes
/// honor [`Action::PRIORITY`].
fn resolve_action(header: &str) -> Option<Action> {
    Action::PRIORITY
        .iter()
        .copied()
        .find(|action| header == action.name())
        .or_else(|| {
            Action::PRIORITY
                .iter()
                .copied()
                .find(|action| header.contains(action.name()))
        })
}

/// Remove a leading `<digits>.` ordinal, if present.
fn strip_ordinal(header: &str) -> &str {
    if let Some((prefix, rest)) = header.split_once('.') {
        let prefix = prefix.trim();
        if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) {
            return rest;
        }
    }
    header
}
