//! Task records parsed from model-emitted action lists.
//!
//! The model is asked to format each action as `#@ <n>. <action>: <file>
//! <explanation>`. Formatting is not contractually guaranteed, so parsing is
//! best-effort: segments that do not carry a numeric ordinal are dropped
//! rather than rejected.

/// Delimiter separating action segments in a model response.
pub const TASK_DELIMITER: &str = "#@";

/// A single parsed action item.
///
/// `raw` keeps the full un-trimmed segment text; downstream handlers (and
/// the research context) rely on it verbatim. Tasks are immutable once
/// parsed and live only for the phase that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Ordinal token extracted from the segment (e.g. `"1"`).
    pub id: String,
    /// Full segment text, including the ordinal prefix.
    pub raw: String,
}

/// Parse a model response into an ordered task list.
///
/// A segment is kept when the text before its first `.` is a purely numeric
/// ordinal and the trimmed segment is non-empty. A segment with no `.` has
/// an empty first field and is dropped; so is any preamble before the first
/// delimiter.
pub fn parse_tasks(response: &str) -> Vec<Task> {
    response
        .split(TASK_DELIMITER)
        .filter_map(|segment| {
            let ordinal = segment.split('.').next().unwrap_or("").trim();
            if ordinal.is_empty() || !ordinal.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            if segment.trim().is_empty() {
                return None;
            }
            Some(Task {
                id: ordinal.to_string(),
                raw: segment.to_string(),
            })
        })
        .collect()
}

/// Join the raw text of every task with newlines.
///
/// Used as the shared context for research questions and for the
/// verification-plan prompt.
pub fn join_raw(tasks: &[Task]) -> String {
    tasks
        .iter()
        .map(|task| task.raw.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
