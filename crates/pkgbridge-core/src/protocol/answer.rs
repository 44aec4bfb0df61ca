//! Answer encoding for the worker's standard input

use crate::question::QuestionKind;

/// Encode an answer as the single line the worker expects.
///
/// Yes/no answers become `y` (for 1) or `n`; selection answers become the
/// decimal index. The line is newline-terminated.
#[must_use]
pub fn encode_answer(kind: QuestionKind, value: usize) -> String {
    match kind {
        QuestionKind::YesNo if value == 1 => "y\n".to_string(),
        QuestionKind::YesNo => "n\n".to_string(),
        QuestionKind::SelectProvider | QuestionKind::Conflict => format!("{}\n", value),
    }
}

/// Decode an answer line as the worker reads it.
///
/// Accepts `y`/`yes`/`n`/`no` (any case) for yes/no questions and a bare
/// decimal index for selections. Surrounding whitespace is ignored.
#[must_use]
pub fn decode_answer(kind: QuestionKind, line: &str) -> Option<usize> {
    let line = line.trim();
    match kind {
        QuestionKind::YesNo => match line.to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(1),
            "n" | "no" => Some(0),
            _ => None,
        },
        QuestionKind::SelectProvider | QuestionKind::Conflict => line.parse().ok(),
    }
}
