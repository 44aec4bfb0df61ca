//! Stateful decoder for the worker's control stream

use tracing::{debug, trace};

use crate::question::{QuestionKind, QuestionSpec};

/// Opens a provider selection frame: `BEGIN_PROVIDER:<subject>`
pub const BEGIN_PROVIDER: &str = "BEGIN_PROVIDER";
/// Commits a provider selection frame
pub const END_PROVIDER: &str = "END_PROVIDER";
/// Opens a conflict frame: `BEGIN_CONFLICT:<text>`
pub const BEGIN_CONFLICT: &str = "BEGIN_CONFLICT";
/// Commits a conflict frame
pub const END_CONFLICT: &str = "END_CONFLICT";
/// One option of the open frame: `OPTION:<index>:<text>`
pub const OPTION: &str = "OPTION";
/// Single-line yes/no question: `QUESTION:<text>`
pub const QUESTION: &str = "QUESTION";

/// Largest number of options one frame may carry
pub const MAX_OPTIONS: usize = 256;

/// What one control-stream line amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A frame line was absorbed into the open frame
    Consumed,
    /// A frame completed; publish this question
    Question(QuestionSpec),
    /// Opaque log/progress text
    Text(String),
    /// A protocol violation; the line was discarded
    Violation(ProtocolViolation),
}

/// Unexpected framing on the control stream.
///
/// Never fatal: the engine may recover from the same condition on its own.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// `OPTION` with no `BEGIN_*` open
    #[error("OPTION line with no open frame")]
    OrphanOption,
    /// `END_*` with no matching `BEGIN_*` open
    #[error("{0} with no matching BEGIN")]
    UnmatchedEnd(&'static str),
    /// A new `BEGIN_*` arrived before the open frame's `END_*`
    #[error("{next} arrived while {open} frame was still open; partial frame dropped")]
    Superseded {
        /// Tag of the dropped frame
        open: &'static str,
        /// Tag that replaced it
        next: &'static str,
    },
    /// `OPTION` line without a numeric index
    #[error("malformed OPTION line: {0}")]
    MalformedOption(String),
    /// `OPTION` index beyond [`MAX_OPTIONS`]
    #[error("option index {0} exceeds the frame limit")]
    IndexTooLarge(usize),
}

struct OpenFrame {
    kind: QuestionKind,
    header: String,
    /// Sparse option slots indexed by the worker's `<index>`
    slots: Vec<Option<String>>,
}

impl OpenFrame {
    fn begin_tag(&self) -> &'static str {
        match self.kind {
            QuestionKind::Conflict => BEGIN_CONFLICT,
            _ => BEGIN_PROVIDER,
        }
    }

    fn into_spec(self) -> QuestionSpec {
        let options: Vec<String> = self
            .slots
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();
        match self.kind {
            QuestionKind::Conflict => QuestionSpec::conflict(self.header, options),
            _ => QuestionSpec::provider(self.header, options),
        }
    }
}

/// Line-at-a-time decoder for the control protocol.
///
/// Frames are `BEGIN_* → OPTION* → END_*`; option lines may arrive in any
/// order and a question is only produced when the closing tag is seen.
#[derive(Default)]
pub struct FrameDecoder {
    open: Option<OpenFrame>,
}

impl FrameDecoder {
    /// Create a decoder with no open frame
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a `BEGIN_*` has been seen without its `END_*`
    #[must_use]
    pub fn is_frame_open(&self) -> bool {
        self.open.is_some()
    }

    /// Drop any partial frame. Returns true if one was open.
    pub fn reset(&mut self) -> bool {
        self.open.take().is_some()
    }

    /// Decode one line (a trailing `\r`/`\n` is ignored)
    pub fn feed(&mut self, line: &str) -> Decoded {
        let line = line.trim_end_matches(['\r', '\n']);
        trace!(line = %line, "control line");

        if let Some(text) = line.strip_prefix("QUESTION:") {
            return Decoded::Question(QuestionSpec::yes_no(text));
        }

        let tag = line.trim_end();
        if tag == END_PROVIDER {
            return self.end(QuestionKind::SelectProvider, END_PROVIDER);
        }
        if tag == END_CONFLICT {
            return self.end(QuestionKind::Conflict, END_CONFLICT);
        }
        if let Some(header) = tag_payload(line, BEGIN_PROVIDER) {
            return self.begin(QuestionKind::SelectProvider, BEGIN_PROVIDER, header);
        }
        if let Some(header) = tag_payload(line, BEGIN_CONFLICT) {
            return self.begin(QuestionKind::Conflict, BEGIN_CONFLICT, header);
        }
        if let Some(rest) = line.strip_prefix("OPTION:") {
            return self.option(rest);
        }

        Decoded::Text(line.to_string())
    }

    fn begin(&mut self, kind: QuestionKind, tag: &'static str, header: &str) -> Decoded {
        let previous = self.open.replace(OpenFrame {
            kind,
            header: header.to_string(),
            slots: Vec::new(),
        });
        match previous {
            Some(stale) => Decoded::Violation(ProtocolViolation::Superseded {
                open: stale.begin_tag(),
                next: tag,
            }),
            None => Decoded::Consumed,
        }
    }

    fn option(&mut self, rest: &str) -> Decoded {
        let Some(frame) = self.open.as_mut() else {
            return Decoded::Violation(ProtocolViolation::OrphanOption);
        };
        let (index, text) = rest.split_once(':').unwrap_or((rest, ""));
        let Ok(index) = index.trim().parse::<usize>() else {
            return Decoded::Violation(ProtocolViolation::MalformedOption(rest.to_string()));
        };
        if index >= MAX_OPTIONS {
            return Decoded::Violation(ProtocolViolation::IndexTooLarge(index));
        }

        if frame.slots.len() <= index {
            frame.slots.resize(index + 1, None);
        }
        if frame.slots[index].replace(text.to_string()).is_some() {
            debug!(index, "Duplicate option index; keeping the latest text");
        }
        Decoded::Consumed
    }

    fn end(&mut self, kind: QuestionKind, tag: &'static str) -> Decoded {
        match self.open.take() {
            Some(frame) if frame.kind == kind => Decoded::Question(frame.into_spec()),
            Some(frame) => {
                // Mismatched END: keep the open frame, drop the line.
                self.open = Some(frame);
                Decoded::Violation(ProtocolViolation::UnmatchedEnd(tag))
            }
            None => Decoded::Violation(ProtocolViolation::UnmatchedEnd(tag)),
        }
    }
}

/// `TAG` alone or `TAG:<payload>`; anything else is not this tag.
fn tag_payload<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(tag)?;
    if rest.trim_end().is_empty() {
        Some("")
    } else {
        rest.strip_prefix(':')
    }
}
