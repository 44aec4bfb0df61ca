//! Worker side of the control protocol.
//!
//! The transaction engine raises its questions from a native callback thread
//! that must block until the answer arrives. [`WorkerPrompter`] is that
//! blocking adapter: it writes a frame to the control writer (the worker's
//! stderr), then blocks reading one answer line from its input (stdin).

use std::io::{self, BufRead, Write};

use super::answer::decode_answer;
use super::decoder::{BEGIN_CONFLICT, BEGIN_PROVIDER, END_CONFLICT, END_PROVIDER};
use crate::question::{QuestionKind, QuestionSpec};

/// Render a question as control-protocol lines (without newlines).
///
/// Embedded newlines in any text are replaced with spaces, since one
/// directive must fit on one line.
#[must_use]
pub fn encode_frame(spec: &QuestionSpec) -> Vec<String> {
    let options = spec
        .options
        .iter()
        .enumerate()
        .map(|(i, text)| format!("OPTION:{}:{}", i, single_line(text)));

    match spec.kind {
        QuestionKind::YesNo => vec![format!("QUESTION:{}", single_line(&spec.text))],
        QuestionKind::SelectProvider => {
            let subject = spec.subject.as_deref().unwrap_or_default();
            std::iter::once(format!("{}:{}", BEGIN_PROVIDER, single_line(subject)))
                .chain(options)
                .chain(std::iter::once(END_PROVIDER.to_string()))
                .collect()
        }
        QuestionKind::Conflict => {
            std::iter::once(format!("{}:{}", BEGIN_CONFLICT, single_line(&spec.text)))
                .chain(options)
                .chain(std::iter::once(END_CONFLICT.to_string()))
                .collect()
        }
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// Blocking question/answer exchange over a worker's standard streams
pub struct WorkerPrompter<R, W> {
    input: R,
    control: W,
}

impl<R: BufRead, W: Write> WorkerPrompter<R, W> {
    /// Wrap the worker's input reader and control writer
    pub fn new(input: R, control: W) -> Self {
        Self { input, control }
    }

    /// Emit `spec` and block until its answer line arrives.
    ///
    /// Fails with `UnexpectedEof` if the input closes first and `InvalidData`
    /// if the line is not a legal answer for the question.
    pub fn ask(&mut self, spec: &QuestionSpec) -> io::Result<usize> {
        for line in encode_frame(spec) {
            writeln!(self.control, "{}", line)?;
        }
        self.control.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed while waiting for an answer",
            ));
        }

        decode_answer(spec.kind, &answer)
            .filter(|value| spec.check_answer(*value).is_ok())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid {} answer: {:?}", spec.kind, answer.trim_end()),
                )
            })
    }

    /// Ask a yes/no question
    pub fn confirm(&mut self, text: &str) -> io::Result<bool> {
        self.ask(&QuestionSpec::yes_no(text)).map(|v| v == 1)
    }

    /// Give back the wrapped streams
    pub fn into_inner(self) -> (R, W) {
        (self.input, self.control)
    }
}
