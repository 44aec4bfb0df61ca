//! Output and control-stream pumps

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::config::PromptDetector;
use super::drain::{InFlight, InFlightGuard};
use super::lines::{Chunk, ChunkedLines};
use super::state::{Lifecycle, SessionState};
use super::stdin::StdinWriter;
use crate::event_bus::{BridgeEvent, EventBus, StreamKind};
use crate::protocol::{Decoded, FrameDecoder};
use crate::question::QuestionSpec;
use crate::secret::SecretStore;

/// A completed frame waiting for its turn, with the handler still in flight
pub(crate) struct QueuedQuestion {
    pub spec: QuestionSpec,
    pub guard: InFlightGuard,
}

/// Read stdout line by line into the output buffer, publishing each line.
pub(crate) async fn pump_stdout<R>(reader: R, session_id: Uuid, events: EventBus) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut output = String::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim_end_matches(['\r', '\n']);
                trace!(session_id = %session_id, line = %line, "stdout");
                output.push_str(line);
                output.push('\n');
                events.publish(BridgeEvent::LogLine {
                    session_id,
                    stream: StreamKind::Stdout,
                    line: line.to_string(),
                });
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Worker stdout read failed");
                break;
            }
        }
    }
    output
}

/// What the control-stream pump learned by the time the stream closed
#[derive(Debug, Default)]
pub(crate) struct StderrOutcome {
    pub error: String,
    pub secret_sent: bool,
    pub secret_rejected: bool,
    pub secret_missing: bool,
}

/// Reads the worker's stderr: answers the elevation prompt, decodes control
/// frames and collects everything else as error text.
pub(crate) struct StderrPump {
    pub session_id: Uuid,
    pub elevated: bool,
    pub detector: PromptDetector,
    pub secrets: Arc<SecretStore>,
    pub stdin: Arc<StdinWriter>,
    pub inflight: InFlight,
    pub lifecycle: Arc<Lifecycle>,
    pub events: EventBus,
    pub questions: mpsc::UnboundedSender<QueuedQuestion>,
}

impl StderrPump {
    pub async fn run<R>(self, reader: R) -> StderrOutcome
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = ChunkedLines::new(reader);
        let mut decoder = FrameDecoder::new();
        let mut outcome = StderrOutcome::default();
        let mut questions_seen = false;

        loop {
            let chunk = match lines.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    warn!(session_id = %self.session_id, error = %e, "Worker stderr read failed");
                    break;
                }
            };

            let guard = self.inflight.enter();
            match chunk {
                Chunk::Partial(tail) => {
                    if self.is_prompt(&tail) {
                        lines.discard_partial();
                        self.on_prompt(&mut outcome, questions_seen).await;
                    }
                }
                Chunk::Line(line) if self.is_prompt(&line) => {
                    self.on_prompt(&mut outcome, questions_seen).await;
                }
                Chunk::Line(line) => {
                    if self.lifecycle.get() == SessionState::WaitingForSecretPrompt {
                        self.lifecycle.set(SessionState::Running);
                    }
                    match decoder.feed(&line) {
                        Decoded::Consumed => {}
                        Decoded::Text(text) => {
                            outcome.error.push_str(&text);
                            outcome.error.push('\n');
                            self.events.publish(BridgeEvent::LogLine {
                                session_id: self.session_id,
                                stream: StreamKind::Stderr,
                                line: text,
                            });
                        }
                        Decoded::Question(spec) => {
                            questions_seen = true;
                            if self.questions.send(QueuedQuestion { spec, guard }).is_err() {
                                warn!(session_id = %self.session_id, "Answer task gone; question dropped");
                            }
                        }
                        Decoded::Violation(violation) => {
                            warn!(
                                session_id = %self.session_id,
                                violation = %violation,
                                "Protocol violation; line discarded"
                            );
                        }
                    }
                }
            }
        }

        if decoder.reset() {
            warn!(session_id = %self.session_id, "Control stream closed inside an open frame");
        }
        outcome
    }

    fn is_prompt(&self, text: &str) -> bool {
        self.elevated && self.detector.is_prompt(text)
    }

    /// The prompt line itself is never recorded or published.
    async fn on_prompt(&self, outcome: &mut StderrOutcome, questions_seen: bool) {
        if outcome.secret_sent {
            warn!(session_id = %self.session_id, "Elevation prompt repeated; secret rejected");
            outcome.secret_rejected = true;
            self.abandon_elevation(questions_seen).await;
            return;
        }

        match self.secrets.secret_for_prompt() {
            Some(secret) => match self.stdin.write_secret(&secret).await {
                Ok(()) => {
                    outcome.secret_sent = true;
                    debug!(session_id = %self.session_id, "Elevation prompt answered");
                    self.lifecycle.set(SessionState::Running);
                }
                Err(e) => {
                    warn!(session_id = %self.session_id, error = %e, "Could not deliver elevation secret");
                    outcome.secret_missing = true;
                }
            },
            None => {
                warn!(session_id = %self.session_id, "Elevation prompt seen but no secret is held");
                outcome.secret_missing = true;
                self.abandon_elevation(questions_seen).await;
            }
        }
    }

    /// Make the elevation tool give up instead of waiting on its prompt.
    async fn abandon_elevation(&self, questions_seen: bool) {
        if questions_seen {
            return;
        }
        if self.stdin.close().await {
            debug!(session_id = %self.session_id, "Closed worker stdin after failed elevation");
        }
    }
}
