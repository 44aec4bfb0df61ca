//! Session - One worker process per operation
//!
//! A [`Session`] spawns the worker (directly or through the elevation
//! program), pumps its stdout as progress text and its stderr through the
//! control-protocol decoder, answers the elevation prompt once with the stored
//! secret, and writes question answers back to the worker's stdin.
//!
//! ## Ordering
//!
//! All stdin writes go through one [`StdinWriter`]. Every stderr line holds an
//! [`InFlight`] guard until whatever it triggered is finished, and stdin is
//! only closed once the count reaches zero (or the drain timeout passes), so a
//! frame that completes as the worker exits still gets its answer.

mod classify;
mod config;
mod drain;
mod lines;
mod pump;
mod runner;
mod state;
mod stdin;


pub use classify::FailureKind;
pub use config::{
    ElevationConfig, PromptDetector, SessionConfig, DEFAULT_AUTH_FAILURE_PHRASES,
    DEFAULT_DRAIN_TIMEOUT, DEFAULT_PROMPT_PATTERN,
};
pub use drain::{close_after_drain, InFlight, InFlightGuard};
pub use runner::Session;
pub use state::SessionState;
pub use stdin::StdinWriter;
