//! Control-protocol codec
//!
//! The worker writes free-form text and control frames to its standard error
//! and reads answers from its standard input:
//!
//! ```text
//! worker → bridge   BEGIN_PROVIDER:<subject> | BEGIN_CONFLICT:<text>
//!                   OPTION:<index>:<text>
//!                   END_PROVIDER | END_CONFLICT
//!                   QUESTION:<text>
//! bridge → worker   <digits> | y | n | <secret>
//! ```
//!
//! [`FrameDecoder`] turns control lines into questions; [`encode_answer`]
//! renders answers. The [`worker`] module holds the blocking worker-side half.

pub mod answer;
pub mod decoder;
pub mod worker;

pub use answer::{decode_answer, encode_answer};
pub use decoder::{Decoded, FrameDecoder, ProtocolViolation, MAX_OPTIONS};
pub use worker::{encode_frame, WorkerPrompter};
