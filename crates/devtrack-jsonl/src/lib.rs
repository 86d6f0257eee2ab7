//! Line-oriented JSON persistence for DevTrack data files.
//!
//! Every record is serialized to exactly one line. Reading is resilient:
//! malformed lines are reported as [`Warning`]s instead of aborting the load,
//! and writing goes through a temp-file-then-rename step so a crash never
//! leaves a half-written data file behind.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod atomic;
pub mod error;
pub mod reader;
pub mod warning;
pub mod writer;

pub use atomic::write_jsonl_atomic;
pub use error::{Error, Result};
pub use reader::{read_jsonl_resilient, JsonlReader, Line, MAX_LINE_BYTES};
pub use warning::Warning;
pub use writer::JsonlWriter;
