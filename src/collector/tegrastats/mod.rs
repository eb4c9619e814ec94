//! tegrastats sampling and decoding.
//!
//! - [`process`] starts and stops the tegrastats writer.
//! - [`source`] reads the latest complete line from its log and truncates it.
//! - [`parser`] holds the pure field decoders.
//! - [`decoder`] turns a line into a [`Snapshot`](crate::storage::Snapshot).

pub mod decoder;
pub mod parser;
pub mod process;
pub mod source;
pub mod tailer;

pub use decoder::LineDecoder;
pub use parser::{DecodeError, parse_line};
pub use process::{SourceError, TegrastatsProcess, locate_tegrastats};
pub use source::SampleSource;
