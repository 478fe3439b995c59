//! Append-only value log.
//!
//! The log is the source of truth of the enumerator: an ordered,
//! append-only sequence of codec-encoded key payloads. Payloads are never
//! rewritten; the map file is merely an index over it and can always be
//! reconstructed by scanning the log from the start.

mod format;
mod value_log;

pub use format::{compute_crc32, HEADER_SIZE, LOG_MAGIC, LOG_VERSION, RECORD_OVERHEAD};
pub use value_log::{LogIter, ValueLog};
