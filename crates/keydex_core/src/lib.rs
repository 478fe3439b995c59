//! # keydex core
//!
//! Durable key enumerator: assigns stable positive integer ids to keys
//! and resolves them back, surviving process restarts.
//!
//! Keys are encoded by a [`keydex_codec::KeyCodec`] and appended to a
//! checksummed value log, which is the single source of truth: an id is
//! the 1-based ordinal of its record. A hash-bucket map over the log
//! accelerates lookups and is reconstructible from the log at any time,
//! so losing the map (or finding it stale) costs a rebuild, never data.
//!
//! ## Usage
//!
//! ```no_run
//! use keydex_core::{DurableEnumerator, EnumeratorConfig};
//! use keydex_codec::Utf8Codec;
//! use std::path::Path;
//!
//! # fn main() -> keydex_core::CoreResult<()> {
//! let enumerator = DurableEnumerator::open(
//!     Path::new("/tmp/keydex"),
//!     Utf8Codec,
//!     EnumeratorConfig::default(),
//! )?;
//!
//! let id = enumerator.enumerate(&"some key".to_string())?;
//! assert_eq!(enumerator.value_of(id)?, "some key");
//! enumerator.close()?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod dir;
mod enumerator;
mod error;
mod log;
mod map;
mod types;

pub use config::{EnumeratorConfig, MapKind};
pub use enumerator::DurableEnumerator;
pub use error::{CoreError, CoreResult};
pub use types::KeyId;
