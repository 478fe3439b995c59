//! # keydex storage
//!
//! Byte-store backends for the keydex enumerator.
//!
//! This crate provides the lowest-level storage abstraction in keydex.
//! Backends are **opaque byte stores**: they support reading at an offset,
//! appending at the end, and flushing. They never interpret the bytes they
//! hold; the value-log and map file formats live entirely in
//! `keydex_core`.
//!
//! ## Available backends
//!
//! - [`InMemoryBackend`]: ephemeral storage for tests and in-memory
//!   enumerator configurations
//! - [`FileBackend`]: persistent storage over OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use keydex_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"payload").unwrap();
//! assert_eq!(backend.read_at(offset, 7).unwrap(), b"payload");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
