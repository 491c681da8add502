//! Story state persistence for ContextFox.
//!
//! Two [`KeyValueStore`](contextfox_interface::KeyValueStore) backends and a
//! [`StoryRepository`] that keeps one JSON [`StoryRecord`] per story:
//!
//! - [`FileKeyValueStore`] - one file per key, atomic temp-file + rename writes
//! - [`MemoryKeyValueStore`] - process-local map, used by tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod filesystem;
mod memory;
mod repository;

pub use filesystem::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;
pub use repository::{StoryRecord, StoryRepository};
