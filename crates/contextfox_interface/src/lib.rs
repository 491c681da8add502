//! Trait definitions for ContextFox.
//!
//! The pipeline talks to its collaborators only through these traits:
//! - [`CompletionDriver`] sends chat completion requests
//! - [`ModelCatalog`] reports model context windows
//! - [`KeyValueStore`] persists story state and settings

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod traits;

pub use traits::{CompletionDriver, KeyValueStore, ModelCatalog};
