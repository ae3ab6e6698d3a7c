//! Reference hash storage.
//!
//! # Components
//!
//! - **Hash files**: one JSON object per locale mapping card id to a base64
//!   fingerprint ([`format`]).
//! - **Sources**: where hash files come from, a local directory or an HTTP
//!   endpoint ([`HashSource`]).
//! - **Store**: a long-lived, single-flight loader that memoizes locales and
//!   assembles [`ReferenceSet`]s with default-locale fallback.
//! - **Cache**: a pluggable key-value cache of client-computed hashes
//!   ([`HashCache`]) so a catalogue is never re-hashed from scratch.

pub mod cache;
pub mod format;
#[cfg(feature = "network")]
pub mod http;
pub mod set;
pub mod source;
pub mod store;

pub use cache::{CatalogueHasher, FileHashCache, HashCache, MemoryHashCache, SyncReport};
pub use format::{hash_file_name, parse_hash_file, read_hash_file, render_hash_file, write_hash_file};
#[cfg(feature = "network")]
pub use http::{HttpSource, HttpSourceConfig};
pub use set::{LocaleHashes, ReferenceSet};
pub use source::{DirectorySource, HashSource};
pub use store::ReferenceStore;
