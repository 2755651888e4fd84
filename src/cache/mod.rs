//! In-memory caches.
//!
//! - [`BoundedCache`]: generic fixed-capacity LRU store safe to share between threads
//! - [`ChecksumCache`]: file checksums memoized by `(mtime, path)`
//!
//! The checksum cache is meant to be created once per process and shared by
//! every document render, see [`crate::application::RenderService`].

mod bounded;
mod checksum;
mod lock;

pub use bounded::BoundedCache;
pub use checksum::{
    CHECKSUM_PREFIX, ChecksumCache, ChecksumError, DEFAULT_CHECKSUM_CACHE_CAPACITY, digest_bytes,
    digest_file,
};
