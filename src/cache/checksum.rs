//! Memoized content checksums for referenced files.

use std::{
    fs::File,
    io::{self, Read},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::SystemTime,
};

use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::bounded::BoundedCache;

pub const DEFAULT_CHECKSUM_CACHE_CAPACITY: usize = 128;
pub const CHECKSUM_PREFIX: &str = "sha256:";

const CACHE_NAME: &str = "checksum";
const READ_BUFFER_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ChecksumError {
    #[error("file {} not found", path.display())]
    Missing { path: PathBuf },
    #[error("failed to checksum {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ChecksumError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::Missing {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Checksums keyed by `(modification time, path)`.
///
/// A file whose mtime is unchanged is assumed to have unchanged content, so
/// its digest is served from memory. Resolution is bounded by the
/// filesystem's timestamp granularity.
pub struct ChecksumCache {
    entries: BoundedCache<(SystemTime, PathBuf), String>,
}

impl Default for ChecksumCache {
    fn default() -> Self {
        Self::new(
            NonZeroUsize::new(DEFAULT_CHECKSUM_CACHE_CAPACITY)
                .unwrap_or(NonZeroUsize::MIN),
        )
    }
}

impl ChecksumCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: BoundedCache::new(CACHE_NAME, capacity),
        }
    }

    /// Return `sha256:<base64url digest>` for the file at `path`.
    pub fn checksum(&self, path: &Path) -> Result<String, ChecksumError> {
        let modified = std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(|err| ChecksumError::from_io(path, err))?;

        self.entries
            .try_fetch((modified, path.to_path_buf()), || digest_file(path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }
}

/// Hash a file without consulting any cache.
pub fn digest_file(path: &Path) -> Result<String, ChecksumError> {
    let mut file = File::open(path).map_err(|err| ChecksumError::from_io(path, err))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0_u8; READ_BUFFER_BYTES];

    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|err| ChecksumError::from_io(path, err))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(encode_digest(hasher.finalize().as_slice()))
}

/// Hash an in-memory payload the same way [`digest_file`] hashes files.
pub fn digest_bytes(bytes: &[u8]) -> String {
    encode_digest(Sha256::digest(bytes).as_slice())
}

fn encode_digest(digest: &[u8]) -> String {
    format!("{CHECKSUM_PREFIX}{}", URL_SAFE.encode(digest))
}
