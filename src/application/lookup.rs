//! Boundary to the file lookup collaborator.

use std::{
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("file {name:?} not found\nsearch paths:\n\t{}", join_paths(search_paths))]
    MissingFile {
        name: String,
        search_paths: Vec<PathBuf>,
    },
    #[error("failed to resolve search path {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join("\n\t")
}

/// Resolves a file name to an absolute path.
pub trait Lookup: Send + Sync {
    fn find(&self, name: &Path) -> Result<PathBuf, LookupError>;
}
