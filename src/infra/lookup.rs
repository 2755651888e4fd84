//! Locating attachment files across an ordered list of search paths.
//!
//! Libraries that ship default styles or images add their own directory to
//! the list; the application's directory usually comes first so it can
//! override those defaults.

use std::path::{Path, PathBuf};

use crate::{
    application::lookup::{Lookup, LookupError},
    util::paths::{absolutize, normalize},
};

/// Search paths in priority order.
#[derive(Debug, Clone, Default)]
pub struct SearchPaths {
    paths: Vec<PathBuf>,
}

impl SearchPaths {
    /// Relative entries are expanded against the current directory.
    pub fn new<I, P>(paths: I) -> Result<Self, LookupError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let paths = paths
            .into_iter()
            .map(|path| {
                let path = path.as_ref();
                absolutize(path).map_err(|source| LookupError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Lookup for SearchPaths {
    fn find(&self, name: &Path) -> Result<PathBuf, LookupError> {
        if name.is_absolute() {
            return Ok(normalize(name));
        }

        self.paths
            .iter()
            .map(|root| normalize(&root.join(name)))
            .find(|candidate| candidate.exists())
            .ok_or_else(|| LookupError::MissingFile {
                name: name.display().to_string(),
                search_paths: self.paths.clone(),
            })
    }
}
