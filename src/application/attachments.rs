//! Collecting the attachments of one document.

use std::{
    collections::{BTreeSet, HashMap},
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use crate::{
    application::lookup::{Lookup, LookupError},
    cache::{ChecksumCache, ChecksumError},
    domain::{Attachment, AttachmentKind, Rename, RenameError, TransferMode, UploadPart},
    util::paths::absolutize,
};

pub const MAIN_INPUT_NAME: &str = "input.tex";

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error(transparent)]
    Rename(#[from] RenameError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("attachment name `{name}` is already taken by another attachment")]
    DuplicateName { name: String },
    #[error("failed to read attachment {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Checksum(#[from] ChecksumError),
}

impl AttachmentError {
    fn read(path: &Path, source: io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Insertion-ordered attachments with unique names.
///
/// Files are deduplicated by absolute path: attaching a path a second time
/// returns the first entry unchanged, whatever the new rename option says.
/// A set belongs to a single render and is not meant to be shared while it
/// is still being filled.
pub struct AttachmentSet {
    lookup: Arc<dyn Lookup>,
    items: Vec<Attachment>,
    by_name: HashMap<String, usize>,
    by_path: HashMap<PathBuf, usize>,
}

impl std::fmt::Debug for AttachmentSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentSet")
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

impl AttachmentSet {
    pub fn new(lookup: Arc<dyn Lookup>) -> Self {
        Self {
            lookup,
            items: Vec::new(),
            by_name: HashMap::new(),
            by_path: HashMap::new(),
        }
    }

    /// Attach a file found through the search paths; always uploaded in full.
    pub fn attach(
        &mut self,
        path: impl AsRef<Path>,
        rename: impl Into<Rename>,
    ) -> Result<&Attachment, AttachmentError> {
        let path = self.lookup.find(path.as_ref())?;
        self.insert_path(path, rename.into(), false)
    }

    /// Attach a file found through the search paths, uploaded as a checksum
    /// reference when the server already knows its content.
    pub fn reference(
        &mut self,
        path: impl AsRef<Path>,
        rename: impl Into<Rename>,
    ) -> Result<&Attachment, AttachmentError> {
        let path = self.lookup.find(path.as_ref())?;
        self.insert_path(path, rename.into(), true)
    }

    /// Attach a file by path, bypassing the search paths.
    pub fn asset(
        &mut self,
        path: impl AsRef<Path>,
        rename: impl Into<Rename>,
    ) -> Result<&Attachment, AttachmentError> {
        let path = path.as_ref();
        let absolute = absolutize(path)
            .map_err(|err| AttachmentError::read(path, err))?;
        self.insert_path(absolute, rename.into(), false)
    }

    /// Attach in-memory content under `name`.
    pub fn inline(
        &mut self,
        contents: impl Into<Bytes>,
        name: &str,
    ) -> Result<&Attachment, AttachmentError> {
        if name.is_empty() {
            return Err(RenameError::Empty.into());
        }
        if self.by_name.contains_key(name) {
            return Err(AttachmentError::DuplicateName {
                name: name.to_string(),
            });
        }

        let attachment = Attachment::new(
            name.to_string(),
            self.items.len(),
            AttachmentKind::Dynamic {
                contents: contents.into(),
            },
        );
        Ok(self.push(attachment, None))
    }

    /// Add the document body as `input.tex`, or as the first free
    /// `docNNNNN.tex` when a file already uses that name.
    pub fn main_input(&mut self, contents: impl Into<Bytes>) -> &Attachment {
        let name = self.main_input_name();
        let attachment = Attachment::new(
            name,
            self.items.len(),
            AttachmentKind::Dynamic {
                contents: contents.into(),
            },
        );
        self.push(attachment, None)
    }

    pub fn get(&self, name: &str) -> Option<&Attachment> {
        self.by_name.get(name).map(|&index| &self.items[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attachment> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Serialize every attachment into an upload part, in insertion order.
    ///
    /// References whose checksum is listed in `unresolved` carry their full
    /// content so the server can store it; all other references only carry
    /// their checksum.
    pub fn upload_parts(
        &self,
        checksums: &ChecksumCache,
        unresolved: &BTreeSet<String>,
    ) -> Result<Vec<UploadPart>, AttachmentError> {
        self.items
            .iter()
            .map(|attachment| serialize(attachment, checksums, unresolved))
            .collect()
    }

    fn insert_path(
        &mut self,
        path: PathBuf,
        rename: Rename,
        reference: bool,
    ) -> Result<&Attachment, AttachmentError> {
        if let Some(&index) = self.by_path.get(&path) {
            return Ok(&self.items[index]);
        }

        let name = rename.output_name(&path, self.items.len())?;
        if self.by_name.contains_key(&name) {
            return Err(AttachmentError::DuplicateName { name });
        }

        let kind = if reference {
            AttachmentKind::Reference { path: path.clone() }
        } else {
            AttachmentKind::File { path: path.clone() }
        };
        let attachment = Attachment::new(name, self.items.len(), kind);
        Ok(self.push(attachment, Some(path)))
    }

    fn push(&mut self, attachment: Attachment, path: Option<PathBuf>) -> &Attachment {
        let index = self.items.len();
        debug!(
            name = attachment.name(),
            serial = index,
            reference = attachment.is_reference(),
            "Attachment added"
        );
        self.by_name.insert(attachment.name().to_string(), index);
        if let Some(path) = path {
            self.by_path.insert(path, index);
        }
        self.items.push(attachment);
        &self.items[index]
    }

    fn main_input_name(&self) -> String {
        if !self.by_name.contains_key(MAIN_INPUT_NAME) {
            return MAIN_INPUT_NAME.to_string();
        }
        let mut counter = 1_usize;
        loop {
            let candidate = format!("doc{counter:05}.tex");
            if !self.by_name.contains_key(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }
}

fn serialize(
    attachment: &Attachment,
    checksums: &ChecksumCache,
    unresolved: &BTreeSet<String>,
) -> Result<UploadPart, AttachmentError> {
    let name = attachment.name().to_string();
    let part = match attachment.kind() {
        AttachmentKind::File { path } => UploadPart {
            name,
            mode: TransferMode::Content,
            body: std::fs::read(path)
                .map_err(|err| AttachmentError::read(path, err))?,
        },
        AttachmentKind::Dynamic { contents } => UploadPart {
            name,
            mode: TransferMode::Content,
            body: contents.to_vec(),
        },
        AttachmentKind::Reference { path } => {
            let checksum = checksums.checksum(path)?;
            if unresolved.contains(&checksum) {
                UploadPart {
                    name,
                    mode: TransferMode::StoreReference { checksum },
                    body: std::fs::read(path)
                        .map_err(|err| AttachmentError::read(path, err))?,
                }
            } else {
                UploadPart {
                    name,
                    body: checksum.clone().into_bytes(),
                    mode: TransferMode::UseReference { checksum },
                }
            }
        }
    };
    Ok(part)
}
