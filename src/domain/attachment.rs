//! Attachments: named payloads uploaded next to the main document.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use crate::util::paths::{basename, extension};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenameError {
    #[error("invalid renaming: expected true, false, or a string, got {0}")]
    Invalid(String),
    #[error("invalid renaming: the output name must not be empty")]
    Empty,
}

/// How the output name of a file attachment is chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Rename {
    /// Sequential `attNNNN<ext>` name, collision free within a set.
    #[default]
    Mangle,
    /// The file's basename, unaltered. Collisions are the caller's problem.
    Keep,
    /// This exact name.
    To(String),
}

impl From<bool> for Rename {
    fn from(mangle: bool) -> Self {
        if mangle { Self::Mangle } else { Self::Keep }
    }
}

impl From<&str> for Rename {
    fn from(name: &str) -> Self {
        Self::To(name.to_string())
    }
}

impl From<String> for Rename {
    fn from(name: String) -> Self {
        Self::To(name)
    }
}

/// Templates hand rename options over as loosely typed values.
impl TryFrom<&Value> for Rename {
    type Error = RenameError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(mangle) => Ok(Self::from(*mangle)),
            Value::String(name) => Ok(Self::To(name.clone())),
            other => Err(RenameError::Invalid(other.to_string())),
        }
    }
}

impl Rename {
    /// Output name for the file at `path` inserted as entry number `serial`.
    pub fn output_name(&self, path: &Path, serial: usize) -> Result<String, RenameError> {
        let name = match self {
            Self::Mangle => format!("att{serial:04}{}", extension(path)),
            Self::Keep => basename(path),
            Self::To(name) => basename(Path::new(name)),
        };
        if name.is_empty() {
            return Err(RenameError::Empty);
        }
        Ok(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Always uploaded in full.
    File { path: PathBuf },
    /// Uploaded as a checksum unless the server asks for the content.
    Reference { path: PathBuf },
    /// In-memory content such as the main document body.
    Dynamic { contents: Bytes },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    name: String,
    serial: usize,
    kind: AttachmentKind,
}

impl Attachment {
    pub(crate) fn new(name: String, serial: usize, kind: AttachmentKind) -> Self {
        Self { name, serial, kind }
    }

    /// Upload field name and output file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name as referenced from TeX sources; `\usepackage` for example
    /// expects it without extension.
    pub fn output_name(&self, with_extension: bool) -> &str {
        if with_extension {
            &self.name
        } else {
            strip_extension(&self.name)
        }
    }

    pub fn serial(&self) -> usize {
        self.serial
    }

    pub fn kind(&self) -> &AttachmentKind {
        &self.kind
    }

    pub fn absolute_path(&self) -> Option<&Path> {
        match &self.kind {
            AttachmentKind::File { path } | AttachmentKind::Reference { path } => Some(path),
            AttachmentKind::Dynamic { .. } => None,
        }
    }

    pub fn contents(&self) -> Option<&Bytes> {
        match &self.kind {
            AttachmentKind::Dynamic { contents } => Some(contents),
            _ => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, AttachmentKind::Reference { .. })
    }
}

/// Cut everything from the last `.` on, except for dotfiles.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        None | Some(0) => name,
        Some(dot) => &name[..dot],
    }
}
