//! Serialized form of an attachment, one multipart part each.

use texd_api_types::{REFERENCE_STORE, REFERENCE_USE};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// How a part transfers its attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferMode {
    /// Raw content of a file or dynamic attachment.
    Content,
    /// Checksum only; the server resolves it from its store.
    UseReference { checksum: String },
    /// Raw content, to be stored by the server under `checksum`.
    StoreReference { checksum: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPart {
    pub name: String,
    pub mode: TransferMode,
    pub body: Vec<u8>,
}

impl UploadPart {
    pub fn content_type(&self) -> &'static str {
        match self.mode {
            TransferMode::Content => mime_guess::from_path(&self.name)
                .first_raw()
                .unwrap_or(FALLBACK_CONTENT_TYPE),
            TransferMode::UseReference { .. } => REFERENCE_USE,
            TransferMode::StoreReference { .. } => REFERENCE_STORE,
        }
    }

    pub fn checksum(&self) -> Option<&str> {
        match &self.mode {
            TransferMode::Content => None,
            TransferMode::UseReference { checksum } | TransferMode::StoreReference { checksum } => {
                Some(checksum)
            }
        }
    }
}
