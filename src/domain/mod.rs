//! Domain layer types and invariants.

pub mod attachment;
pub mod upload;

pub use attachment::{Attachment, AttachmentKind, Rename, RenameError, strip_extension};
pub use upload::{TransferMode, UploadPart};
