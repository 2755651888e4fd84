//! Application services: document assembly and the render workflow.

pub mod attachments;
pub mod document;
pub mod error;
pub mod lookup;
pub mod render;

pub use attachments::{AttachmentError, AttachmentSet, MAIN_INPUT_NAME};
pub use document::{Compilation, Document, Layout, TemplateEngine};
pub use error::{AppError, BoxError};
pub use lookup::{Lookup, LookupError};
pub use render::{ErrorHandler, RenderBackend, RenderOrchestrator, RenderService};
