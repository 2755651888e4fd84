use thiserror::Error;

use crate::{
    application::{attachments::AttachmentError, lookup::LookupError},
    infra::{
        client::{ClientError, RenderError},
        error::InfraError,
    },
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("template rendering failed: {0}")]
    Template(#[source] BoxError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn template(source: impl Into<BoxError>) -> Self {
        Self::Template(source.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// The server-reported error, if that is what this is.
    pub fn as_render(&self) -> Option<&RenderError> {
        match self {
            Self::Client(err) => err.as_render(),
            _ => None,
        }
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        Self::Client(err.into())
    }
}
