use std::collections::BTreeSet;

use reqwest::StatusCode;
use serde_json::Value;
use texd_api_types::ErrorCategory;
use thiserror::Error;

/// Failure reported by the server for a render request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    /// Unclassified server error or malformed error response.
    #[error("{message}")]
    Generic {
        message: String,
        details: Option<Value>,
    },
    /// Bad file names, paths or contents.
    #[error("input error: {message}")]
    Input {
        message: String,
        details: Option<Value>,
    },
    /// The document did not compile. `logs` is only present when the server
    /// reports errors in the `full` or `condensed` format.
    #[error("compilation error: {message}")]
    Compilation {
        message: String,
        details: Option<Value>,
        logs: Option<String>,
    },
    /// The server is busy; try again later.
    #[error("queue error: {message}")]
    Queue {
        message: String,
        details: Option<Value>,
    },
    /// The server does not know some of the referenced checksums.
    #[error("reference error: {message}")]
    Reference {
        message: String,
        references: BTreeSet<String>,
    },
}

impl RenderError {
    pub fn generic(message: impl Into<String>, details: Option<Value>) -> Self {
        Self::Generic {
            message: message.into(),
            details,
        }
    }

    /// `None` for [`RenderError::Generic`].
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Generic { .. } => None,
            Self::Input { .. } => Some(ErrorCategory::Input),
            Self::Compilation { .. } => Some(ErrorCategory::Compilation),
            Self::Queue { .. } => Some(ErrorCategory::Queue),
            Self::Reference { .. } => Some(ErrorCategory::Reference),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Generic { message, .. }
            | Self::Input { message, .. }
            | Self::Compilation { message, .. }
            | Self::Queue { message, .. }
            | Self::Reference { message, .. } => message,
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Generic { details, .. }
            | Self::Input { details, .. }
            | Self::Compilation { details, .. }
            | Self::Queue { details, .. } => details.as_ref(),
            Self::Reference { .. } => None,
        }
    }

    pub fn logs(&self) -> Option<&str> {
        match self {
            Self::Compilation { logs, .. } => logs.as_deref(),
            _ => None,
        }
    }

    pub fn references(&self) -> Option<&BTreeSet<String>> {
        match self {
            Self::Reference { references, .. } => Some(references),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("unexpected content type {content_type:?} (status {status})")]
    UnexpectedContentType {
        status: StatusCode,
        content_type: String,
    },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("failed to parse JSON response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    pub fn as_render(&self) -> Option<&RenderError> {
        match self {
            Self::Render(err) => Some(err),
            _ => None,
        }
    }
}
