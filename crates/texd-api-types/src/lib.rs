//! Wire vocabulary of the texd compilation API.
//!
//! These types describe what travels between a client and a texd server:
//! the render query parameters, the multipart content-type markers used for
//! file references, and the JSON envelope of structured error responses.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_PDF: &str = "application/pdf";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Part content type asking the server to resolve a previously stored file
/// by the checksum carried in the part body.
pub const REFERENCE_USE: &str = "application/x.texd; ref=use";

/// Part content type asking the server to store the part body under its
/// checksum for reuse by later requests.
pub const REFERENCE_STORE: &str = "application/x.texd; ref=store";

pub const STATUS_PATH: &str = "status";
pub const RENDER_PATH: &str = "render";

/// Returned when a configuration or wire value is not one of the known variants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {kind} `{value}`, expected one of: {expected}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Category tag of a structured error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Input,
    Compilation,
    Queue,
    Reference,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Compilation => "compilation",
            Self::Queue => "queue",
            Self::Reference => "reference",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCategory {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "input" => Ok(Self::Input),
            "compilation" => Ok(Self::Compilation),
            "queue" => Ok(Self::Queue),
            "reference" => Ok(Self::Reference),
            other => Err(ParseEnumError {
                kind: "error category",
                value: other.to_string(),
                expected: "input, compilation, queue, reference",
            }),
        }
    }
}

/// JSON envelope of an error response.
///
/// Category specific fields other than `references` end up in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Verbosity of error reports produced by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorFormat {
    /// Structured JSON only; this is what the server assumes when the
    /// `errors` parameter is absent.
    Json,
    /// Complete compiler log as `text/plain`.
    Full,
    /// Compiler log reduced to the error lines.
    Condensed,
}

impl ErrorFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Full => "full",
            Self::Condensed => "condensed",
        }
    }
}

impl fmt::Display for ErrorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorFormat {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "json" => Ok(Self::Json),
            "full" => Ok(Self::Full),
            "condensed" => Ok(Self::Condensed),
            other => Err(ParseEnumError {
                kind: "error format",
                value: other.to_string(),
                expected: "json, full, condensed",
            }),
        }
    }
}

/// TeX engine the server should compile with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TexEngine {
    Xelatex,
    Lualatex,
    Pdflatex,
}

impl TexEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Xelatex => "xelatex",
            Self::Lualatex => "lualatex",
            Self::Pdflatex => "pdflatex",
        }
    }
}

impl fmt::Display for TexEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TexEngine {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "xelatex" => Ok(Self::Xelatex),
            "lualatex" => Ok(Self::Lualatex),
            "pdflatex" => Ok(Self::Pdflatex),
            other => Err(ParseEnumError {
                kind: "TeX engine",
                value: other.to_string(),
                expected: "xelatex, lualatex, pdflatex",
            }),
        }
    }
}

/// Query parameters of a render request. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderQuery {
    pub errors: Option<ErrorFormat>,
    pub engine: Option<TexEngine>,
    pub image: Option<String>,
    pub input: Option<String>,
}

impl RenderQuery {
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(errors) = self.errors {
            pairs.push(("errors", errors.as_str().to_string()));
        }
        if let Some(engine) = self.engine {
            pairs.push(("engine", engine.as_str().to_string()));
        }
        if let Some(image) = self.image.as_ref() {
            pairs.push(("image", image.clone()));
        }
        if let Some(input) = self.input.as_ref() {
            pairs.push(("input", input.clone()));
        }
        pairs
    }
}
