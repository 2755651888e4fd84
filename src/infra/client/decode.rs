//! Turning raw HTTP responses into bodies or classified errors.

use bytes::Bytes;
use reqwest::StatusCode;
use serde_json::{Value, json};
use texd_api_types::{
    CONTENT_TYPE_JSON, CONTENT_TYPE_PDF, CONTENT_TYPE_TEXT, ErrorBody, ErrorCategory,
};

use super::error::{ClientError, RenderError};

const COMPILATION_FAILED: &str = "compilation failed";

/// Successfully decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Pdf(Bytes),
    Text(String),
}

impl ResponseBody {
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Json(value) => Bytes::from(value.to_string()),
            Self::Pdf(bytes) => bytes,
            Self::Text(text) => Bytes::from(text),
        }
    }
}

/// Decode a response by its declared content type.
///
/// Only `200 OK` counts as success. Unknown content types fail regardless
/// of the status.
pub fn decode_response(
    status: StatusCode,
    content_type: Option<&str>,
    body: Bytes,
) -> Result<ResponseBody, ClientError> {
    let content_type = content_type.unwrap_or_default();
    let decoded = match media_type(content_type).as_str() {
        CONTENT_TYPE_JSON => ResponseBody::Json(serde_json::from_slice(&body)?),
        CONTENT_TYPE_PDF => ResponseBody::Pdf(body),
        CONTENT_TYPE_TEXT => ResponseBody::Text(String::from_utf8_lossy(&body).into_owned()),
        _ => {
            return Err(ClientError::UnexpectedContentType {
                status,
                content_type: content_type.to_string(),
            });
        }
    };

    if status == StatusCode::OK {
        return Ok(decoded);
    }

    Err(classify_error(status, content_type, decoded).into())
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn classify_error(status: StatusCode, content_type: &str, body: ResponseBody) -> RenderError {
    match body {
        ResponseBody::Json(value) => classify_json(status, value),
        ResponseBody::Text(logs) => RenderError::Compilation {
            message: COMPILATION_FAILED.to_string(),
            details: None,
            logs: Some(logs),
        },
        ResponseBody::Pdf(_) => RenderError::generic(
            format!("server responded with status {status} ({content_type})"),
            Some(json!({
                "status": status.as_u16(),
                "content_type": content_type,
            })),
        ),
    }
}

fn classify_json(status: StatusCode, value: Value) -> RenderError {
    let fallback_message = || format!("server responded with status {status}");

    let Ok(body) = serde_json::from_value::<ErrorBody>(value.clone()) else {
        return RenderError::generic(fallback_message(), Some(value));
    };
    let message = body.error.clone().unwrap_or_else(fallback_message);
    let category = body
        .category
        .as_deref()
        .and_then(|category| category.parse::<ErrorCategory>().ok());
    let details = (!body.extra.is_empty()).then(|| Value::Object(body.extra));

    match category {
        Some(ErrorCategory::Input) => RenderError::Input { message, details },
        Some(ErrorCategory::Compilation) => RenderError::Compilation {
            message,
            details,
            logs: None,
        },
        Some(ErrorCategory::Queue) => RenderError::Queue { message, details },
        Some(ErrorCategory::Reference) => match body.references {
            Some(references) => RenderError::Reference {
                message,
                references: references.into_iter().collect(),
            },
            None => RenderError::generic(message, Some(value)),
        },
        None => RenderError::generic(message, Some(value)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn decode(
        status: u16,
        content_type: &str,
        body: &'static [u8],
    ) -> Result<ResponseBody, ClientError> {
        decode_response(
            StatusCode::from_u16(status).expect("status"),
            Some(content_type),
            Bytes::from_static(body),
        )
    }

    fn render_error(result: Result<ResponseBody, ClientError>) -> RenderError {
        match result {
            Err(ClientError::Render(err)) => err,
            other => panic!("expected render error, got {other:?}"),
        }
    }

    #[test]
    fn pdf_success_is_returned_verbatim() {
        let body = decode(200, "application/pdf", b"%PDF-1.5\n\x00\xff")
            .expect("pdf");
        assert_eq!(body.into_bytes(), Bytes::from_static(b"%PDF-1.5\n\x00\xff"));
    }

    #[test]
    fn json_success_is_parsed() {
        let body = decode(200, "application/json; charset=utf-8", br#"{"status":"ok"}"#)
            .expect("json");
        assert_eq!(body, ResponseBody::Json(json!({"status": "ok"})));
    }

    #[test]
    fn queue_error_keeps_message() {
        let err = render_error(decode(
            503,
            "application/json",
            br#"{"category":"queue","error":"busy"}"#,
        ));
        assert!(matches!(err, RenderError::Queue { .. }));
        assert_eq!(err.message(), "busy");
        assert_eq!(err.details(), None);
    }

    #[test]
    fn input_and_compilation_errors_keep_remaining_fields() {
        let err = render_error(decode(
            422,
            "application/json",
            br#"{"category":"compilation","error":"latexmk failed","cmd":"latexmk"}"#,
        ));
        assert_eq!(err.category(), Some(ErrorCategory::Compilation));
        assert_eq!(err.details(), Some(&json!({"cmd": "latexmk"})));
        assert_eq!(err.logs(), None);

        let err = render_error(decode(
            400,
            "application/json",
            br#"{"category":"input","error":"bad name","name":"../x"}"#,
        ));
        assert_eq!(err.category(), Some(ErrorCategory::Input));
        assert_eq!(err.message(), "bad name");
    }

    #[test]
    fn reference_error_collects_identifiers() {
        let err = render_error(decode(
            424,
            "application/json",
            br#"{"category":"reference","error":"unknown references","references":["sha256:a","sha256:b","sha256:a"]}"#,
        ));
        assert_eq!(
            err.references(),
            Some(&BTreeSet::from(["sha256:a".to_string(), "sha256:b".to_string()]))
        );
    }

    #[test]
    fn reference_error_without_list_is_generic() {
        let err = render_error(decode(
            424,
            "application/json",
            br#"{"category":"reference","error":"unknown references"}"#,
        ));
        assert!(matches!(err, RenderError::Generic { .. }));
    }

    #[test]
    fn unknown_category_is_generic_with_whole_body() {
        let err = render_error(decode(
            500,
            "application/json",
            br#"{"category":"cosmic-rays","error":"oops"}"#,
        ));
        assert_eq!(err.message(), "oops");
        assert_eq!(
            err.details(),
            Some(&json!({"category": "cosmic-rays", "error": "oops"}))
        );

        let err = render_error(decode(500, "application/json", b"[1,2]"));
        assert_eq!(
            err.message(),
            "server responded with status 500 Internal Server Error"
        );
    }

    #[test]
    fn plain_text_error_is_compilation_log() {
        let err = render_error(decode(
            422,
            "text/plain; charset=utf-8",
            b"! LaTeX Error: File `missing.tex' not found.",
        ));
        assert_eq!(err.category(), Some(ErrorCategory::Compilation));
        assert_eq!(
            err.logs(),
            Some("! LaTeX Error: File `missing.tex' not found.")
        );
    }

    #[test]
    fn pdf_error_is_generic_with_status() {
        let err = render_error(decode(500, "application/pdf", b"%PDF"));
        assert_eq!(
            err.message(),
            "server responded with status 500 Internal Server Error (application/pdf)"
        );
    }

    #[test]
    fn unexpected_content_type_fails() {
        let err = decode(200, "text/html", b"<html>").expect_err("html");
        assert!(matches!(err, ClientError::UnexpectedContentType { .. }));

        let err = decode_response(StatusCode::OK, None, Bytes::new())
            .expect_err("missing");
        assert!(matches!(err, ClientError::UnexpectedContentType { .. }));
    }
}
