//! HTTP client for the texd API.

mod decode;
mod error;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use metrics::{counter, histogram};
use reqwest::{
    Client, RequestBuilder, Url,
    header::CONTENT_TYPE,
    multipart::{Form, Part},
};
use texd_api_types::{ErrorFormat, RENDER_PATH, RenderQuery, STATUS_PATH};
use tracing::{debug, info, warn};

pub use decode::{ResponseBody, decode_response};
pub use error::{ClientError, RenderError};

use crate::{application::render::RenderBackend, config::ClientSettings, domain::UploadPart};

/// Issues status checks and render requests against one texd endpoint.
#[derive(Debug, Clone)]
pub struct TransferClient {
    client: Client,
    endpoint: Url,
    query: RenderQuery,
}

impl TransferClient {
    pub fn new(settings: &ClientSettings) -> Result<Self, ClientError> {
        let endpoint = settings.endpoint.clone();
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.cannot_be_a_base() {
            return Err(ClientError::InvalidEndpoint(endpoint.to_string()));
        }

        let mut builder = Client::builder().user_agent(Self::user_agent());
        if let Some(open) = settings.open_timeout {
            builder = builder.connect_timeout(open);
        }
        if let Some(read) = settings.read_timeout {
            builder = builder.read_timeout(read);
        }
        // No per-write deadline exists; the sum of all phases caps the whole request.
        if let Some(total) = total_timeout(settings) {
            builder = builder.timeout(total);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint,
            query: RenderQuery {
                // json is what the server assumes without the parameter.
                errors: (settings.errors != ErrorFormat::Json).then_some(settings.errors),
                engine: settings.engine,
                image: settings.image.clone(),
                input: None,
            },
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("texd-rs/", env!("CARGO_PKG_VERSION"))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidEndpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .push(path);
        Ok(url)
    }

    /// Query pairs of a render request for the main input `input`.
    pub fn render_query(&self, input: &str) -> Vec<(&'static str, String)> {
        RenderQuery {
            input: Some(input.to_string()),
            ..self.query.clone()
        }
        .pairs()
    }

    /// Health check.
    pub async fn status(&self) -> Result<ResponseBody, ClientError> {
        let request = self.client.get(self.url(STATUS_PATH)?);
        self.execute("status", request).await
    }

    /// Upload `parts` and return the compiled document.
    pub async fn render(&self, parts: Vec<UploadPart>, input: &str) -> Result<Bytes, ClientError> {
        let mut url = self.url(RENDER_PATH)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in self.render_query(input) {
                pairs.append_pair(key, &value);
            }
        }

        debug!(
            op = "render",
            parts = parts.len(),
            input,
            "Sending render request"
        );
        let form = build_form(parts)?;
        let request = self.client.post(url).multipart(form);
        let result = self.execute("render", request).await;

        counter!("texd_render_attempt_total", "result" => outcome_label(&result)).increment(1);
        result.map(ResponseBody::into_bytes)
    }

    async fn execute(
        &self,
        op: &'static str,
        request: RequestBuilder,
    ) -> Result<ResponseBody, ClientError> {
        let started = Instant::now();
        let result = self.send(request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        histogram!("texd_request_duration_ms", "op" => op).record(elapsed_ms as f64);

        match &result {
            Ok(_) => info!(op, result = "ok", elapsed_ms, "Request finished"),
            Err(err) => warn!(op, result = "error", elapsed_ms, error = %err, "Request failed"),
        }
        result
    }

    async fn send(&self, request: RequestBuilder) -> Result<ResponseBody, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;
        decode_response(status, content_type.as_deref(), body)
    }
}

#[async_trait]
impl RenderBackend for TransferClient {
    async fn render(&self, parts: Vec<UploadPart>, input: &str) -> Result<Bytes, ClientError> {
        TransferClient::render(self, parts, input).await
    }
}

fn total_timeout(settings: &ClientSettings) -> Option<Duration> {
    Some(settings.open_timeout? + settings.write_timeout? + settings.read_timeout?)
}

fn build_form(parts: Vec<UploadPart>) -> Result<Form, ClientError> {
    let mut form = Form::new();
    for part in parts {
        let content_type = part.content_type();
        let body = Part::bytes(part.body)
            .file_name(part.name.clone())
            .mime_str(content_type)?;
        form = form.part(part.name, body);
    }
    Ok(form)
}

fn outcome_label(result: &Result<ResponseBody, ClientError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(ClientError::Render(err)) => err.category().map_or("generic", |c| c.as_str()),
        Err(ClientError::UnexpectedContentType { .. }) => "unexpected_content_type",
        Err(_) => "transport",
    }
}
