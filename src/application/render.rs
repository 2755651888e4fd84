//! Rendering a compilation on the server, with a single retry on reference misses.

use std::{
    collections::BTreeSet,
    fmt,
    io::{self, Write},
    path::Path,
    sync::Arc,
    time::Instant,
};

use async_trait::async_trait;
use bytes::Bytes;
use metrics::counter;
use tracing::{info, warn};

use crate::{
    application::{
        attachments::AttachmentSet,
        document::{Compilation, Document, TemplateEngine},
        error::AppError,
        lookup::Lookup,
    },
    cache::ChecksumCache,
    config::{ErrorPolicy, Settings},
    domain::UploadPart,
    infra::{
        client::{ClientError, RenderError, TransferClient},
        lookup::SearchPaths,
    },
};

/// The remote side of a render: upload parts in, PDF out.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn render(&self, parts: Vec<UploadPart>, input: &str) -> Result<Bytes, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Initial,
    Retried,
}

/// Drives one render attempt. References go out as checksums first; if the
/// server misses some of them, those are sent once more in full.
pub struct RenderOrchestrator<'a> {
    backend: &'a dyn RenderBackend,
    checksums: &'a ChecksumCache,
}

impl<'a> RenderOrchestrator<'a> {
    pub fn new(backend: &'a dyn RenderBackend, checksums: &'a ChecksumCache) -> Self {
        Self { backend, checksums }
    }

    pub async fn run(&self, compilation: &Compilation) -> Result<Bytes, AppError> {
        let started = Instant::now();
        let input = compilation.main_input_name();
        let mut attempt = Attempt::Initial;
        let mut unresolved = BTreeSet::new();

        loop {
            let parts = compilation.upload_parts(self.checksums, &unresolved)?;
            match (attempt, self.backend.render(parts, input).await) {
                (_, Ok(pdf)) => {
                    info!(
                        op = "render",
                        result = "ok",
                        retried = attempt == Attempt::Retried,
                        bytes = pdf.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Document rendered"
                    );
                    return Ok(pdf);
                }
                (
                    Attempt::Initial,
                    Err(ClientError::Render(RenderError::Reference { references, .. })),
                ) => {
                    warn!(
                        op = "render",
                        missing = references.len(),
                        "Server misses referenced files, uploading them in full"
                    );
                    counter!("texd_reference_retry_total").increment(1);
                    unresolved = references;
                    attempt = Attempt::Retried;
                }
                (_, Err(err)) => {
                    warn!(
                        op = "render",
                        result = "error",
                        retried = attempt == Attempt::Retried,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %err,
                        "Render failed"
                    );
                    return Err(err.into());
                }
            }
        }
    }
}

pub type CompilationErrorCallback = Arc<dyn Fn(&RenderError, &Compilation) + Send + Sync>;

/// Policy for compilation errors. Every other error is always returned.
#[derive(Clone, Default)]
pub enum ErrorHandler {
    #[default]
    Raise,
    /// Print the message and logs to stderr.
    Stderr,
    Ignore,
    Custom(CompilationErrorCallback),
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raise => f.write_str("Raise"),
            Self::Stderr => f.write_str("Stderr"),
            Self::Ignore => f.write_str("Ignore"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<ErrorPolicy> for ErrorHandler {
    fn from(policy: ErrorPolicy) -> Self {
        match policy {
            ErrorPolicy::Raise => Self::Raise,
            ErrorPolicy::Stderr => Self::Stderr,
            ErrorPolicy::Ignore => Self::Ignore,
        }
    }
}

impl ErrorHandler {
    pub fn custom<F>(callback: F) -> Self
    where
        F: Fn(&RenderError, &Compilation) + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(callback))
    }

    /// `Ok(None)` when the error was a compilation error and got handled.
    fn handle(&self, err: AppError, compilation: &Compilation) -> Result<Option<Bytes>, AppError> {
        let Some(compilation_error @ RenderError::Compilation { .. }) = err.as_render() else {
            return Err(err);
        };

        match self {
            Self::Raise => return Err(err),
            Self::Stderr => {
                let report = compilation_report(compilation_error);
                if let Err(write_err) = io::stderr().lock().write_all(report.as_bytes()) {
                    warn!(error = %write_err, "Failed to report compilation error");
                }
            }
            Self::Ignore => {}
            Self::Custom(callback) => callback(compilation_error, compilation),
        }
        info!(
            op = "render",
            result = "compilation_error_handled",
            handler = ?self,
            "Compilation error handled"
        );
        Ok(None)
    }
}

fn compilation_report(err: &RenderError) -> String {
    let mut report = format!("Compilation failed: {}\n", err.message());
    match err.logs() {
        Some(logs) => {
            report.push_str("Logs:\n");
            report.push_str(logs);
            if !logs.ends_with('\n') {
                report.push('\n');
            }
        }
        None => report.push_str("Logs: not available\n"),
    }
    report
}

/// Everything a render needs, shared across documents: the checksum cache,
/// the backend, the file lookup and the compilation error policy.
#[derive(Clone)]
pub struct RenderService {
    checksums: Arc<ChecksumCache>,
    backend: Arc<dyn RenderBackend>,
    lookup: Arc<dyn Lookup>,
    error_handler: ErrorHandler,
}

impl fmt::Debug for RenderService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderService")
            .field("checksums", &self.checksums.len())
            .field("error_handler", &self.error_handler)
            .finish_non_exhaustive()
    }
}

impl RenderService {
    pub fn new(
        checksums: Arc<ChecksumCache>,
        backend: Arc<dyn RenderBackend>,
        lookup: Arc<dyn Lookup>,
        error_handler: ErrorHandler,
    ) -> Self {
        Self {
            checksums,
            backend,
            lookup,
            error_handler,
        }
    }

    /// Wire up the HTTP client, search paths and checksum cache from settings.
    /// Without configured search paths, files resolve against the current
    /// directory.
    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        let client = TransferClient::new(&settings.client)?;
        let lookup = if settings.render.lookup_paths.is_empty() {
            SearchPaths::new([Path::new(".")])?
        } else {
            SearchPaths::new(&settings.render.lookup_paths)?
        };
        let checksums = ChecksumCache::new(settings.render.checksum_cache_capacity);

        Ok(Self::new(
            Arc::new(checksums),
            Arc::new(client),
            Arc::new(lookup),
            settings.render.error_handler.into(),
        ))
    }

    pub fn with_error_handler(mut self, error_handler: ErrorHandler) -> Self {
        self.error_handler = error_handler;
        self
    }

    pub fn checksums(&self) -> &Arc<ChecksumCache> {
        &self.checksums
    }

    /// An empty attachment set resolving files through this service's lookup.
    pub fn attachments(&self) -> AttachmentSet {
        AttachmentSet::new(Arc::clone(&self.lookup))
    }

    /// Compile `document` with `engine` and render it.
    ///
    /// Returns `Ok(None)` when compilation failed and the error handler
    /// swallowed the error.
    pub async fn render(
        &self,
        engine: &dyn TemplateEngine,
        document: &Document,
    ) -> Result<Option<Bytes>, AppError> {
        let compilation = document.compile(engine, Arc::clone(&self.lookup))?;
        self.render_compilation(&compilation).await
    }

    pub async fn render_compilation(
        &self,
        compilation: &Compilation,
    ) -> Result<Option<Bytes>, AppError> {
        let orchestrator = RenderOrchestrator::new(self.backend.as_ref(), &self.checksums);
        match orchestrator.run(compilation).await {
            Ok(pdf) => Ok(Some(pdf)),
            Err(err) => self.error_handler.handle(err, compilation),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        num::NonZeroUsize,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use tempfile::TempDir;

    use super::*;
    use crate::{
        cache::digest_bytes,
        domain::{Rename, TransferMode},
    };

    const PDF: &[u8] = b"%PDF-1.7 simulated";

    /// In-process texd: keeps a reference store and records every request.
    #[derive(Default)]
    struct SimulatedServer {
        store: Mutex<BTreeSet<String>>,
        requests: Mutex<Vec<Vec<UploadPart>>>,
        /// Lose uploaded content, so stored references stay unknown.
        forgetful: bool,
        failure: Mutex<Option<RenderError>>,
    }

    impl SimulatedServer {
        fn knowing(checksums: &[String]) -> Self {
            Self {
                store: Mutex::new(checksums.iter().cloned().collect()),
                ..Self::default()
            }
        }

        fn failing(err: RenderError) -> Self {
            Self {
                failure: Mutex::new(Some(err)),
                ..Self::default()
            }
        }

        fn requests(&self) -> Vec<Vec<UploadPart>> {
            self.requests.lock().expect("requests").clone()
        }
    }

    #[async_trait]
    impl RenderBackend for SimulatedServer {
        async fn render(&self, parts: Vec<UploadPart>, _input: &str) -> Result<Bytes, ClientError> {
            self.requests.lock().expect("requests").push(parts.clone());
            if let Some(err) = self.failure.lock().expect("failure").clone() {
                return Err(err.into());
            }

            let mut store = self.store.lock().expect("store");
            let mut missing = BTreeSet::new();
            for part in &parts {
                match &part.mode {
                    TransferMode::UseReference { checksum } if !store.contains(checksum) => {
                        missing.insert(checksum.clone());
                    }
                    TransferMode::StoreReference { checksum } if self.forgetful => {
                        missing.insert(checksum.clone());
                    }
                    TransferMode::StoreReference { checksum } => {
                        store.insert(checksum.clone());
                    }
                    _ => {}
                }
            }
            if missing.is_empty() {
                Ok(Bytes::from_static(PDF))
            } else {
                Err(RenderError::Reference {
                    message: "unknown references".into(),
                    references: missing,
                }
                .into())
            }
        }
    }

    struct Fixture {
        _dir: TempDir,
        compilation: Compilation,
        checksums: ChecksumCache,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().expect("temp dir");
        for (name, contents) in [
            ("logo.png", "logo"),
            ("font.otf", "font"),
            ("data.csv", "1,2"),
        ] {
            fs::write(dir.path().join(name), contents).expect("write fixture");
        }
        let lookup = SearchPaths::new([dir.path()]).expect("search paths");
        let mut set = AttachmentSet::new(Arc::new(lookup));
        set.reference("logo.png", Rename::Mangle).expect("logo");
        set.reference("font.otf", Rename::Mangle).expect("font");
        set.attach("data.csv", Rename::Keep).expect("data");

        Fixture {
            _dir: dir,
            compilation: Compilation::new(set, "\\documentclass{article}"),
            checksums: ChecksumCache::new(NonZeroUsize::new(16).expect("non-zero")),
        }
    }

    fn modes(parts: &[UploadPart]) -> Vec<&TransferMode> {
        parts.iter().map(|part| &part.mode).collect()
    }

    #[tokio::test]
    async fn known_references_render_in_one_request() {
        let fx = fixture();
        let server = SimulatedServer::knowing(&[digest_bytes(b"logo"), digest_bytes(b"font")]);

        let pdf = RenderOrchestrator::new(&server, &fx.checksums)
            .run(&fx.compilation)
            .await
            .expect("render");

        assert_eq!(pdf, Bytes::from_static(PDF));
        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].len(), 4);
        assert_eq!(requests[0][0].body, digest_bytes(b"logo").into_bytes());
    }

    #[tokio::test]
    async fn reference_miss_uploads_only_the_missing_file_once() {
        let fx = fixture();
        let server = SimulatedServer::knowing(&[digest_bytes(b"font")]);

        let pdf = RenderOrchestrator::new(&server, &fx.checksums)
            .run(&fx.compilation)
            .await
            .expect("render");
        assert_eq!(pdf, Bytes::from_static(PDF));

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            modes(&requests[1]),
            vec![
                &TransferMode::StoreReference {
                    checksum: digest_bytes(b"logo")
                },
                &TransferMode::UseReference {
                    checksum: digest_bytes(b"font")
                },
                &TransferMode::Content,
                &TransferMode::Content,
            ]
        );
        assert_eq!(requests[1][0].body, b"logo");
        assert_eq!(requests[1][3].name, "input.tex");
    }

    #[tokio::test]
    async fn second_reference_miss_is_surfaced_without_third_request() {
        let fx = fixture();
        let server = SimulatedServer {
            forgetful: true,
            ..SimulatedServer::default()
        };

        let err = RenderOrchestrator::new(&server, &fx.checksums)
            .run(&fx.compilation)
            .await
            .expect_err("persistent miss");

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            modes(&requests[1])[..2],
            [
                &TransferMode::StoreReference {
                    checksum: digest_bytes(b"logo")
                },
                &TransferMode::StoreReference {
                    checksum: digest_bytes(b"font")
                },
            ]
        );
        let references = err
            .as_render()
            .and_then(RenderError::references)
            .expect("refs");
        assert_eq!(
            references,
            &BTreeSet::from([digest_bytes(b"font"), digest_bytes(b"logo")])
        );
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let fx = fixture();
        let server = SimulatedServer::failing(RenderError::Queue {
            message: "busy".into(),
            details: None,
        });

        let err = RenderOrchestrator::new(&server, &fx.checksums)
            .run(&fx.compilation)
            .await
            .expect_err("queue error");

        assert_eq!(server.requests().len(), 1);
        assert!(matches!(err.as_render(), Some(RenderError::Queue { .. })));
    }

    fn compilation_failure() -> RenderError {
        RenderError::Compilation {
            message: "compilation failed".into(),
            details: None,
            logs: Some("LaTeX Error: File `missing.tex' not found.\nEmergency stop.".into()),
        }
    }

    fn service(server: SimulatedServer, handler: ErrorHandler) -> (RenderService, Fixture) {
        let fx = fixture();
        let service = RenderService::new(
            Arc::new(ChecksumCache::default()),
            Arc::new(server),
            Arc::new(SearchPaths::default()),
            handler,
        );
        (service, fx)
    }

    #[tokio::test]
    async fn raise_policy_returns_compilation_errors() {
        let (service, fx) = service(
            SimulatedServer::failing(compilation_failure()),
            ErrorHandler::Raise,
        );
        let err = service
            .render_compilation(&fx.compilation)
            .await
            .expect_err("raised");
        assert_eq!(err.as_render(), Some(&compilation_failure()));
    }

    #[tokio::test]
    async fn ignore_policy_yields_no_document() {
        let (service, fx) = service(
            SimulatedServer::failing(compilation_failure()),
            ErrorHandler::Ignore,
        );
        let result = service.render_compilation(&fx.compilation).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn custom_policy_sees_error_and_compilation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let handler = ErrorHandler::custom(move |err, compilation| {
            assert_eq!(err.message(), "compilation failed");
            assert_eq!(compilation.main_input_name(), "input.tex");
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let (service, fx) = service(SimulatedServer::failing(compilation_failure()), handler);

        let result = service.render_compilation(&fx.compilation).await;
        assert!(matches!(result, Ok(None)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn policies_leave_other_errors_alone() {
        let (service, fx) = service(
            SimulatedServer::failing(RenderError::Input {
                message: "bad name".into(),
                details: None,
            }),
            ErrorHandler::Ignore,
        );
        let err = service
            .render_compilation(&fx.compilation)
            .await
            .expect_err("input error");
        assert!(matches!(err.as_render(), Some(RenderError::Input { .. })));
    }

    #[tokio::test]
    async fn custom_policy_is_skipped_for_other_errors() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let handler = ErrorHandler::custom(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        let (service, fx) = service(
            SimulatedServer::failing(RenderError::Queue {
                message: "busy".into(),
                details: None,
            }),
            handler,
        );

        let err = service
            .render_compilation(&fx.compilation)
            .await
            .expect_err("queue error");
        assert!(matches!(err.as_render(), Some(RenderError::Queue { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn compilation_report_includes_logs_when_present() {
        assert_eq!(
            compilation_report(&compilation_failure()),
            "Compilation failed: compilation failed\nLogs:\nLaTeX Error: File `missing.tex' not found.\nEmergency stop.\n"
        );

        let without_logs = RenderError::Compilation {
            message: "latexmk failed".into(),
            details: None,
            logs: None,
        };
        assert_eq!(
            compilation_report(&without_logs),
            "Compilation failed: latexmk failed\nLogs: not available\n"
        );
    }

    #[test]
    fn policies_map_from_settings() {
        assert!(matches!(
            ErrorHandler::from(ErrorPolicy::Stderr),
            ErrorHandler::Stderr
        ));
        assert!(matches!(ErrorHandler::default(), ErrorHandler::Raise));
    }
}
