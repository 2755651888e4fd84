//! Document assembly: template output plus attachments, ready for upload.

use std::{collections::BTreeSet, sync::Arc};

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::{
    application::{
        attachments::{AttachmentError, AttachmentSet},
        error::{AppError, BoxError},
        lookup::Lookup,
    },
    cache::ChecksumCache,
    domain::UploadPart,
};

/// Which layout wraps the template output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Layout {
    /// The engine's application layout.
    #[default]
    Default,
    None,
    Named(String),
}

/// Produces TeX source from a template. Templates pull files into the
/// upload through the attachment set they are handed.
pub trait TemplateEngine: Send + Sync {
    fn render(
        &self,
        document: &Document,
        attachments: &mut AttachmentSet,
    ) -> Result<String, BoxError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    template: String,
    locals: Map<String, Value>,
    layout: Layout,
}

impl Document {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            locals: Map::new(),
            layout: Layout::Default,
        }
    }

    pub fn with_locals(mut self, locals: Map<String, Value>) -> Self {
        self.locals = locals;
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn locals(&self) -> &Map<String, Value> {
        &self.locals
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Render the template and add its output as the main input.
    pub fn compile(
        &self,
        engine: &dyn TemplateEngine,
        lookup: Arc<dyn Lookup>,
    ) -> Result<Compilation, AppError> {
        let mut attachments = AttachmentSet::new(lookup);
        let body = engine
            .render(self, &mut attachments)
            .map_err(AppError::Template)?;
        Ok(Compilation::new(attachments, body))
    }
}

/// A finished attachment set with its main input.
#[derive(Debug)]
pub struct Compilation {
    main_input_name: String,
    main_input: Bytes,
    attachments: AttachmentSet,
}

impl Compilation {
    /// Add `main_input` to `attachments`, closing the set.
    pub fn new(mut attachments: AttachmentSet, main_input: impl Into<Bytes>) -> Self {
        let main_input = main_input.into();
        let main_input_name = attachments.main_input(main_input.clone()).name().to_string();
        Self {
            main_input_name,
            main_input,
            attachments,
        }
    }

    pub fn main_input_name(&self) -> &str {
        &self.main_input_name
    }

    pub fn main_input_contents(&self) -> &[u8] {
        &self.main_input
    }

    pub fn attachments(&self) -> &AttachmentSet {
        &self.attachments
    }

    pub fn upload_parts(
        &self,
        checksums: &ChecksumCache,
        unresolved: &BTreeSet<String>,
    ) -> Result<Vec<UploadPart>, AttachmentError> {
        self.attachments.upload_parts(checksums, unresolved)
    }
}
