//! Form Fill - fill fixed-layout exam forms with applicant data
//!
//! This crate provides:
//! - Form schema and field mapping types (JSON)
//! - Typed data records built from loosely-typed JSON input
//! - Placement resolution from live form widgets or the static mapping
//! - Field writing (shaped Arabic text, checkbox marks, photos)
//! - The fill engine that turns template bytes into filled PDF bytes
//! - Template storage and artifact delivery for hosts with a filesystem
//!
//! # Example
//!
//! ```ignore
//! use form_fill::{DataRecord, DirectoryStore, FillEngine, FillOptions};
//!
//! let store = DirectoryStore::new("public/pdfs", "fonts/Amiri-Regular.ttf");
//! let data = DataRecord::from_json(r#"{"firstName": "محمد"}"#)?;
//! let engine = FillEngine::new(FillOptions::default());
//! let filled = engine.fill_from_store(&store, "car-public", &data)?;
//! std::fs::write("out.pdf", &filled.bytes)?;
//! ```

mod artifact;
mod engine;
mod mapping;
mod options;
mod record;
mod resolver;
mod schema;
mod store;
mod writer;

pub use artifact::{
    suggested_filename, ArtifactSink, FilledArtifact, OutputDirectory, DEFAULT_OUTPUT_DIR,
};
pub use engine::{FillEngine, FillReport, FillStage, FilledDocument, MappingState};
pub use mapping::{FieldKind, FieldMapping, MappingEntry, PdfMapping};
pub use options::FillOptions;
pub use record::{DataRecord, FieldValue};
pub use resolver::{Geometry, Resolver, ResolvedPlacement};
pub use schema::{FormFieldSpec, FormSchema, InputKind};
pub use store::{DirectoryStore, TemplateStore};
pub use writer::{Drawn, FieldSkip, FieldWriter};

use thiserror::Error;

/// User-facing message for any fatal fill failure ("failed to create PDF")
pub const FILL_FAILED_MESSAGE: &str = "فشل في إنشاء PDF";

/// Errors that can occur while filling a form
#[derive(Debug, Error)]
pub enum FillError {
    #[error("Failed to read source document: {0}")]
    Source(String),

    #[error("Failed to load font: {0}")]
    Font(String),

    #[error("Failed to serialize document: {0}")]
    Serialize(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FillError {
    /// Message shown to the applicant; details stay in the logs
    pub fn localized_message(&self) -> &'static str {
        FILL_FAILED_MESSAGE
    }
}

/// Result type for form fill operations
pub type Result<T> = std::result::Result<T, FillError>;
