//! Error taxonomy (§7). `TemplateError` covers the fatal cases, returned from
//! parsing; `Diagnostic` covers the non-fatal cases, accumulated into the
//! `RenderReport` a render always produces alongside its output bytes.

use serde::Serialize;
use thiserror::Error;

use crate::parser::TagId;

/// Fatal errors: the tokenizer/parser cannot accept the input, or the
/// dependency analyzer finds a cycle, or (in strict mode only) a formatter
/// chain fails validation.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum TemplateError {
    #[error("syntax error at byte {byte_offset}: {message}")]
    Syntax { byte_offset: usize, message: String },

    #[error("circular dependency among tags: {0:?}")]
    CircularDependency(Vec<TagId>),

    #[error("unknown formatter '{name}' in tag {tag_id}")]
    UnknownFormatter { tag_id: TagId, name: String },

    #[error("invalid parameters for formatter '{formatter}' in tag {tag_id}: {message}")]
    InvalidParameters {
        tag_id: TagId,
        formatter: String,
        message: String,
    },

    #[error("render cancelled")]
    Cancelled,
}

/// Non-fatal conditions recorded in a `RenderReport` rather than aborting
/// the render (§7). Also emitted through `log::warn!` at the point they are
/// recorded (§7.1), so a host need not inspect the report to notice them.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum Diagnostic {
    #[error("tag {tag_id} at path '{path}' failed to resolve: {message}")]
    TagResolutionError {
        tag_id: TagId,
        path: String,
        message: String,
    },

    #[error("line mixes iteration tags over different base arrays; using the first tag's array")]
    MixedIterationSources { tag_ids: Vec<TagId> },

    #[error("unknown formatter '{name}' in tag {tag_id}, skipped (identity pass-through)")]
    UnknownFormatterSkipped { tag_id: TagId, name: String },

    #[error("invalid parameters for formatter '{formatter}' in tag {tag_id}: {message}, skipped")]
    InvalidParametersSkipped {
        tag_id: TagId,
        formatter: String,
        message: String,
    },
}

impl Diagnostic {
    /// Emits this diagnostic through `log::warn!`. Called exactly once, at
    /// the point the diagnostic is pushed into a `RenderReport` (§7.1).
    pub fn log(&self) {
        log::warn!("{self}");
    }
}
