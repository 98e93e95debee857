//! tagweave: a data-driven document templating engine.
//!
//! A template embeds `{…}`-delimited tags that walk a data tree, optionally
//! filter, iterate, or aggregate over arrays, and pipe the result through a
//! chain of named formatters. Parsing and rendering are pure functions
//! (`api::parse_template`, `api::render`); the `tagweave` binary is a thin
//! CLI wrapper around them.

pub mod adapter;
pub mod api;
pub mod dependency;
pub mod error;
pub mod formatters;
pub mod parser;
pub mod renderer;
pub mod resolver;
pub mod tokenizer;
pub mod value;

pub use api::{parse_template, render, ParsedTemplate};
pub use error::{Diagnostic, TemplateError};
pub use renderer::{RenderOptions, RenderReport, TagStatus};
pub use value::Value;
