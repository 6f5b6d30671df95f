//! Field extraction
//!
//! This module contains the leaf pieces of the pipeline:
//! - Field selectors (CSS sub-selector + mode + regex)
//! - The per-candidate extraction context
//! - Markup escaping shared with record rendering

mod context;
mod escape;
mod selector;

pub use context::{ExtractionContext, FieldValue};
pub use escape::{escape_markup, unescape_markup, UnescapeError};
pub use selector::{parse_css, ExtractMode, FieldSelector};
