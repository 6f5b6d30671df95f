//! Escaping for the five reserved markup characters
//!
//! Extracted values are escaped before they reach a template so that a value
//! such as `a < b & "c"` survives the trip into a record field. Record
//! rendering decodes them again exactly as an XML parser would decode
//! character data.

use quick_xml::escape::{escape, unescape, EscapeError};
use thiserror::Error;

/// Errors raised while decoding escaped character data
#[derive(Debug, Error)]
pub enum UnescapeError {
    #[error("unescaped '<' at byte {0}")]
    BareLessThan(usize),

    #[error(transparent)]
    Entity(#[from] EscapeError),
}

/// Escapes `< > ' " &` for inclusion in markup character data
pub fn escape_markup(input: &str) -> String {
    escape(input).into_owned()
}

/// Decodes character data, rejecting anything an XML parser would reject
///
/// Named entities `lt gt apos quot amp` and character references are
/// decoded. A bare `<`, an `&` without a closing `;`, or an unknown entity
/// name is an error.
pub fn unescape_markup(input: &str) -> Result<String, UnescapeError> {
    if let Some(pos) = input.find('<') {
        return Err(UnescapeError::BareLessThan(pos));
    }
    Ok(unescape(input)?.into_owned())
}
