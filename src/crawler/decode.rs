//! Response body decoding

use encoding_rs::{Encoding, GB18030, UTF_8};

/// Resolves an encoding label
///
/// The GB family (`gbk`, `gb2312`, `gb18030`, `gb10830`) maps to GB18030,
/// a superset of the others. Any other label goes through the WHATWG label
/// table.
pub fn resolve_encoding(label: &str) -> Option<&'static Encoding> {
    match label.trim().to_ascii_lowercase().as_str() {
        "gbk" | "gb2312" | "gb18030" | "gb10830" => Some(GB18030),
        other => Encoding::for_label(other.as_bytes()),
    }
}

/// Decodes a fetched body to text
///
/// Without a label, or with one that does not resolve, the body is read as
/// UTF-8. Malformed sequences become U+FFFD rather than failing the fetch.
pub fn decode_body(bytes: &[u8], label: Option<&str>) -> String {
    let encoding = label.and_then(resolve_encoding).unwrap_or(UTF_8);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!("Replaced malformed {} sequences", encoding.name());
    }
    text.into_owned()
}
