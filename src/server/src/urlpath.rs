//! Percent-encoding of URL path segments.

use isoshelf_core::error::{Result, ShelfError};

/// Percent-encode one path segment, keeping only RFC 3986 unreserved bytes.
pub fn encode_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len() * 2);
    for byte in segment.bytes() {
        match byte {
            // unreserved: ALPHA / DIGIT / "-" / "." / "_" / "~"
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char);
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

/// Encode every segment of a slash-separated path.
pub fn encode_path<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| encode_segment(s.as_ref()))
        .collect::<Vec<_>>()
        .join("/")
}

/// Decode `%XX` escapes in one path segment.
///
/// Fails with `InvalidPath` on a truncated or non-hex escape or when the
/// decoded bytes are not UTF-8.
pub fn decode_segment(segment: &str) -> Result<String> {
    let invalid = || ShelfError::InvalidPath(format!("malformed escape in '{}'", segment));

    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                .ok_or_else(invalid)?;
            let hex = std::str::from_utf8(hex).map_err(|_| invalid())?;
            let byte = u8::from_str_radix(hex, 16).map_err(|_| invalid())?;
            decoded.push(byte);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8(decoded).map_err(|_| invalid())
}

/// Decode every segment of a slash-separated path, keeping the separators.
pub fn decode_path(path: &str) -> Result<String> {
    let segments = path
        .split('/')
        .map(decode_segment)
        .collect::<Result<Vec<_>>>()?;
    Ok(segments.join("/"))
}
