use crate::error::HttpError;

/// Percent-decode a captured parameter value.
///
/// `+` is left alone (path segments are not form-encoded). A `%` that is not
/// followed by two hex digits, or an escape sequence that decodes to invalid
/// UTF-8, is a client error and yields a 400 [`HttpError`].
///
/// ```rust
/// use waypoint::matcher::decode_param;
///
/// assert_eq!(decode_param("foo%25bar").unwrap(), "foo%bar");
/// assert_eq!(decode_param("%zz").unwrap_err().status.as_u16(), 400);
/// ```
pub fn decode_param(raw: &str) -> Result<String, HttpError> {
    if !raw.contains('%') {
        return Ok(raw.to_string());
    }

    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let well_formed = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !well_formed {
                return Err(failed(raw));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| failed(raw))
}

fn failed(raw: &str) -> HttpError {
    HttpError::bad_request(format!("Failed to decode param '{raw}'"))
}
