//! Reversible escaping for content-addressed cache filenames.
//!
//! A cache entry's filename embeds the exact URL and ETag that produced it,
//! so two different URLs (or the same URL observed under two different
//! ETags) never collide, and an operator can read the answer back out of
//! `ls` without touching extended attributes. The scheme escapes exactly the
//! bytes that could otherwise be mistaken for filesystem or field-separator
//! syntax (`/ . # " '`), plus anything non-ASCII-printable; ASCII
//! alphanumerics and `-` pass through unescaped. Escaping `.` is what keeps
//! [`cache_filename`]'s own `.`-separated fields unambiguous, since a raw URL
//! routinely contains one (a hostname). Everything escaped becomes `_XX`,
//! the byte's uppercase hex value; `_` itself is escaped too so the scheme
//! stays self-delimiting.

use rawpull_errors::{Error, StorageError};

const CACHE_PREFIX: &str = ".raw-";
const CACHE_SUFFIX: &str = ".raw";

/// Escape a string into a filename-safe, reversible form.
#[must_use]
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        let is_plain = byte.is_ascii_alphanumeric() || byte == b'-';
        if is_plain {
            out.push(byte as char);
        } else {
            out.push_str(&format!("_{byte:02X}"));
        }
    }
    out
}

/// Reverse [`escape`].
///
/// # Errors
///
/// Returns an error if the input contains a malformed escape sequence.
pub fn unescape(input: &str) -> Result<String, Error> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|b| std::str::from_utf8(b).ok())
                .ok_or_else(|| malformed(input))?;
            let value = u8::from_str_radix(hex, 16).map_err(|_| malformed(input))?;
            out.push(value);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| malformed(input))
}

fn malformed(input: &str) -> Error {
    Error::from(StorageError::InvalidPath {
        path: input.to_string(),
    })
}

/// Build the cache filename for a finalized download: `.raw-<url>.<etag>.raw`
/// when an ETag is known, or `.raw-<url>.raw` when it isn't.
#[must_use]
pub fn cache_filename(url: &str, etag: Option<&str>) -> String {
    match etag {
        Some(etag) => format!("{CACHE_PREFIX}{}.{}{CACHE_SUFFIX}", escape(url), escape(etag)),
        None => format!("{CACHE_PREFIX}{}{CACHE_SUFFIX}", escape(url)),
    }
}

/// Recover the `(url, etag)` pair that produced a cache filename, if it
/// matches either of the two shapes [`cache_filename`] produces.
#[must_use]
pub fn parse_cache_filename(name: &str) -> Option<(String, Option<String>)> {
    let body = name
        .strip_prefix(CACHE_PREFIX)?
        .strip_suffix(CACHE_SUFFIX)?;
    match body.split_once('.') {
        Some((escaped_url, escaped_etag)) => {
            let url = unescape(escaped_url).ok()?;
            let etag = unescape(escaped_etag).ok()?;
            Some((url, Some(etag)))
        }
        None => Some((unescape(body).ok()?, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_unescape_roundtrips_arbitrary_url() {
        let url = "https://example.com/images/disk.raw.xz?v=2&x=y_z";
        let escaped = escape(url);
        assert_eq!(unescape(&escaped).unwrap(), url);
    }

    #[test]
    fn escaped_output_contains_only_filename_safe_bytes() {
        let escaped = escape("https://ex ample.com/a b/c#d");
        assert!(escaped
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.' || b == b'_'));
    }

    #[test]
    fn cache_filename_roundtrips_through_parse() {
        let name = cache_filename("https://example.com/disk.raw.xz", Some("\"abc123\""));
        let (url, etag) = parse_cache_filename(&name).unwrap();
        assert_eq!(url, "https://example.com/disk.raw.xz");
        assert_eq!(etag, Some("\"abc123\"".to_string()));
    }

    #[test]
    fn cache_filename_without_etag_parses_back_to_none() {
        let name = cache_filename("https://example.com/disk.raw.xz", None);
        let (_, etag) = parse_cache_filename(&name).unwrap();
        assert!(etag.is_none());
    }

    #[test]
    fn parse_rejects_unrelated_filenames() {
        assert!(parse_cache_filename("disk.raw").is_none());
        assert!(parse_cache_filename(".raw-onlyurl").is_none());
    }

    #[test]
    fn unescape_rejects_truncated_escape_sequence() {
        assert!(unescape("foo_4").is_err());
    }

    #[test]
    fn hostname_dots_do_not_confuse_the_field_separator() {
        // A real URL's dots (in the hostname, or between ".raw" and ".xz")
        // must not be mistaken for the filename's own url/etag delimiter.
        let name = cache_filename("http://h.example.org/a.b.c", Some("v1"));
        let (url, etag) = parse_cache_filename(&name).unwrap();
        assert_eq!(url, "http://h.example.org/a.b.c");
        assert_eq!(etag, Some("v1".to_string()));
    }

    #[test]
    fn without_etag_filename_has_exactly_one_dot_before_the_suffix() {
        let name = cache_filename("http://h/a", None);
        assert_eq!(name, ".raw-http_3A_2F_2Fh_2Fa.raw");
    }
}
