//! Input validation for [`crate::Session::pull`].

use rawpull_errors::{Error, ImportError};

/// Validate that `url` is a non-empty, absolute HTTP(S) URL.
///
/// # Errors
///
/// Returns [`ImportError::InvalidArgument`] if the URL is empty, unparsable,
/// or uses a scheme other than `http`/`https`.
pub fn validate_url(url: &str) -> Result<(), Error> {
    if url.is_empty() {
        return Err(invalid("URL must not be empty"));
    }
    let parsed = rawpull_net::parse_url(url)?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(invalid(format!(
            "unsupported URL scheme {:?}, expected http or https",
            parsed.scheme()
        )));
    }
    Ok(())
}

/// Validate that `name` is safe to use as the stem of a local copy filename:
/// non-empty, no path separators, no leading dot, no interior NUL.
///
/// # Errors
///
/// Returns [`ImportError::InvalidArgument`] if `name` fails any of the above.
pub fn validate_local_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(invalid("local name must not be empty"));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(invalid("local name must not contain '/' or NUL bytes"));
    }
    if name.starts_with('.') {
        return Err(invalid("local name must not start with '.'"));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> Error {
    ImportError::InvalidArgument {
        message: message.into(),
    }
    .into()
}
