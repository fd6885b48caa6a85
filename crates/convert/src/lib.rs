#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! COW disk-image container probe/convert collaborator.
//!
//! The import core hands a finalized raw candidate file to [`probe`] to find
//! out whether it's actually a copy-on-write container image rather than raw
//! bytes; if so, [`convert`] produces a true raw sibling. Both operations
//! shell out to `qemu-img`, matching the rest of the importer's preference
//! for driving an external tool as an async subprocess over linking its C
//! library directly.

use rawpull_errors::{ConvertError, Error};
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

const QEMU_IMG: &str = "qemu-img";

/// Overrides the `qemu-img` binary resolved from `PATH`. Exists so
/// integration tests can point `probe`/`convert` at a stand-in binary
/// without a real COW-container toolchain on hand.
const QEMU_IMG_OVERRIDE_VAR: &str = "RAWPULL_QEMU_IMG";

fn qemu_img_binary() -> String {
    std::env::var(QEMU_IMG_OVERRIDE_VAR).unwrap_or_else(|_| QEMU_IMG.to_string())
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: String,
}

/// Probe `path` to determine whether it's a COW container image (as opposed
/// to a raw byte stream) by asking `qemu-img info` for its declared format.
///
/// Returns `true` if the file is a COW container and needs [`convert`]
/// before it can be treated as a raw image.
///
/// # Errors
///
/// Returns [`ConvertError::ToolNotFound`] if `qemu-img` isn't on `PATH`, or
/// [`ConvertError::ProbeFailed`] if it runs but exits non-zero or its output
/// can't be parsed.
pub async fn probe(path: &Path) -> Result<bool, Error> {
    let output = Command::new(qemu_img_binary())
        .arg("info")
        .arg("--output=json")
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| tool_error(&e))?;

    if !output.status.success() {
        let message = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::warn!("qemu-img info failed for {}: {message}", path.display());
        return Err(ConvertError::ProbeFailed { message }.into());
    }

    let parsed: ProbeOutput = serde_json::from_slice(&output.stdout).map_err(|e| {
        ConvertError::ProbeFailed {
            message: format!("could not parse qemu-img info output: {e}"),
        }
    })?;

    tracing::debug!("{} probed as format {}", path.display(), parsed.format);

    Ok(parsed.format != "raw")
}

/// Convert the COW container at `src` into a raw image at `dst`.
///
/// `dst` must not already exist; `qemu-img convert` creates it. The caller is
/// responsible for atomically replacing the staging file with `dst` once
/// this returns successfully.
///
/// # Errors
///
/// Returns [`ConvertError::ToolNotFound`] if `qemu-img` isn't on `PATH`, or
/// [`ConvertError::ConvertFailed`] if the subprocess exits non-zero.
pub async fn convert(src: &Path, dst: &Path) -> Result<(), Error> {
    let output = Command::new(qemu_img_binary())
        .arg("convert")
        .arg("-O")
        .arg("raw")
        .arg(src)
        .arg(dst)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| tool_error(&e))?;

    if !output.status.success() {
        let message = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::warn!(
            "qemu-img convert failed for {} -> {}: {message}",
            src.display(),
            dst.display()
        );
        return Err(ConvertError::ConvertFailed { message }.into());
    }

    tracing::debug!("converted {} to raw at {}", src.display(), dst.display());

    Ok(())
}

fn tool_error(e: &std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        ConvertError::ToolNotFound {
            tool: QEMU_IMG.to_string(),
        }
        .into()
    } else {
        ConvertError::ProbeFailed {
            message: e.to_string(),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_output_parses_raw_format() {
        let json = br#"{"format": "raw", "virtual-size": 1024}"#;
        let parsed: ProbeOutput = serde_json::from_slice(json).unwrap();
        assert_eq!(parsed.format, "raw");
    }

    #[test]
    fn probe_output_parses_qcow2_format() {
        let json = br#"{"format": "qcow2", "virtual-size": 1024}"#;
        let parsed: ProbeOutput = serde_json::from_slice(json).unwrap();
        assert_eq!(parsed.format, "qcow2");
    }

    #[tokio::test]
    async fn probe_reports_tool_not_found_when_binary_missing() {
        let err = Command::new("definitely-not-a-real-binary-xyz")
            .output()
            .await
            .unwrap_err();
        let translated = tool_error(&err);
        assert!(matches!(
            translated,
            Error::Convert(ConvertError::ToolNotFound { .. })
        ));
    }
}
