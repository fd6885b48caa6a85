//! Integration tests for error types

#[cfg(test)]
mod tests {
    use rawpull_errors::*;

    #[test]
    fn test_error_conversion() {
        let net_err = NetworkError::Timeout {
            url: "https://example.com".into(),
        };
        let err: Error = net_err.into();
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::DiskFull {
            path: "/var/lib/images".into(),
        };
        assert_eq!(err.to_string(), "disk full: /var/lib/images");
    }

    #[test]
    fn test_error_clone() {
        let err = ImportError::AlreadyInProgress {
            url: "https://example.com/disk.raw.xz".into(),
        };
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let storage_err: StorageError = io_err.into();
        assert!(matches!(storage_err, StorageError::PermissionDenied { .. }));
    }

    #[test]
    fn test_too_large_hint() {
        let err = ImportError::TooLarge {
            size: 9_000_000_000,
            limit: 8 * 1024 * 1024 * 1024,
        };
        assert!(err.user_hint().is_some());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_convert_tool_not_found() {
        let err = ConvertError::ToolNotFound {
            tool: "qemu-img".into(),
        };
        assert!(err.user_message().contains("qemu-img"));
    }
}
