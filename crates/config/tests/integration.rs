//! Integration tests for config

#[cfg(test)]
mod tests {
    use rawpull_config::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[paths]
image_root = "/srv/rawpull/images"

[network]
timeout_secs = 60
retries = 5

[import]
raw_max_size = 4294967296
sparse_alignment = 65536
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(
            config.paths.image_root,
            std::path::PathBuf::from("/srv/rawpull/images")
        );
        assert_eq!(config.network.retries, 5);
        assert_eq!(config.import.raw_max_size, 4_294_967_296);
        assert_eq!(config.import.sparse_alignment, 65536);
    }

    #[tokio::test]
    async fn test_load_config_clamps_oversized_cap() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[import]
raw_max_size = 99999999999999
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.import.raw_max_size, fixed::RAW_MAX_SIZE);
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        std::env::remove_var("RAWPULL_IMAGE_ROOT");
        std::env::remove_var("RAWPULL_TIMEOUT_SECS");

        std::env::set_var("RAWPULL_IMAGE_ROOT", "/tmp/rawpull-test-images");
        std::env::set_var("RAWPULL_TIMEOUT_SECS", "42");

        let mut config = Config::default();
        config.merge_env().unwrap();

        assert_eq!(
            config.paths.image_root,
            std::path::PathBuf::from("/tmp/rawpull-test-images")
        );
        assert_eq!(config.network.timeout_secs, 42);

        std::env::remove_var("RAWPULL_IMAGE_ROOT");
        std::env::remove_var("RAWPULL_TIMEOUT_SECS");
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        std::env::remove_var("RAWPULL_MAX_SIZE");
        std::env::set_var("RAWPULL_MAX_SIZE", "not-a-number");

        let mut config = Config::default();
        let result = config.merge_env();
        assert!(result.is_err());

        std::env::remove_var("RAWPULL_MAX_SIZE");
    }
}
