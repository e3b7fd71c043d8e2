//! # Logging Bootstrap Tests
//!
//! The subscriber is process-global, so only one test here installs it.

use geoapi::{init_logging, AppError};

fn temp_log_path() -> std::path::PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("test_geoapi_log_{id}.log"))
}

#[test]
fn test_events_reach_log_file() {
    let path = temp_log_path();
    init_logging(Some("info"), Some(&path)).unwrap();

    tracing::info!(target: "geoapi::system", client = "-", "logging test marker");
    tracing::debug!(target: "geoapi::system", client = "-", "filtered out");

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("logging test marker"));
    assert!(text.contains("client=\"-\"") || text.contains("client=-"));
    assert!(!text.contains("filtered out"));
    assert!(!text.contains('\u{1b}'), "file output must not carry colour codes");

    // A second install is refused rather than silently replacing the first
    assert!(matches!(init_logging(None, None), Err(AppError::Logging(_))));
}

#[test]
fn test_bad_filter_rejected() {
    assert!(matches!(
        init_logging(Some("geoapi=notalevel"), None),
        Err(AppError::Logging(_))
    ));
}

#[test]
fn test_unwritable_log_file() {
    let path = temp_log_path().join("missing_dir").join("geoapi.log");
    assert!(matches!(
        init_logging(Some("info"), Some(&path)),
        Err(AppError::LogFile { .. })
    ));
}
