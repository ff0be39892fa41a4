//! Integration tests for DirectoryCatalog

use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tetsudou::config::{CatalogBackend, CatalogConfig};
use tetsudou::{load_mirrors, DirectoryCatalog, MetalinkError, MirrorCatalog, Protocol};
use tokio_test::{assert_err, assert_ok};

fn write_entry(dir: &TempDir, repo: &str, content: &str) {
    let mirrors_dir = dir.path().join("mirrors");
    fs::create_dir_all(&mirrors_dir).unwrap();
    fs::write(mirrors_dir.join(format!("{}.json", repo)), content).unwrap();
}

#[tokio::test]
async fn test_reads_mirror_list_from_disk() {
    let dir = TempDir::new().unwrap();
    write_entry(
        &dir,
        "rawhide",
        r#"[
            {"url": "mirror1.example", "protocols": ["https"], "country": "US", "preference": 10},
            {"url": "mirror2.example", "protocols": ["https", "http"], "country": "DE", "preference": 20}
        ]"#,
    );

    let catalog = DirectoryCatalog::new(dir.path());
    let mirrors = assert_ok!(load_mirrors(&catalog, "rawhide").await);

    assert_eq!(mirrors.len(), 2);
    assert_eq!(mirrors[0].url, "mirror1.example");
    assert_eq!(mirrors[1].protocols, vec![Protocol::Https, Protocol::Http]);
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let catalog = DirectoryCatalog::new(dir.path());

    assert_eq!(catalog.get("mirrors/terra99").await.unwrap(), None);

    let err = load_mirrors(&catalog, "terra99").await.unwrap_err();
    assert!(matches!(err, MetalinkError::NotFound(_)));
}

#[tokio::test]
async fn test_empty_list_is_not_found() {
    let dir = TempDir::new().unwrap();
    write_entry(&dir, "empty", "[]");

    let catalog = DirectoryCatalog::new(dir.path());
    let err = load_mirrors(&catalog, "empty").await.unwrap_err();
    assert_eq!(err.to_http_status(), 404);
}

#[tokio::test]
async fn test_malformed_file_is_catalog_error() {
    let dir = TempDir::new().unwrap();
    write_entry(&dir, "broken", "{ this is not json");

    let catalog = DirectoryCatalog::new(dir.path());
    let err = load_mirrors(&catalog, "broken").await.unwrap_err();
    assert!(matches!(err, MetalinkError::CatalogError(_)));
    assert_eq!(err.to_http_status(), 500);
}

#[tokio::test]
async fn test_traversal_keys_rejected() {
    let dir = TempDir::new().unwrap();
    let catalog = DirectoryCatalog::new(dir.path());

    for key in ["../secret", "mirrors/../../etc/passwd", "/etc/passwd", "mirrors//x"] {
        assert_err!(catalog.get(key).await, "key={}", key);
    }
}

#[tokio::test]
async fn test_open_directory_backend() {
    let dir = TempDir::new().unwrap();
    write_entry(
        &dir,
        "terra41",
        r#"[{"url": "m.example", "protocols": ["rsync"], "preference": 1}]"#,
    );

    let config = CatalogConfig {
        backend: CatalogBackend::Directory,
        path: Some(dir.path().to_string_lossy().into_owned()),
        ..CatalogConfig::default()
    };
    let catalog: Arc<dyn MirrorCatalog> = tetsudou::catalog::open_catalog(&config).unwrap();

    let mirrors = load_mirrors(catalog.as_ref(), "terra41").await.unwrap();
    assert_eq!(mirrors[0].protocols, vec![Protocol::Rsync]);
}
