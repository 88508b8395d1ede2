use std::{
    io::Write,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use axum::{Router, extract::State, http::StatusCode, routing::get};
use ethereum_types::H256;
use flate2::{Compression, write::GzEncoder};
use op_deployer_core::artifacts::{
    self, ArtifactsError, CachingDownloader, IntegrityChecker, Locator, noop_progressor,
};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use url::Url;

struct ArtifactServer {
    hits: AtomicUsize,
    tarball: Vec<u8>,
}

async fn serve_tarball(State(server): State<Arc<ArtifactServer>>) -> Vec<u8> {
    server.hits.fetch_add(1, Ordering::SeqCst);
    server.tarball.clone()
}

async fn not_found(State(server): State<Arc<ArtifactServer>>) -> StatusCode {
    server.hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND
}

async fn start_server(tarball: Vec<u8>) -> (Arc<ArtifactServer>, Url) {
    let server = Arc::new(ArtifactServer {
        hits: AtomicUsize::new(0),
        tarball,
    });
    let app = Router::new()
        .route("/artifacts.tgz", get(serve_tarball))
        .route("/mirror/artifacts.tgz", get(serve_tarball))
        .route("/missing.tgz", get(not_found))
        .with_state(server.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (server, Url::parse(&format!("http://{addr}/")).unwrap())
}

fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Builds an archive whose single entry name is written verbatim, bypassing
/// the path checks `tar::Builder` applies.
fn tarball_with_raw_name(name: &[u8], data: &[u8]) -> Vec<u8> {
    let mut header = tar::Header::new_old();
    header.as_old_mut().name[..name.len()].copy_from_slice(name);
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    builder.append(&header, data).unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

fn sha256(data: &[u8]) -> H256 {
    H256::from_slice(&Sha256::digest(data))
}

#[tokio::test]
async fn downloads_verifies_and_extracts() {
    let archive = tarball(&[("forge-artifacts/Foo.sol/Foo.json", br#"{"abi":[]}"#.as_slice())]);
    let digest = sha256(&archive);
    let (server, base) = start_server(archive).await;
    let cache = tempfile::tempdir().unwrap();

    let downloader = CachingDownloader::new();
    let fs = downloader
        .resolve(
            &base.join("artifacts.tgz").unwrap(),
            IntegrityChecker::Hash(digest),
            noop_progressor(),
            cache.path(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(fs.root().ends_with("forge-artifacts"));
    let contents = std::fs::read_to_string(fs.root().join("Foo.sol/Foo.json")).unwrap();
    assert_eq!(contents, r#"{"abi":[]}"#);
    assert_eq!(server.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_resolve_is_served_from_cache() {
    let archive = tarball(&[("forge-artifacts/Bar.json", b"{}".as_slice())]);
    let (server, base) = start_server(archive).await;
    let cache = tempfile::tempdir().unwrap();
    let url = base.join("artifacts.tgz").unwrap();
    let downloader = CachingDownloader::new();
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        let fs = downloader
            .resolve(
                &url,
                IntegrityChecker::Noop,
                noop_progressor(),
                cache.path(),
                &cancel,
            )
            .await
            .unwrap();
        assert!(fs.root().join("Bar.json").is_file());
    }

    assert_eq!(server.hits.load(Ordering::SeqCst), 1);
    assert!(CachingDownloader::cache_path(cache.path(), &url).is_file());
}

#[tokio::test]
async fn mirrors_of_the_same_archive_pass_one_hash() {
    let archive = tarball(&[("forge-artifacts/Foo.json", b"{}".as_slice())]);
    let digest = sha256(&archive);
    let (server, base) = start_server(archive).await;
    let cache = tempfile::tempdir().unwrap();
    let downloader = CachingDownloader::new();
    let cancel = CancellationToken::new();

    for path in ["artifacts.tgz", "mirror/artifacts.tgz"] {
        let url = base.join(path).unwrap();
        let fs = downloader
            .resolve(
                &url,
                IntegrityChecker::Hash(digest),
                noop_progressor(),
                cache.path(),
                &cancel,
            )
            .await
            .unwrap();
        assert!(fs.root().join("Foo.json").is_file());
        assert!(CachingDownloader::cache_path(cache.path(), &url).is_file());
    }

    // Cache entries are keyed by URL, so each mirror is fetched once.
    assert_eq!(server.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rejects_archive_with_wrong_hash() {
    let archive = tarball(&[("forge-artifacts/Foo.json", b"{}".as_slice())]);
    let (_server, base) = start_server(archive).await;
    let cache = tempfile::tempdir().unwrap();

    let err = CachingDownloader::new()
        .resolve(
            &base.join("artifacts.tgz").unwrap(),
            IntegrityChecker::Hash(H256::repeat_byte(0xab)),
            noop_progressor(),
            cache.path(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ArtifactsError::IntegrityCheckFailed { expected, .. } if expected == H256::repeat_byte(0xab)));
}

#[tokio::test]
async fn corrupted_cache_entry_fails_without_refetching() {
    let archive = tarball(&[("forge-artifacts/Foo.json", b"{}".as_slice())]);
    let (server, base) = start_server(archive).await;
    let cache = tempfile::tempdir().unwrap();
    let url = base.join("artifacts.tgz").unwrap();
    std::fs::write(
        CachingDownloader::cache_path(cache.path(), &url),
        b"definitely not a gzip stream",
    )
    .unwrap();

    let result = CachingDownloader::new()
        .resolve(
            &url,
            IntegrityChecker::Noop,
            noop_progressor(),
            cache.path(),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(ArtifactsError::Io { .. })));
    assert_eq!(server.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn tampered_cache_entry_fails_the_hash_check() {
    let archive = tarball(&[("forge-artifacts/Foo.json", b"{}".as_slice())]);
    let digest = sha256(&archive);
    let (server, base) = start_server(archive.clone()).await;
    let cache = tempfile::tempdir().unwrap();
    let url = base.join("artifacts.tgz").unwrap();
    let downloader = CachingDownloader::new();
    let cancel = CancellationToken::new();

    downloader
        .resolve(
            &url,
            IntegrityChecker::Hash(digest),
            noop_progressor(),
            cache.path(),
            &cancel,
        )
        .await
        .unwrap();

    let mut tampered = archive;
    let last = tampered.len() - 1;
    tampered[last] ^= 0xff;
    std::fs::write(CachingDownloader::cache_path(cache.path(), &url), tampered).unwrap();

    let err = downloader
        .resolve(
            &url,
            IntegrityChecker::Hash(digest),
            noop_progressor(),
            cache.path(),
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ArtifactsError::IntegrityCheckFailed { .. }));
    assert_eq!(server.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejects_entries_escaping_the_extraction_root() {
    let archive = tarball_with_raw_name(b"../../escape.txt", b"pwned");
    let (_server, base) = start_server(archive).await;
    let cache = tempfile::tempdir().unwrap();

    let err = CachingDownloader::new()
        .resolve(
            &base.join("artifacts.tgz").unwrap(),
            IntegrityChecker::Noop,
            noop_progressor(),
            cache.path(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ArtifactsError::InvalidEntryPath(ref path) if path.contains("escape.txt")));
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let (server, base) = start_server(Vec::new()).await;
    let cache = tempfile::tempdir().unwrap();
    let url = base.join("missing.tgz").unwrap();

    let err = CachingDownloader::new()
        .resolve(
            &url,
            IntegrityChecker::Noop,
            noop_progressor(),
            cache.path(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ArtifactsError::HttpStatus { status: 404, .. }));
    assert_eq!(server.hits.load(Ordering::SeqCst), 1);
    assert!(!CachingDownloader::cache_path(cache.path(), &url).exists());
}

#[tokio::test]
async fn file_locators_resolve_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("Foo.json")).unwrap();
    file.write_all(b"{}").unwrap();
    let cache = tempfile::tempdir().unwrap();

    let locator = Locator::file(dir.path()).unwrap();
    let fs = artifacts::download(&locator, None, cache.path(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(fs.root().join("Foo.json").is_file());
    assert_eq!(std::fs::read_dir(cache.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn unsupported_schemes_are_rejected() {
    let cache = tempfile::tempdir().unwrap();
    let locator = Locator::from_url("ftp://example.com/artifacts.tgz").unwrap();

    let err = artifacts::download(&locator, None, cache.path(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ArtifactsError::UnsupportedScheme(ref scheme) if scheme == "ftp"));
}
