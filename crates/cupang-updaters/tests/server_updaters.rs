//! ---
//! cupang_section: "08-release-sources"
//! cupang_subsection: "tests"
//! cupang_type: "source"
//! cupang_scope: "test"
//! cupang_description: "Server updaters against recorded API shapes."
//! cupang_version: "v0.1.0"
//! cupang_owner: "tbd"
//! ---
use std::sync::Arc;

use cupang_core::{ContentHashes, FileHash, ServerQuery, ServerUpdater, UpdaterError};
use cupang_updaters::{PaperUpdater, PurpurUpdater, ReleaseClient, ServerjarsUpdater};

fn client() -> ReleaseClient {
    ReleaseClient::new("Cupang-Updater/test").unwrap()
}

fn query(server_type: &str, build_number: Option<i64>, sha256: &str) -> ServerQuery {
    let known = ContentHashes {
        sha256: Some(sha256.to_owned()),
        ..ContentHashes::default()
    };
    ServerQuery {
        server_type: server_type.to_owned(),
        server_version: "1.20.4".to_owned(),
        build_number,
        custom_download_url: None,
        hash: Arc::new(FileHash::with_known_hashes("/nonexistent/server.jar", known)),
    }
}

const PAPER_BUILDS: &str = r#"{
  "project_id": "paper",
  "version": "1.20.4",
  "builds": [
    {"build": 496, "downloads": {"application": {"name": "paper-1.20.4-496.jar", "sha256": "aaa"}}},
    {"build": 499, "downloads": {"application": {"name": "paper-1.20.4-499.jar", "sha256": "bbb"}}},
    {"build": 497, "downloads": {"application": {"name": "paper-1.20.4-497.jar", "sha256": "ccc"}}}
  ]
}"#;

#[tokio::test]
async fn paper_offers_newest_build_when_hash_differs() {
    let mut server = mockito::Server::new_async().await;
    let _builds = server
        .mock("GET", "/paper/versions/1.20.4/builds")
        .with_header("content-type", "application/json")
        .with_body(PAPER_BUILDS)
        .create_async()
        .await;
    let head = server
        .mock("HEAD", "/paper/versions/1.20.4/builds/499/downloads/paper-1.20.4-499.jar")
        .with_header("content-type", "application/java-archive")
        .create_async()
        .await;

    let updater = PaperUpdater::new(client()).with_api_base(server.url());
    let offer = updater
        .check_update(query("Paper", Some(496), "aaa"))
        .await
        .unwrap()
        .expect("newer build");
    assert_eq!(offer.build_number, Some(499));
    assert_eq!(offer.version.as_deref(), Some("1.20.4"));
    assert_eq!(
        offer.url,
        format!("{}/paper/versions/1.20.4/builds/499/downloads/paper-1.20.4-499.jar", server.url())
    );
    head.assert_async().await;
}

#[tokio::test]
async fn paper_skips_when_installed_hash_matches() {
    let mut server = mockito::Server::new_async().await;
    let _builds = server
        .mock("GET", "/waterfall/versions/1.20.4/builds")
        .with_header("content-type", "application/json")
        .with_body(PAPER_BUILDS)
        .create_async()
        .await;
    let head = server
        .mock("HEAD", mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let updater = PaperUpdater::new(client()).with_api_base(server.url());
    let offer = updater
        .check_update(query("waterfall", None, "BBB"))
        .await
        .unwrap();
    assert!(offer.is_none());
    head.assert_async().await;
}

#[tokio::test]
async fn purpur_compares_build_numbers() {
    let mut server = mockito::Server::new_async().await;
    let _version = server
        .mock("GET", "/1.20.4")
        .with_header("content-type", "application/json")
        .with_body(r#"{"builds": {"all": ["2169", "2170"], "latest": "2170"}, "project": "purpur"}"#)
        .create_async()
        .await;
    let _head = server
        .mock("HEAD", "/1.20.4/2170/download")
        .with_header("content-type", "application/octet-stream")
        .create_async()
        .await;

    let updater = PurpurUpdater::new(client()).with_api_base(server.url());
    assert!(updater
        .check_update(query("purpur", Some(2170), ""))
        .await
        .unwrap()
        .is_none());

    let offer = updater
        .check_update(query("purpur", Some(2169), ""))
        .await
        .unwrap()
        .expect("newer build");
    assert_eq!(offer.build_number, Some(2170));
    assert_eq!(offer.url, format!("{}/1.20.4/2170/download", server.url()));
}

#[tokio::test]
async fn purpur_rejects_download_that_is_not_a_file() {
    let mut server = mockito::Server::new_async().await;
    let _version = server
        .mock("GET", "/1.20.4")
        .with_header("content-type", "application/json")
        .with_body(r#"{"builds": {"latest": "2170"}}"#)
        .create_async()
        .await;
    let _head = server
        .mock("HEAD", "/1.20.4/2170/download")
        .with_header("content-type", "text/html")
        .create_async()
        .await;

    let updater = PurpurUpdater::new(client()).with_api_base(server.url());
    let err = updater
        .check_update(query("purpur", None, ""))
        .await
        .unwrap_err();
    assert!(matches!(err, UpdaterError::InvalidContent(_)), "{err}");
}

#[tokio::test]
async fn api_errors_surface_as_updater_errors() {
    let mut server = mockito::Server::new_async().await;
    let _missing = server
        .mock("GET", "/1.20.4")
        .with_status(404)
        .create_async()
        .await;

    let updater = PurpurUpdater::new(client()).with_api_base(server.url());
    let err = updater
        .check_update(query("purpur", None, ""))
        .await
        .unwrap_err();
    assert!(matches!(err, UpdaterError::Status { status: 404, .. }), "{err}");
}

fn serverjars_query(server_type: &str, md5: &str) -> ServerQuery {
    let known = ContentHashes {
        md5: Some(md5.to_owned()),
        ..ContentHashes::default()
    };
    ServerQuery {
        hash: Arc::new(FileHash::with_known_hashes("/nonexistent/server.jar", known)),
        ..query(server_type, None, "")
    }
}

#[tokio::test]
async fn serverjars_offers_jar_when_md5_differs() {
    let mut server = mockito::Server::new_async().await;
    let _details = server
        .mock("GET", "/fetchDetails/servers/purpur/1.20.4")
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "success", "response": {"version": "1.20.4", "file": "purpur-1.20.4-2170.jar", "md5": "d41d8cd98f00b204e9800998ecf8427e"}}"#)
        .expect(2)
        .create_async()
        .await;
    let head = server
        .mock("HEAD", "/fetchJar/servers/purpur/1.20.4")
        .with_header("content-type", "application/java-archive")
        .expect(1)
        .create_async()
        .await;

    let updater = ServerjarsUpdater::new(client()).with_api_base(server.url());
    let offer = updater
        .check_update(serverjars_query("Purpur", "0cc175b9c0f1b6a831c399e269772661"))
        .await
        .unwrap()
        .expect("different jar");
    assert_eq!(offer.url, format!("{}/fetchJar/servers/purpur/1.20.4", server.url()));
    assert_eq!(offer.version.as_deref(), Some("1.20.4"));
    assert_eq!(offer.build_number, None);

    assert!(updater
        .check_update(serverjars_query("purpur", "D41D8CD98F00B204E9800998ECF8427E"))
        .await
        .unwrap()
        .is_none());
    head.assert_async().await;
}

#[tokio::test]
async fn serverjars_uses_proxy_category_and_reports_failures() {
    let mut server = mockito::Server::new_async().await;
    let _details = server
        .mock("GET", "/fetchDetails/proxies/velocity/1.20.4")
        .with_header("content-type", "application/json")
        .with_body(r#"{"status": "error", "title": "Not found"}"#)
        .create_async()
        .await;

    let updater = ServerjarsUpdater::new(client()).with_api_base(server.url());
    let err = updater
        .check_update(serverjars_query("velocity", "aaa"))
        .await
        .unwrap_err();
    assert!(matches!(err, UpdaterError::InvalidContent(_)), "{err}");

    assert!(updater
        .check_update(serverjars_query("paper", "aaa"))
        .await
        .unwrap()
        .is_none());
}
