//! HTTP endpoint for MaterialSuites.
//!
//! Read routes go straight to the [`StorageBackend`](msuite_store::StorageBackend);
//! `POST /add` and `PUT /:id/premis` go through the
//! [`IngestPipeline`](msuite_ingest::IngestPipeline). Backend calls are
//! blocking and run on tokio's blocking pool.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServiceConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use router::build_router;
pub use server::MsuiteServer;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use msuite_ingest::{IngestConfig, IngestPipeline};
    use msuite_store::{open_backend, BackendConfig};
    use msuite_types::{PremisObject, PremisRecord};
    use serde_json::Value;
    use tower::util::ServiceExt;

    const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";
    const BOUNDARY: &str = "msuite-test-boundary";

    fn app_with_limit(max_limit: usize) -> Router {
        let backend = open_backend(&BackendConfig::Document {
            blob_chunk_size: 4,
            root: None,
        }).unwrap();
        let pipeline = IngestPipeline::new(backend, &IngestConfig::default()).unwrap();
        build_router(AppState::new(pipeline, max_limit))
    }

    fn app() -> Router {
        app_with_limit(1000)
    }

    fn premis(id: &str, md5: &str) -> Vec<u8> {
        PremisRecord::new(PremisObject::new("local", id).with_fixity("md5", md5))
            .to_xml()
            .unwrap()
            .into_bytes()
    }

    fn add_request(content: &[u8], premis: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, data) in [("content", content), ("premis", premis)] {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Request::builder()
            .method("POST")
            .uri("/add")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = send(app, request).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    /// Child elements named `name` in the structural form of an element.
    fn children<'a>(tree: &'a Value, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        tree["children"]
            .as_array()
            .into_iter()
            .flatten()
            .filter(move |child| child["name"] == name)
    }

    fn put_premis(uri: &str, xml: impl Into<Body>) -> Request<Body> {
        Request::builder().method("PUT").uri(uri).body(xml.into()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Liveness and listing
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn health_endpoint() {
        let (status, body) = send_json(&app(), get("/health")).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn empty_listing() {
        let (status, body) = send_json(&app(), get("/")).await;
        assert_eq!(status, 200);
        assert_eq!(body["materialsuites"], serde_json::json!([]));
        assert_eq!(body["offset"], 0);
        assert_eq!(body["limit"], 1000);
    }

    #[tokio::test]
    async fn listing_pages_and_clamps() {
        let app = app_with_limit(2);
        for id in ["b", "a", "c"] {
            let (status, _) = send(&app, add_request(b"hello", &premis(id, HELLO_MD5))).await;
            assert_eq!(status, StatusCode::CREATED);
        }
        let (_, body) = send_json(&app, get("/?offset=1&limit=50")).await;
        assert_eq!(body["limit"], 2);
        assert_eq!(body["offset"], 1);
        let page = body["materialsuites"].as_array().unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0]["identifier"], "b");
        assert_eq!(page[0]["_link"], "/b");
        assert_eq!(page[1]["identifier"], "c");
    }

    // -----------------------------------------------------------------------
    // Ingest and read back
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn add_then_read_every_view() {
        let app = app();
        let (status, body) = send_json(&app, add_request(b"hello", &premis("doc1", HELLO_MD5))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["created"], "/doc1");

        let (status, body) = send_json(&app, get("/doc1")).await;
        assert_eq!(status, 200);
        assert_eq!(body["_self"], "/doc1");
        assert_eq!(body["content"], "/doc1/content");
        assert_eq!(body["premis"], "/doc1/premis");
        assert_eq!(body["content_exists"], true);
        assert_eq!(body["metadata_exists"], true);

        let (status, bytes) = send(&app, get("/doc1/content")).await;
        assert_eq!(status, 200);
        assert_eq!(bytes, b"hello");

        let response = app.clone().oneshot(get("/doc1/premis")).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/xml");
        let xml = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let record = PremisRecord::parse(&xml).unwrap();
        assert_eq!(record.events_of_type("ingestion").count(), 1);

        let (status, tree) = send_json(&app, get("/doc1/premis/json")).await;
        assert_eq!(status, 200);
        assert_eq!(tree["name"], "premis");
        let event = children(&tree, "event").next().unwrap();
        let event_type = children(event, "eventType").next().unwrap();
        assert_eq!(event_type["children"][0], "ingestion");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn large_content_streams_intact() {
        let app = app();
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let digest = format!("{:x}", md5::compute(&data));
        let (status, _) = send(&app, add_request(&data, &premis("big", &digest))).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, bytes) = send(&app, get("/big/content")).await;
        assert_eq!(status, 200);
        assert_eq!(bytes, data);
    }

    #[tokio::test]
    async fn second_add_conflicts() {
        let app = app();
        let request = || add_request(b"hello", &premis("doc1", HELLO_MD5));
        assert_eq!(send(&app, request()).await.0, StatusCode::CREATED);
        assert_eq!(send(&app, request()).await.0, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn insecure_identifier_is_a_server_error() {
        let app = app();
        let (status, body) = send_json(&app, add_request(b"x", &premis("../etc/passwd", HELLO_MD5))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["message"].as_str().unwrap().contains("insecure identifier"));
        let (_, listing) = send_json(&app, get("/")).await;
        assert_eq!(listing["materialsuites"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn integrity_mismatch_is_a_server_error() {
        let app = app();
        let (status, _) = send(&app, add_request(b"world", &premis("doc2", HELLO_MD5))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(send(&app, get("/doc2")).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_premis_is_a_bad_request() {
        let (status, _) = send(&app(), add_request(b"hello", b"<premis><object>")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_field_is_a_bad_request() {
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"content\"\r\n\r\nhello\r\n--{BOUNDARY}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/add")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap();
        let (status, body) = send_json(&app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("premis"));
    }

    // -----------------------------------------------------------------------
    // Missing suites
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unknown_suite_is_not_found_everywhere() {
        let app = app();
        for uri in ["/ghost", "/ghost/content", "/ghost/premis", "/ghost/premis/json"] {
            assert_eq!(send(&app, get(uri)).await.0, StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn invalid_identifier_in_path_is_not_found() {
        let (status, _) = send(&app(), get("/.hidden")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // -----------------------------------------------------------------------
    // Amendment
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_premis_replaces_record() {
        let app = app();
        send(&app, add_request(b"hello", &premis("doc1", HELLO_MD5))).await;

        let mut record = PremisRecord::parse(&send(&app, get("/doc1/premis")).await.1).unwrap();
        record.set_original_name("hello.txt").unwrap();
        let request = put_premis("/doc1/premis", record.to_xml().unwrap());
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, 200);
        assert_eq!(body["updated"], "/doc1/premis");

        let (_, tree) = send_json(&app, get("/doc1/premis/json")).await;
        let object = children(&tree, "object").next().unwrap();
        let name = children(object, "originalName").next().unwrap();
        assert_eq!(name["children"][0], "hello.txt");
    }

    #[tokio::test]
    async fn put_premis_dropping_events_conflicts() {
        let app = app();
        send(&app, add_request(b"hello", &premis("doc1", HELLO_MD5))).await;
        let before = send(&app, get("/doc1/premis")).await.1;

        let (status, body) = send_json(&app, put_premis("/doc1/premis", premis("doc1", HELLO_MD5))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["message"].as_str().unwrap().contains("rewrites recorded history"));
        assert_eq!(send(&app, get("/doc1/premis")).await.1, before);
    }

    #[tokio::test]
    async fn put_premis_without_suite_is_not_found() {
        let request = put_premis("/doc1/premis", premis("doc1", HELLO_MD5));
        assert_eq!(send(&app(), request).await.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn put_premis_for_other_suite_is_a_bad_request() {
        let app = app();
        send(&app, add_request(b"hello", &premis("doc1", HELLO_MD5))).await;
        let request = put_premis("/doc1/premis", premis("doc9", HELLO_MD5));
        assert_eq!(send(&app, request).await.0, StatusCode::BAD_REQUEST);
    }
}
