use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use retrieve_rank::{
    CallStatus, ClientError, ClusterSize, DocumentSource, HttpMethod, HttpRequest, HttpResponse,
    MemoryCallObserver, NoopCallObserver, ReqwestTransport, RetrieveAndRankClient, ServiceConfig,
    Transport, TransportError,
};
use serde_json::json;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> RetrieveAndRankClient<ReqwestTransport, MemoryCallObserver> {
    let config = ServiceConfig::new(server.uri(), "user", "pass");
    let transport = ReqwestTransport::new(&config).unwrap();
    RetrieveAndRankClient::with_parts(
        config,
        Arc::new(transport),
        Arc::new(MemoryCallObserver::new()),
    )
}

#[tokio::test]
async fn every_endpoint_reports_server_errors_as_http_status() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let zip = dir.path().join("config.zip");
    std::fs::write(&zip, b"PK\x03\x04").unwrap();
    let answers = dir.path().join("answers.csv");
    std::fs::write(&answers, "a,b\n").unwrap();
    let download = dir.path().join("download.zip");

    let client = client(&server);
    let results: Vec<(&str, Result<(), ClientError>)> = vec![
        ("list_clusters", client.list_clusters().await.map(drop)),
        ("create_cluster", client.create_cluster("c", None).await.map(drop)),
        ("get_cluster", client.get_cluster("sc1").await.map(drop)),
        ("delete_cluster", client.delete_cluster("sc1").await),
        ("resize_cluster", client.resize_cluster("sc1", 2).await.map(drop)),
        ("cluster_resize_status", client.cluster_resize_status("sc1").await.map(drop)),
        ("cluster_stats", client.cluster_stats("sc1").await.map(drop)),
        ("list_configs", client.list_configs("sc1").await.map(drop)),
        ("upload_config", client.upload_config("sc1", "cfg", &zip).await),
        ("download_config", client.download_config("sc1", "cfg", &download).await.map(drop)),
        ("delete_config", client.delete_config("sc1", "cfg").await),
        ("create_collection", client.create_collection("sc1", "cfg", "docs").await.map(drop)),
        ("delete_collection", client.delete_collection("sc1", "docs").await.map(drop)),
        ("list_collections", client.list_collections("sc1").await.map(drop)),
        (
            "index_documents",
            client
                .index_documents("sc1", "docs", DocumentSource::Raw(json!([{ "id": "1" }])))
                .await
                .map(drop),
        ),
        ("search", client.search("sc1", "docs", "q", &["id"]).await.map(drop)),
        (
            "ranked_search",
            client.ranked_search("sc1", "docs", "r1", "q", &["id"]).await.map(drop),
        ),
        ("list_rankers", client.list_rankers().await.map(drop)),
        ("get_ranker", client.get_ranker("r1").await.map(drop)),
        ("delete_ranker", client.delete_ranker("r1").await),
        ("rank", client.rank("r1", &answers).await.map(drop)),
        (
            "create_ranker",
            client.create_ranker_from_payload("r", "x").await.map(drop),
        ),
    ];

    for (name, result) in &results {
        match result {
            Err(ClientError::HttpStatus { status, body }) => {
                assert_eq!(*status, 500, "{name}");
                assert_eq!(body, "boom", "{name}");
            }
            other => panic!("{name}: expected HttpStatus, got {other:?}"),
        }
    }
    assert!(!download.exists());

    let failures = client.observer().failures();
    assert_eq!(failures.len(), results.len());
    assert!(failures.iter().all(|r| r.http_status == Some(500)));
}

#[tokio::test]
async fn resize_rejects_out_of_range_sizes_without_sending() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/solr_clusters/sc1/cluster_size"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "cluster_id": "sc1" })))
        .expect(7)
        .mount(&server)
        .await;

    let client = client(&server);
    for size in [0, 8] {
        let err = client.resize_cluster("sc1", size).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)), "size {size}");
    }
    for size in 1..=7 {
        client.resize_cluster("sc1", size).await.unwrap();
    }

    let received = server.received_requests().await.unwrap();
    let sizes: Vec<u64> = received
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["cluster_size"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(sizes, [1, 2, 3, 4, 5, 6, 7]);

    let rejected: Vec<_> = client
        .observer()
        .failures()
        .into_iter()
        .filter(|r| r.error_code == Some("validation"))
        .collect();
    assert_eq!(rejected.len(), 2);
    assert!(rejected.iter().all(|r| r.http_status.is_none()));
}

#[tokio::test]
async fn read_only_queries_are_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/solr_clusters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "clusters": [{
                "solr_cluster_id": "sc1",
                "cluster_name": "a",
                "solr_cluster_status": "READY"
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/solr_clusters/sc1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "solr_cluster_id": "sc1", "cluster_size": "1", "solr_cluster_status": "READY"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/solr_clusters/sc1/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "disk_usage": { "used_bytes": 10, "total_bytes": 100 }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(client.list_clusters().await.unwrap(), client.list_clusters().await.unwrap());
    assert_eq!(
        client.get_cluster("sc1").await.unwrap(),
        client.get_cluster("sc1").await.unwrap()
    );
    assert_eq!(
        client.cluster_stats("sc1").await.unwrap(),
        client.cluster_stats("sc1").await.unwrap()
    );
    assert!(client
        .observer()
        .records()
        .iter()
        .all(|r| r.status == CallStatus::Success));
}

#[tokio::test]
async fn create_cluster_sends_name_and_size() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/solr_clusters"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "solr_cluster_id": "sc9", "cluster_name": "prod", "solr_cluster_status": "NOT_AVAILABLE"
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let created = client
        .create_cluster("prod", Some(ClusterSize::new(3).unwrap()))
        .await
        .unwrap();
    assert_eq!(created["solr_cluster_id"], "sc9");

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body, json!({ "cluster_name": "prod", "cluster_size": "3" }));
}

#[tokio::test]
async fn delete_cluster_succeeds_on_200() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/solr_clusters/sc1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "deleted" })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).delete_cluster("sc1").await.unwrap();
}

#[tokio::test]
async fn non_200_success_codes_are_failures() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/solr_clusters/sc1/config/cfg"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let err = client(&server).delete_config("sc1", "cfg").await.unwrap_err();
    assert_eq!(err.status(), Some(204));
}

#[tokio::test]
async fn upload_and_download_config() {
    let server = MockServer::start().await;
    let zip_bytes: &[u8] = b"PK\x03\x04zipped-config";

    Mock::given(method("POST"))
        .and(path("/v1/solr_clusters/sc1/config/cfg"))
        .and(header("content-type", "application/zip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "uploaded" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/solr_clusters/sc1/config/cfg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zip_bytes.to_vec()))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let upload = dir.path().join("upload.zip");
    std::fs::write(&upload, zip_bytes).unwrap();
    let download = dir.path().join("download.zip");

    let client = client(&server);
    client.upload_config("sc1", "cfg", &upload).await.unwrap();
    let written = client.download_config("sc1", "cfg", &download).await.unwrap();

    assert_eq!(written, zip_bytes.len() as u64);
    assert_eq!(std::fs::read(&download).unwrap(), zip_bytes);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received[0].body, zip_bytes);
}

#[tokio::test]
async fn collection_admin_uses_form_actions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/solr_clusters/sc1/solr/admin/collections"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responseHeader": { "status": 0, "QTime": 12 }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    client.create_collection("sc1", "cfg", "docs").await.unwrap();
    client.delete_collection("sc1", "docs").await.unwrap();
    client.list_collections("sc1").await.unwrap();

    let received = server.received_requests().await.unwrap();
    let bodies: Vec<String> = received
        .iter()
        .map(|r| String::from_utf8_lossy(&r.body).to_string())
        .collect();
    assert_eq!(
        bodies[0],
        "action=CREATE&name=docs&collection.configName=cfg&wt=json"
    );
    assert_eq!(bodies[1], "action=DELETE&name=docs&wt=json");
    assert_eq!(bodies[2], "action=LIST&wt=json");
}

#[tokio::test]
async fn index_reports_nonzero_solr_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/solr_clusters/sc1/solr/docs/update"))
        .and(body_string_contains("\"id\":\"bad\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responseHeader": { "status": 400 },
            "error": { "msg": "unknown field" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/solr_clusters/sc1/solr/docs/update"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "responseHeader": { "status": 0 }
        })))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let docs = dir.path().join("docs.json");
    std::fs::write(&docs, r#"{"add":{"doc":{"id":"1","body":"hello"}}}"#).unwrap();

    let client = client(&server);
    client
        .index_documents("sc1", "docs", DocumentSource::File(docs))
        .await
        .unwrap();

    let err = client
        .index_documents("sc1", "docs", DocumentSource::Raw(json!([{ "id": "bad" }])))
        .await
        .unwrap_err();
    match err {
        ClientError::Indexing { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("unknown field"));
        }
        other => panic!("expected Indexing, got {other:?}"),
    }

    let records = client.observer().records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, CallStatus::Success);
    let failures = client.observer().failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].operation, "index_documents");
    assert_eq!(failures[0].http_status, Some(200));
    assert_eq!(failures[0].error_code, Some("indexing"));

    let received = server.received_requests().await.unwrap();
    assert_eq!(
        String::from_utf8_lossy(&received[0].body),
        r#"{"add":{"doc":{"id":"1","body":"hello"}}}"#
    );
}

#[tokio::test]
async fn search_and_ranked_search_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/solr_clusters/sc1/solr/docs/select"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "numFound": 1, "docs": [{ "id": "1" }] }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/solr_clusters/sc1/solr/docs/fcselect"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": { "numFound": 1, "docs": [{ "id": "1", "score": 10.0 }] }
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let plain = client
        .search("sc1", "docs", "what is rust", &["id", "title"])
        .await
        .unwrap();
    assert_eq!(plain["response"]["numFound"], 1);
    client
        .ranked_search("sc1", "docs", "r-1", "what is rust", &["id"])
        .await
        .unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(
        String::from_utf8_lossy(&received[0].body),
        "q=what+is+rust&wt=json&fl=id%2Ctitle"
    );
    let query: Vec<(String, String)> = received[1]
        .url
        .query_pairs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    assert!(query.contains(&("ranker_id".to_string(), "r-1".to_string())));
    assert!(query.contains(&("q".to_string(), "what is rust".to_string())));
}

#[tokio::test]
async fn undecodable_success_body_is_recorded_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/rankers"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-global-transaction-id", "txn-42")
                .set_body_string("not json"),
        )
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.list_rankers().await.unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));

    let records = client.observer().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, CallStatus::Failure);
    assert_eq!(records[0].http_status, Some(200));
    assert_eq!(records[0].error_code, Some("decode"));
    assert_eq!(records[0].request_id.as_deref(), Some("txn-42"));
}

#[tokio::test]
async fn successful_calls_carry_the_transaction_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/solr_clusters/sc1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-request-id", "req-7")
                .set_body_json(json!({ "solr_cluster_id": "sc1" })),
        )
        .mount(&server)
        .await;

    let client = client(&server);
    client.get_cluster("sc1").await.unwrap();
    let records = client.observer().records();
    assert_eq!(records[0].status, CallStatus::Success);
    assert_eq!(records[0].request_id.as_deref(), Some("req-7"));
}

#[tokio::test]
async fn rejected_download_keeps_existing_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/solr_clusters/sc1/config/cfg"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such config"))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("cfg.zip");
    std::fs::write(&dest, b"older copy").unwrap();

    let client = client(&server);
    let err = client.download_config("sc1", "cfg", &dest).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(std::fs::read(&dest).unwrap(), b"older copy");
    assert!(!dir.path().join("cfg.zip.part").exists());
}

#[tokio::test]
async fn interrupted_download_leaves_no_file_behind() {
    // Announce a 1000-byte body, send a few bytes, then hang up.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let _ = socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: application/zip\r\n\
                  content-length: 1000\r\n\r\nPK\x03\x04trunc",
            )
            .await;
        let _ = socket.flush().await;
    });

    let config = ServiceConfig::new(format!("http://{addr}"), "user", "pass");
    let transport = ReqwestTransport::new(&config).unwrap();
    let client = RetrieveAndRankClient::with_parts(
        config,
        Arc::new(transport),
        Arc::new(MemoryCallObserver::new()),
    );

    let dir = tempdir().unwrap();
    let dest = dir.path().join("cfg.zip");
    let err = client.download_config("sc1", "cfg", &dest).await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");
    assert!(!dest.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(client.observer().failures().len(), 1);
}

#[tokio::test]
async fn reserved_characters_in_ids_stay_inside_their_segment() {
    let transport = Arc::new(ScriptedTransport::default());
    let client = RetrieveAndRankClient::with_parts(
        ServiceConfig::new("https://rnr.example.com/api", "u", "p"),
        transport.clone(),
        Arc::new(NoopCallObserver),
    );

    client.get_cluster("sc1/config?x=1").await.unwrap();
    client.get_ranker("r#1").await.unwrap();

    let seen = transport.seen.lock().unwrap().clone();
    assert_eq!(
        seen[0].1,
        "https://rnr.example.com/api/v1/solr_clusters/sc1%2Fconfig%3Fx=1"
    );
    assert_eq!(seen[1].1, "https://rnr.example.com/api/v1/rankers/r%231");
}

#[tokio::test]
async fn connection_failure_is_transport_error() {
    // Nothing listens on port 9 of localhost in the test environment.
    let config = ServiceConfig::new("http://127.0.0.1:9", "user", "pass");
    let transport = ReqwestTransport::new(&config).unwrap();
    let client = RetrieveAndRankClient::with_parts(
        config,
        Arc::new(transport),
        Arc::new(MemoryCallObserver::new()),
    );

    let err = client.list_clusters().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
    let failures = client.observer().failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].http_status, None);
}

// =============================================================================
// Custom transport
// =============================================================================

#[derive(Default)]
struct ScriptedTransport {
    seen: Mutex<Vec<(HttpMethod, String)>>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.seen.lock().unwrap().push((req.method, req.url.clone()));
        if req.url.ends_with("/config/cfg") {
            Ok(HttpResponse::new(200, b"zip-bytes".to_vec()))
        } else {
            Ok(HttpResponse::new(200, br#"{"rankers":[]}"#.to_vec()))
        }
    }
}

#[tokio::test]
async fn client_works_over_any_transport() {
    let transport = Arc::new(ScriptedTransport::default());
    let client = RetrieveAndRankClient::with_parts(
        ServiceConfig::new("https://rnr.example.com/api", "u", "p"),
        transport.clone(),
        Arc::new(NoopCallObserver),
    );

    assert_eq!(client.list_rankers().await.unwrap(), json!({ "rankers": [] }));

    let dir = tempdir().unwrap();
    let dest = dir.path().join("cfg.zip");
    let written = client.download_config("sc1", "cfg", &dest).await.unwrap();
    assert_eq!(written, 9);
    assert_eq!(std::fs::read(&dest).unwrap(), b"zip-bytes");

    let seen = transport.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        [
            (HttpMethod::Get, "https://rnr.example.com/api/v1/rankers".to_string()),
            (
                HttpMethod::Get,
                "https://rnr.example.com/api/v1/solr_clusters/sc1/config/cfg".to_string()
            ),
        ]
    );
}
