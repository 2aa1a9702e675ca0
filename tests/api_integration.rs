//! Integration tests for the admitdesk API.
//!
//! These tests spin up a real server instance and make HTTP requests to verify
//! the complete request/response cycle.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

use admitdesk::api::{AppState, create_router};
use admitdesk::config::{
    AppConfig, FileStorageConfig, ObservabilityConfig, ServerConfig, StorageBackend,
    StorageConfig,
};
use admitdesk::service::{MaintenanceService, RemoteClient, ResultService, Syncer};
use admitdesk::storage::{Storage, create_storage};

// ============================================================================
// Test Harness
// ============================================================================

/// Test server instance.
struct TestServer {
    addr: SocketAddr,
    client: Client,
    config: AppConfig,
    storage: Arc<dyn Storage>,
    temp_dir: TempDir,
}

impl TestServer {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".parse().unwrap(),
                port: 0,
            },
            storage: StorageConfig {
                backend: StorageBackend::File,
                file: FileStorageConfig {
                    data_dir: temp_dir.path().join("data"),
                },
                ..Default::default()
            },
            observability: ObservabilityConfig {
                log_level: "warn".to_string(),
                log_format: "text".to_string(),
                metrics_enabled: false,
            },
            ..Default::default()
        };

        let storage = create_storage(&config.storage)
            .await
            .expect("Failed to create storage");

        let state = AppState::new(Arc::new(config.clone()), storage.clone());
        let app = create_router(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server failed");
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr,
            client: Client::new(),
            config,
            storage,
            temp_dir,
        }
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn backup_dir(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("backups")
    }

    fn syncer(&self) -> Syncer {
        let results = Arc::new(ResultService::new(
            self.storage.clone(),
            self.config.results.clone(),
        ));
        let maintenance = Arc::new(MaintenanceService::new(
            self.storage.clone(),
            results.clone(),
            self.config.allocation.clone(),
        ));
        Syncer::new(self.storage.clone(), results, maintenance)
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await
            .expect("Request failed")
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Response {
        self.client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    async fn patch<T: Serialize>(&self, path: &str, body: &T) -> Response {
        self.client
            .patch(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    async fn delete(&self, path: &str) -> Response {
        self.client
            .delete(format!("{}{}", self.base_url(), path))
            .send()
            .await
            .expect("Request failed")
    }
}

/// API response structure.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    code: i32,
    message: String,
    data: Option<T>,
}

impl<T> ApiResponse<T> {
    fn is_success(&self) -> bool {
        self.code == 0
    }
}

#[derive(Debug, Deserialize)]
struct ListData {
    count: usize,
    items: Vec<Value>,
}

fn application_form(name: &str) -> Value {
    json!({
        "name": name,
        "fatherName": "Ramesh Verma",
        "motherName": "Sunita Verma",
        "phone": 9876543210_u64,
        "aadhaar": "123412341234",
        "dateOfBirth": "2012-05-14",
        "school": "City Inter College",
        "classPassed": "10th",
        "address": "Semri, Jaunpur",
        "image": "/api/images/photo"
    })
}

fn result_body(roll_number: &str, name: &str, marks: f64) -> Value {
    json!({
        "rollNumber": roll_number,
        "name": name,
        "fatherName": "Vijay Kumar",
        "subject": "Computer",
        "marks": marks,
        "rank": 1,
        "examDate": "2024-10-18"
    })
}

// ============================================================================
// Health Endpoint Tests
// ============================================================================

#[derive(Debug, Deserialize)]
struct HealthData {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ReadyData {
    ready: bool,
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::new().await;
    let response = server.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: ApiResponse<HealthData> = response.json().await.unwrap();
    assert!(body.is_success());
    assert_eq!(body.data.unwrap().status, "healthy");
}

#[tokio::test]
async fn test_ready_endpoint() {
    let server = TestServer::new().await;
    let response = server.get("/ready").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: ApiResponse<ReadyData> = response.json().await.unwrap();
    assert!(body.is_success());
    assert!(body.data.unwrap().ready);
}

// ============================================================================
// Competition Tests
// ============================================================================

#[tokio::test]
async fn test_competition_submit_and_lookup() {
    let server = TestServer::new().await;

    let response = server
        .post("/api/competition-applications", &application_form("Asha Verma"))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: ApiResponse<Value> = response.json().await.unwrap();
    assert_eq!(body.message, "Application submitted successfully");
    let application = body.data.unwrap();
    assert_eq!(application["rollNumber"], "1001");
    assert_eq!(application["paymentStatus"], "pending");
    assert_eq!(application["phone"], "9876543210");

    let response = server
        .get("/api/competition-applications/roll/1001?dob=2012-05-14")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: ApiResponse<Value> = response.json().await.unwrap();
    assert_eq!(body.data.unwrap()["name"], "Asha Verma");

    let response = server
        .get("/api/competition-applications/roll/1001?dob=2011-01-01")
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = server.get("/api/competition-applications/roll/9999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_competition_payment_and_delete() {
    let server = TestServer::new().await;

    let response = server
        .post("/api/competition-applications", &application_form("Asha Verma"))
        .await;
    let body: ApiResponse<Value> = response.json().await.unwrap();
    let id = body.data.unwrap()["id"].as_str().unwrap().to_string();

    let response = server
        .patch(
            &format!("/api/competition-applications/{id}/payment"),
            &json!({ "status": "verified" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: ApiResponse<Value> = response.json().await.unwrap();
    assert_eq!(body.data.unwrap()["paymentStatus"], "verified");

    let response = server
        .patch(
            &format!("/api/competition-applications/{id}/payment"),
            &json!({ "status": "paid" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = server
        .delete(&format!("/api/competition-applications/{id}"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = server
        .get(&format!("/api/competition-applications/{id}"))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_competition_rejects_incomplete_form() {
    let server = TestServer::new().await;

    let mut form = application_form("Asha Verma");
    form["image"] = json!("");
    let response = server.post("/api/competition-applications", &form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: ApiResponse<Value> = response.json().await.unwrap();
    assert_eq!(
        body.message,
        "Please fill all required fields including student image"
    );
}

#[tokio::test]
async fn test_concurrent_submissions_get_distinct_rolls() {
    let server = Arc::new(TestServer::new().await);

    let mut handles = Vec::new();
    for i in 0..12 {
        let server = server.clone();
        handles.push(tokio::spawn(async move {
            let response = server
                .post(
                    "/api/competition-applications",
                    &application_form(&format!("Student {i}")),
                )
                .await;
            assert_eq!(response.status(), StatusCode::CREATED);
            let body: ApiResponse<Value> = response.json().await.unwrap();
            body.data.unwrap()["rollNumber"]
                .as_str()
                .unwrap()
                .to_string()
        }));
    }

    let mut rolls = HashSet::new();
    for handle in handles {
        rolls.insert(handle.await.unwrap());
    }
    let expected: HashSet<String> = (1001..=1012).map(|n| n.to_string()).collect();
    assert_eq!(rolls, expected);

    let response = server.get("/api/competition-applications").await;
    let body: ApiResponse<ListData> = response.json().await.unwrap();
    assert_eq!(body.data.unwrap().count, 12);
}

// ============================================================================
// Admission Tests
// ============================================================================

#[tokio::test]
async fn test_admission_flow() {
    let server = TestServer::new().await;

    let form = json!({
        "name": "Ravi Singh",
        "email": "ravi@example.com",
        "phone": "9000000000",
        "course": "ADCA",
        "dateOfBirth": "2005-01-20",
        "address": "Jaunpur",
        "education": "12th"
    });
    let response = server.post("/api/admissions", &form).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: ApiResponse<Value> = response.json().await.unwrap();
    let admission = body.data.unwrap();
    assert_eq!(admission["rollNumber"], "ADM00001");
    let id_pattern = Regex::new(r"^[0-9a-f]{32}$").unwrap();
    assert_eq!(admission["status"], "Pending");
    let id = admission["id"].as_str().unwrap().to_string();
    assert!(id_pattern.is_match(&id));

    let response = server
        .patch(
            &format!("/api/admissions/{id}"),
            &json!({ "status": "Approved" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: ApiResponse<Value> = response.json().await.unwrap();
    assert_eq!(body.data.unwrap()["status"], "Approved");

    let response = server.post("/api/admissions", &json!({ "name": "x" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Result Tests
// ============================================================================

#[tokio::test]
async fn test_result_publish_and_search() {
    let server = TestServer::new().await;

    let response = server
        .post(
            "/api/results/create",
            &result_body("SK1158", "Ajay Kumar", 88.0),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: ApiResponse<Value> = response.json().await.unwrap();
    assert_eq!(body.message, "Result created successfully");

    let response = server
        .post(
            "/api/results/create",
            &result_body("SK1158", "Ajay Kumar", 91.0),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: ApiResponse<Value> = response.json().await.unwrap();
    assert_eq!(body.message, "Result updated successfully");

    // Nothing published yet.
    let response = server.get("/api/results/search/SK1158").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ApiResponse<Value> = response.json().await.unwrap();
    assert_eq!(body.code, 4003);
    assert_eq!(body.message, server.config.results.announcement);

    let response = server
        .patch(
            "/api/results/publish",
            &json!({ "rollNumbers": ["SK1158"] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: ApiResponse<Value> = response.json().await.unwrap();
    assert_eq!(body.data.unwrap()["modifiedCount"], 1);

    for query in ["SK1158", "GK1158", "1158", "sk1158"] {
        let response = server.get(&format!("/api/results/search/{query}")).await;
        assert_eq!(response.status(), StatusCode::OK, "search {query}");
        let body: ApiResponse<Value> = response.json().await.unwrap();
        let result = body.data.unwrap();
        assert_eq!(result["rollNumber"], "SK1158");
        assert_eq!(result["marks"], 91.0);
    }

    let response = server.get("/api/results/search/SK9999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: ApiResponse<Value> = response.json().await.unwrap();
    assert_eq!(body.code, 4001);
}

#[tokio::test]
async fn test_result_bulk_rank_and_stats() {
    let server = TestServer::new().await;

    let response = server
        .post(
            "/api/results/bulk-create",
            &json!({
                "results": [
                    result_body("SK1001", "Low", 40.0),
                    result_body("SK1002", "High", 95.0),
                    result_body("SK1003", "Mid", 70.0),
                    { "rollNumber": "SK1004" }
                ]
            }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: ApiResponse<Value> = response.json().await.unwrap();
    let outcome = body.data.unwrap();
    assert_eq!(outcome["created"], 3);
    assert_eq!(outcome["failed"], 1);

    let response = server
        .patch("/api/results/publish", &json!({ "publishAll": true }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = server
        .post(
            "/api/results/recalculate-ranks",
            &json!({ "publishedOnly": true }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = server.get("/api/results/top3").await;
    let body: ApiResponse<ListData> = response.json().await.unwrap();
    let top = body.data.unwrap().items;
    let rolls: Vec<&str> = top
        .iter()
        .map(|t| t["rollNumber"].as_str().unwrap())
        .collect();
    assert_eq!(rolls, vec!["SK1002", "SK1003", "SK1001"]);
    assert_eq!(top[0]["rank"], 1);

    let response = server.get("/api/results/stats").await;
    let body: ApiResponse<Value> = response.json().await.unwrap();
    let stats = body.data.unwrap();
    assert_eq!(stats["total"], 3);
    assert_eq!(stats["published"], 3);

    let response = server.delete("/api/results/SK1001").await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = server.delete("/api/results/SK1001").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = server.patch("/api/results/publish", &json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Upload Tests
// ============================================================================

#[tokio::test]
async fn test_image_upload_and_fetch() {
    let server = TestServer::new().await;
    let bytes = vec![0x89, b'P', b'N', b'G', 1, 2, 3, 4];

    let form = Form::new().part(
        "image",
        Part::bytes(bytes.clone())
            .file_name("photo.png")
            .mime_str("image/png")
            .unwrap(),
    );
    let response = server
        .client
        .post(format!("{}/api/upload/upload-image", server.base_url()))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: ApiResponse<Value> = response.json().await.unwrap();
    let url = body.data.unwrap()["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/api/images/"));

    let response = server.get(&url).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(response.bytes().await.unwrap().to_vec(), bytes);

    let form = Form::new().part(
        "image",
        Part::bytes(b"plain".to_vec())
            .file_name("notes.txt")
            .mime_str("text/plain")
            .unwrap(),
    );
    let response = server
        .client
        .post(format!("{}/api/upload/upload-image", server.base_url()))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ============================================================================
// Sync Tests
// ============================================================================

#[tokio::test]
async fn test_sync_from_remote_replaces_local_data() {
    let source = TestServer::new().await;
    let local = TestServer::new().await;

    for name in ["Asha", "Bela", "Chitra"] {
        source
            .post("/api/competition-applications", &application_form(name))
            .await;
    }
    source
        .post(
            "/api/results/create",
            &result_body("SK1001", "Asha", 77.0),
        )
        .await;
    source
        .patch("/api/results/publish", &json!({ "publishAll": true }))
        .await;

    local
        .post("/api/competition-applications", &application_form("Stale"))
        .await;

    let remote = RemoteClient::new(&source.base_url()).unwrap();
    let report = local
        .syncer()
        .sync_from(&remote, None, &local.backup_dir())
        .await
        .unwrap();
    assert!(report.backup.exists());
    assert!(report.collections.iter().all(|c| c.failed == 0));

    let response = local.get("/api/competition-applications").await;
    let body: ApiResponse<ListData> = response.json().await.unwrap();
    let list = body.data.unwrap();
    assert_eq!(list.count, 3);
    assert!(list.items.iter().all(|a| a["name"] != "Stale"));

    let response = local.get("/api/results/search/SK1001").await;
    assert_eq!(response.status(), StatusCode::OK);

    // Counters follow the imported roll numbers.
    let response = local
        .post("/api/competition-applications", &application_form("Dev"))
        .await;
    let body: ApiResponse<Value> = response.json().await.unwrap();
    assert_eq!(body.data.unwrap()["rollNumber"], "1004");
}

#[tokio::test]
async fn test_push_results_publishes_on_target() {
    let local = TestServer::new().await;
    let target = TestServer::new().await;

    local
        .post(
            "/api/results/bulk-create",
            &json!({
                "results": [
                    result_body("SK1001", "Asha", 77.0),
                    result_body("SK1002", "Bela", 64.0),
                    result_body("SK1003", "Chitra", 50.0)
                ]
            }),
        )
        .await;
    local
        .patch(
            "/api/results/publish",
            &json!({ "rollNumbers": ["SK1001", "SK1002"] }),
        )
        .await;

    let remote = RemoteClient::new(&target.base_url()).unwrap();
    let report = local.syncer().push_results(&remote).await.unwrap();
    assert_eq!(report.pushed, 2);
    assert_eq!(report.upsert.created, 2);
    assert_eq!(report.published, 2);

    let response = target.get("/api/results/search/SK1002").await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = target.get("/api/results/search/SK1003").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
