use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart;
use reqwest::Client;

use docsift_core::classify::{Classification, ClassifyDocument};
use docsift_core::error::{ClassifyError, ExtractError};
use docsift_core::llm::{EntityMap, EntityValue, ExtractEntities};
use docsift_core::ocr::ExtractOutcome;
use docsift_core::pipeline::{ExtractText, Pipeline};
use docsift_server::handlers::AppState;
use docsift_server::create_router;

struct FixedText(&'static str);

impl ExtractText for FixedText {
    fn extract(&self, _bytes: &[u8], _filename: &str) -> ExtractOutcome {
        ExtractOutcome::Text(self.0.to_string())
    }
}

struct FixedClassifier(Result<Classification, ClassifyError>);

impl ClassifyDocument for FixedClassifier {
    fn classify(&self, _text: &str) -> Result<Classification, ClassifyError> {
        self.0.clone()
    }
}

struct FixedEntities(Result<EntityMap, ExtractError>);

#[async_trait]
impl ExtractEntities for FixedEntities {
    async fn extract(&self, _text: &str, _document_type: &str) -> Result<EntityMap, ExtractError> {
        self.0.clone()
    }
}

fn invoice_entities() -> EntityMap {
    let mut map = EntityMap::new();
    map.insert(
        "invoice_number".to_string(),
        EntityValue {
            value: Some(serde_json::json!("INV-123")),
            confidence: 0.97,
        },
    );
    map
}

async fn spawn_app(pipeline: Pipeline) -> String {
    let app = create_router(AppState { pipeline });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn happy_pipeline() -> Pipeline {
    Pipeline::new(
        Arc::new(FixedText("INVOICE\nInvoice number: INV-123")),
        Arc::new(FixedClassifier(Ok(Classification {
            document_type: "invoice".to_string(),
            confidence: 0.95,
        }))),
        Arc::new(FixedEntities(Ok(invoice_entities()))),
    )
}

async fn post_file(
    base_url: &str,
    bytes: &'static [u8],
    filename: &str,
    mime: &str,
) -> reqwest::Response {
    let part = multipart::Part::bytes(bytes)
        .file_name(filename.to_string())
        .mime_str(mime)
        .unwrap();
    let form = multipart::Form::new().part("file", part);

    Client::new()
        .post(format!("{}/extract_entities/", base_url))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request")
}

#[tokio::test]
async fn test_health_endpoint() {
    let base_url = spawn_app(happy_pipeline()).await;

    let response = Client::new()
        .get(format!("{}/health", base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_extract_entities_happy_path() {
    let base_url = spawn_app(happy_pipeline()).await;

    let response = post_file(&base_url, b"%PDF-1.4 fake", "invoice.pdf", "application/pdf").await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["document_type"], "invoice");
    assert_eq!(body["confidence"], 0.95);
    assert_eq!(body["entities"]["invoice_number"]["value"], "INV-123");

    let processing_time = body["processing_time"].as_str().unwrap();
    assert!(processing_time.ends_with('s'));
    assert!(processing_time.trim_end_matches('s').parse::<f64>().is_ok());
}

#[tokio::test]
async fn test_large_upload_is_accepted() {
    let base_url = spawn_app(happy_pipeline()).await;

    // Sized like a multi-page 400 DPI scan, well past the 2 MiB body limit
    // Axum applies unless the router raises it.
    let payload = vec![0u8; 8 * 1024 * 1024];
    let part = multipart::Part::bytes(payload)
        .file_name("scan.tiff")
        .mime_str("image/tiff")
        .unwrap();
    let form = multipart::Form::new().part("file", part);

    let response = Client::new()
        .post(format!("{}/extract_entities/", base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["document_type"], "invoice");
}

#[tokio::test]
async fn test_unsupported_mime_type_is_rejected() {
    let base_url = spawn_app(happy_pipeline()).await;

    let response = post_file(&base_url, b"some notes", "notes.txt", "text/plain").await;

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("Invalid file type. Supported types are: "));
    assert!(detail.contains("application/pdf"));
}

#[tokio::test]
async fn test_missing_file_field_is_rejected() {
    let base_url = spawn_app(happy_pipeline()).await;

    let form = multipart::Form::new().text("other", "value");
    let response = Client::new()
        .post(format!("{}/extract_entities/", base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_textless_document_is_unprocessable() {
    let pipeline = Pipeline::new(
        Arc::new(FixedText("   \n\t  ")),
        Arc::new(FixedClassifier(Ok(Classification {
            document_type: "invoice".to_string(),
            confidence: 0.95,
        }))),
        Arc::new(FixedEntities(Ok(EntityMap::new()))),
    );
    let base_url = spawn_app(pipeline).await;

    let response = post_file(&base_url, b"blank scan", "blank.png", "image/png").await;

    assert_eq!(response.status(), 422);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body["detail"],
        "Could not extract any text from the document."
    );
}

#[tokio::test]
async fn test_classifier_outage_is_internal_error() {
    let pipeline = Pipeline::new(
        Arc::new(FixedText("some recognized text")),
        Arc::new(FixedClassifier(Err(ClassifyError::Unavailable))),
        Arc::new(FixedEntities(Ok(EntityMap::new()))),
    );
    let base_url = spawn_app(pipeline).await;

    let response = post_file(&base_url, b"scan", "doc.pdf", "application/pdf").await;

    assert_eq!(response.status(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Vector database collection is not available.");
}

#[tokio::test]
async fn test_llm_outage_is_internal_error() {
    let pipeline = Pipeline::new(
        Arc::new(FixedText("some recognized text")),
        Arc::new(FixedClassifier(Ok(Classification {
            document_type: "invoice".to_string(),
            confidence: 0.9,
        }))),
        Arc::new(FixedEntities(Err(ExtractError::Connection))),
    );
    let base_url = spawn_app(pipeline).await;

    let response = post_file(&base_url, b"scan", "doc.pdf", "application/pdf").await;

    assert_eq!(response.status(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Failed to connect to the local LLM service.");
}

#[tokio::test]
async fn test_unknown_document_type_returns_empty_entities() {
    let pipeline = Pipeline::new(
        Arc::new(FixedText("illegible content")),
        Arc::new(FixedClassifier(Ok(Classification {
            document_type: "Unknown".to_string(),
            confidence: 0.0,
        }))),
        Arc::new(FixedEntities(Ok(EntityMap::new()))),
    );
    let base_url = spawn_app(pipeline).await;

    let response = post_file(&base_url, b"scan", "mystery.tiff", "image/tiff").await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["document_type"], "Unknown");
    assert_eq!(body["confidence"], 0.0);
    assert!(body["entities"].as_object().unwrap().is_empty());
}
