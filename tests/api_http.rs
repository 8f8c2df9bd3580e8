// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /api/analyze (ok, invalid, malformed, mistyped)
// - POST /api/analyze-with-documents (document texts, diagnosis/medication history)
// - POST /api/upload-document (txt ok with entities, unsupported type, missing field)

use serde_json::json;
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use triage_analyzer::api::{self, AppState};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests
const BOUNDARY: &str = "triage-test-boundary";

/// Same router the binary uses, with offline state.
fn test_router() -> Router {
    api::router(AppState::offline().expect("offline state"))
}

async fn read_json(resp: shuttle_axum::axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("json body")
}

fn post_json(uri: &str, payload: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST")
}

fn multipart(field: &str, file_name: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{content}\r\n--{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/api/upload-document")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .expect("build multipart")
}

#[tokio::test]
async fn health_reports_backends() {
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = test_router().oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK, "health should be 200");

    let v = read_json(resp).await;
    assert_eq!(v["status"], "ok");
    assert_eq!(v["ner_backend"], "lexicon");
    assert_eq!(v["classifier_backend"], "lexicon-zero-shot");
    assert_eq!(v["document_backend"], "plain-text");
    assert_eq!(v["conditions"], 10);
}

#[tokio::test]
async fn analyze_returns_result_contract() {
    let payload = json!({
        "symptoms_text": "Severe chest pain radiating to my left arm",
        "age": 55,
        "severity": "severe",
        "symptom_duration_days": 1
    });
    let resp = test_router()
        .oneshot(post_json("/api/analyze", &payload))
        .await
        .expect("oneshot /api/analyze");
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    for field in [
        "entities",
        "predicted_conditions",
        "risk_level",
        "risk_factors",
        "recommendations",
        "overall_confidence",
        "disclaimer",
    ] {
        assert!(v.get(field).is_some(), "missing '{field}'");
    }
    assert_eq!(v["risk_level"], "critical");
    assert!(v.get("risk_score").is_none());
    assert!(v.get("flags").is_none(), "no flags on a clean analysis");
    assert_eq!(v["entities"][1]["category"], "symptom");
    assert_eq!(v["recommendations"][0]["trigger"]["kind"], "risk_level");
    assert_eq!(v["recommendations"][0]["trigger"]["value"], "critical");
}

#[tokio::test]
async fn analyze_rejects_empty_texts_with_400() {
    let payload = json!({ "symptoms_text": "   ", "document_text": "" });
    let resp = test_router()
        .oneshot(post_json("/api/analyze", &payload))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = read_json(resp).await;
    assert!(v["error"].as_str().unwrap_or_default().contains("invalid request"));
}

#[tokio::test]
async fn analyze_rejects_out_of_range_age() {
    let payload = json!({ "symptoms_text": "fever", "age": 150 });
    let resp = test_router()
        .oneshot(post_json("/api/analyze", &payload))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn analyze_rejects_malformed_json() {
    let req = Request::builder()
        .method("POST")
        .uri("/api/analyze")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let resp = test_router().oneshot(req).await.unwrap();
    assert!(resp.status().is_client_error(), "got {}", resp.status());
    let v = read_json(resp).await;
    assert!(v["error"].is_string(), "error body should be JSON: {v}");
}

#[tokio::test]
async fn analyze_rejects_negative_age_with_json_error() {
    let payload = json!({ "symptoms_text": "fever", "age": -3 });
    let resp = test_router()
        .oneshot(post_json("/api/analyze", &payload))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let v = read_json(resp).await;
    assert!(v["error"].as_str().unwrap_or_default().contains("age"), "{v}");
}

#[tokio::test]
async fn analyze_with_documents_merges_document_texts() {
    let payload = json!({
        "symptoms_text": "fever and cough",
        "document_texts": ["Radiology: right lower lobe pneumonia"],
        "include_risk_score": true
    });
    let resp = test_router()
        .oneshot(post_json("/api/analyze-with-documents", &payload))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    assert!(v["risk_score"].is_number());
    let entities = v["entities"].as_array().expect("entities");
    assert!(entities
        .iter()
        .any(|e| e["text"] == "pneumonia" && e["source"] == "document"));
    let recs = v["recommendations"].as_array().expect("recommendations");
    assert!(recs.iter().any(|r| r["trigger"]["kind"] == "document"));
}

#[tokio::test]
async fn analyze_with_documents_reads_history_lists() {
    let payload = json!({
        "symptoms_text": "headache",
        "previous_diagnoses": ["hypertension"],
        "current_medications": ["lisinopril"]
    });
    let resp = test_router()
        .oneshot(post_json("/api/analyze-with-documents", &payload))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    let entities = v["entities"].as_array().expect("entities");
    for (text, category) in [("hypertension", "disease"), ("lisinopril", "medication")] {
        assert!(
            entities.iter().any(|e| e["text"] == text
                && e["category"] == category
                && e["source"] == "document"),
            "missing document entity '{text}': {v}"
        );
    }
}

#[tokio::test]
async fn upload_txt_returns_text_and_preview() {
    let resp = test_router()
        .oneshot(multipart("file", "labs.txt", "HbA1c: 8.1%\n\nDiagnosis: diabetes"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    assert!(v["document_id"].as_str().unwrap_or_default().starts_with("DOC-"));
    assert_eq!(v["file_type"], "txt");
    assert_eq!(v["file_name"], "labs.txt");
    assert_eq!(v["text"], "HbA1c: 8.1%\nDiagnosis: diabetes");
    assert_eq!(v["preview"], v["text"]);
    assert_eq!(v["text_length"], 31);

    let entities = v["entities"].as_array().expect("entities");
    assert!(entities.iter().any(|e| e["text"] == "diabetes"
        && e["category"] == "disease"
        && e["source"] == "document"));
    assert!(v["message"]
        .as_str()
        .unwrap_or_default()
        .starts_with("Document processed"));
    assert!(v.get("flags").is_none());
}

#[tokio::test]
async fn upload_rejects_unsupported_type_and_unreadable_scans() {
    let resp = test_router()
        .oneshot(multipart("file", "notes.docx", "whatever"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    // no OCR backend configured in offline mode
    let resp = test_router()
        .oneshot(multipart("file", "scan.pdf", "%PDF-1.4"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn upload_without_file_field_is_400() {
    let resp = test_router()
        .oneshot(multipart("attachment", "labs.txt", "fever"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = read_json(resp).await;
    assert!(v["error"].as_str().unwrap_or_default().contains("'file'"));
}
