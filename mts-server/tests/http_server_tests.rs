//! HTTP Server & Routing Integration Tests
//!
//! Drives the router with `oneshot` requests against a temporary root
//! folder and a stub transcription model.

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use helpers::{generate_test_wav_bytes, AudioConfig, StubModel, TestEnv};
use http_body_util::BodyExt;
use mts_server::{build_router, AppState};
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "mts-test-boundary";

fn app(env: &TestEnv, model: StubModel) -> Router {
    build_router(AppState::new(env.pipeline(model)))
}

fn multipart_upload(filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload-audio")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_root_route_serves_html() {
    let env = TestEnv::new();
    let response = app(&env, StubModel::arpeggio()).oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().contains("text/html"));
}

#[tokio::test]
async fn test_health_reports_models() {
    let env = TestEnv::new();
    let response = app(&env, StubModel::arpeggio()).oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "mts-server");
    assert_eq!(json["models"], serde_json::json!(["piano", "multi-instrument"]));
}

#[tokio::test]
async fn test_available_models() {
    let env = TestEnv::new();
    for uri in ["/available-models", "/available-models/"] {
        let response = app(&env, StubModel::arpeggio()).oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["available_models"]["piano"], "ismir2021");
        assert_eq!(json["available_models"]["multi-instrument"], "mt3");
    }
}

#[tokio::test]
async fn test_upload_stores_wav() {
    let env = TestEnv::new();
    let wav = generate_test_wav_bytes(&AudioConfig::default()).unwrap();

    let response = app(&env, StubModel::arpeggio())
        .oneshot(multipart_upload("song.wav", &wav))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["filename"], "song.wav");

    let stored = env.config.layout.input_dir.join("song.wav");
    assert_eq!(json["filepath"], stored.display().to_string());
    assert_eq!(std::fs::read(stored).unwrap(), wav);
}

#[tokio::test]
async fn test_upload_rejects_other_extensions_before_storing() {
    let env = TestEnv::new();

    let response = app(&env, StubModel::arpeggio())
        .oneshot(multipart_upload("notes.txt", b"hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "INVALID_INPUT");
    assert!(!env.config.layout.input_dir.join("notes.txt").exists());
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let env = TestEnv::with_toml(|toml| toml.max_upload_bytes = Some(1024));

    let response = app(&env, StubModel::arpeggio())
        .oneshot(multipart_upload("big.wav", &vec![0u8; 8192]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(!env.config.layout.input_dir.join("big.wav").exists());
}

#[tokio::test]
async fn test_invalid_model_rejected_without_inference() {
    let env = TestEnv::new();
    env.write_input_wav("song.wav", &AudioConfig::default());
    let model = StubModel::arpeggio();

    let response = app(&env, model.clone())
        .oneshot(post("/transcribe?filename=song.wav&model_type=violin"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "INVALID_INPUT");
    assert_eq!(model.call_count(), 0);
}

#[tokio::test]
async fn test_transcribe_unknown_file_is_404() {
    let env = TestEnv::new();
    let response = app(&env, StubModel::arpeggio())
        .oneshot(post("/transcribe?filename=ghost.wav"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_transcribe_download_flow() {
    let env = TestEnv::new();
    let wav = generate_test_wav_bytes(&AudioConfig::default()).unwrap();
    let app = app(&env, StubModel::arpeggio());

    let response = app.clone().oneshot(multipart_upload("song.wav", &wav)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post("/transcribe?filename=song.wav&model_type=piano"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["midi_file_name"], "song_transcribed.mid");
    assert_eq!(json["model_type"], "piano");
    assert_eq!(json["note_count"], 4);
    assert!(json["midi_plot_path"].as_str().unwrap().ends_with("song_transcribed.png"));

    let response = app
        .clone()
        .oneshot(get("/download-midi?midi_file_name=song_transcribed.mid"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/midi");
    assert!(body_bytes(response).await.starts_with(b"MThd"));

    let response = app
        .oneshot(get("/download/plot/song_transcribed.png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
}

#[tokio::test]
async fn test_transcribe_base64_payload() {
    let env = TestEnv::new();
    env.write_input_wav("song.wav", &AudioConfig::default());

    let response = app(&env, StubModel::arpeggio())
        .oneshot(post("/transcribe?filename=song.wav&response_format=base64"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let midi = STANDARD.decode(json["midi_file_base64"].as_str().unwrap()).unwrap();
    assert!(midi.starts_with(b"MThd"));
    assert!(json["midi_audio_base64"].is_null());
}

#[tokio::test]
async fn test_download_unknown_midi_is_404() {
    let env = TestEnv::new();
    let response = app(&env, StubModel::arpeggio())
        .oneshot(get("/download-midi?midi_file_name=nothing_transcribed.mid"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_download_rejects_traversal_and_unknown_kind() {
    let env = TestEnv::new();
    let app = app(&env, StubModel::arpeggio());

    let response = app
        .clone()
        .oneshot(get("/download/midi/..%2F..%2Finput_audio%2Fsong.wav"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.oneshot(get("/download/video/a.mp4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_transcription_is_reported_by_health() {
    let env = TestEnv::new();
    std::fs::write(env.config.layout.input_dir.join("broken.wav"), b"garbage").unwrap();
    let app = app(&env, StubModel::arpeggio());

    let response = app
        .clone()
        .oneshot(post("/transcribe?filename=broken.wav"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = body_json(app.oneshot(get("/health")).await.unwrap()).await;
    assert!(json["last_error"].as_str().unwrap().contains("decode"));
}

#[tokio::test]
async fn test_notes_read_back_from_stored_midi() {
    let env = TestEnv::new();
    env.write_input_wav("song.wav", &AudioConfig::default());
    let app = app(&env, StubModel::arpeggio());

    let response = app
        .clone()
        .oneshot(post("/transcribe?filename=song.wav"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get("/notes?midi_file_name=song_transcribed.mid"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["note_count"], 4);
    assert_eq!(json["pitch_range"], serde_json::json!([60, 72]));
    assert_eq!(json["notes"][0]["pitch"], 60);

    let response = app.oneshot(get("/notes?midi_file_name=missing.mid")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_download_name_with_quotes_gets_valid_header() {
    let env = TestEnv::new();
    std::fs::write(env.config.layout.midi_dir.join("say \"hi\".mid"), b"MThd").unwrap();

    let response = app(&env, StubModel::arpeggio())
        .oneshot(get("/download-midi?midi_file_name=say%20%22hi%22.mid"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert_eq!(
        disposition,
        "attachment; filename=\"say \\\"hi\\\".mid\"; filename*=UTF-8''say%20%22hi%22.mid"
    );
}
