mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use serde_json::{Value, json};
use std::io::Cursor;
use tower::util::ServiceExt;

use common::{FakeBackend, test_app, test_app_with};

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn wav_samples(bytes: &[u8]) -> Vec<i16> {
    let reader = hound::WavReader::new(Cursor::new(bytes.to_vec())).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 24_000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    reader.into_samples::<i16>().map(|s| s.unwrap()).collect()
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app(100);

    let response = send(&app.app, get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "OK"}));

    let response = send(&app.app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["model"]["state"], "unloaded");
    // Health never triggers a load
    assert_eq!(app.backend.loads(), 0);
}

#[tokio::test]
async fn test_models_endpoints() {
    let app = test_app(100);

    let response = send(&app.app, get("/v1/models")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["object"], "list");
    let ids: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["tts-1", "tts-1-hd", "kokoro"]);

    let response = send(&app.app, get("/v1/models/tts-1-hd")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], "tts-1-hd");

    let response = send(&app.app, get("/v1/models/whisper-1")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "model_not_found");
    assert_eq!(json["type"], "invalid_request_error");
}

#[tokio::test]
async fn test_list_voices() {
    let app = test_app(100);

    let response = send(&app.app, get("/v1/audio/voices")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"voices": ["af_bella", "af_heart", "bm_george"]})
    );
}

#[tokio::test]
async fn test_speech_rejects_invalid_requests() {
    let app = test_app(100);

    let cases = [
        (
            json!({"model": "gpt-4", "input": "Hello", "voice": "af_heart"}),
            "invalid_model",
        ),
        (
            json!({"model": "kokoro", "input": "Hello", "voice": "af_heart"}),
            "validation_error",
        ),
        (
            json!({"model": "kokoro", "input": "Hello", "voice": "af_heart", "response_format": "wav", "speed": 9.0}),
            "validation_error",
        ),
        (
            json!({"model": "kokoro", "input": "   ", "voice": "af_heart", "response_format": "wav"}),
            "validation_error",
        ),
        (
            json!({"model": "kokoro", "input": "Hello", "voice": "zz_nobody", "response_format": "wav"}),
            "validation_error",
        ),
    ];

    for (body, category) in cases {
        let response = send(&app.app, post_json("/v1/audio/speech", body.clone())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        let json = body_json(response).await;
        assert_eq!(json["error"], category, "{body}");
    }

    // Rejected requests never reach the model
    assert_eq!(app.backend.loads(), 0);
    assert_eq!(app.backend.generations(), 0);
}

#[tokio::test]
async fn test_unknown_voice_lists_available() {
    let app = test_app(100);

    let response = send(
        &app.app,
        post_json(
            "/v1/audio/speech",
            json!({"input": "Hello", "voice": "af_nobody", "response_format": "wav"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let message = body_json(response).await["message"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(message.contains("af_nobody"));
    assert!(message.contains("af_heart"));
}

#[tokio::test]
async fn test_streaming_wav_speech() {
    let app = test_app(100);

    let response = send(
        &app.app,
        post_json(
            "/v1/audio/speech",
            json!({
                "model": "tts-1",
                "input": "Hello world.",
                "voice": "af_heart",
                "response_format": "wav",
                "stream": true
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
    assert_eq!(response.headers()["x-accel-buffering"], "no");
    assert!(response.headers().get("x-download-path").is_none());

    let bytes = body_bytes(response).await;
    let generations = app.backend.generations();
    assert!(generations >= 1);
    assert_eq!(bytes.len(), 44 + generations * 200);
    assert_eq!(&bytes[..4], b"RIFF");
    // Streamed headers carry the unknown-length placeholder
    assert_eq!(&bytes[40..44], &[0xFF; 4]);

    // The first request loaded the model lazily
    assert_eq!(app.backend.loads(), 1);
    let json = body_json(send(&app.app, get("/health")).await).await;
    assert_eq!(json["model"]["state"], "loaded");
}

#[tokio::test]
async fn test_non_streaming_wav_speech() {
    let app = test_app(120);

    let response = send(
        &app.app,
        post_json(
            "/v1/audio/speech",
            json!({
                "input": "Hello world.",
                "voice": ["af_heart", "af_bella"],
                "response_format": "wav",
                "stream": false
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-accel-buffering").is_none());

    let bytes = body_bytes(response).await;
    let samples = wav_samples(&bytes);
    assert_eq!(samples.len(), app.backend.generations() * 120);
    assert!(samples.iter().all(|&s| s > 0));
}

#[tokio::test]
async fn test_pcm_speech_has_no_header() {
    let app = test_app(50);

    let response = send(
        &app.app,
        post_json(
            "/v1/audio/speech",
            json!({"input": "Hi.", "voice": "af_heart", "response_format": "pcm"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/pcm");

    let bytes = body_bytes(response).await;
    assert_eq!(bytes.len(), app.backend.generations() * 100);
    assert_ne!(&bytes[..4], b"RIFF");
}

#[tokio::test]
async fn test_download_link_round_trip() {
    let app = test_app(100);

    let response = send(
        &app.app,
        post_json(
            "/v1/audio/speech",
            json!({
                "input": "Hello world.",
                "voice": "af_heart",
                "response_format": "wav",
                "stream": true,
                "return_download_link": true
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let download_path = response.headers()["x-download-path"]
        .to_str()
        .unwrap()
        .to_string();
    assert!(download_path.starts_with("/download/tmp"));
    assert!(download_path.ends_with(".wav"));

    let streamed = body_bytes(response).await;

    let response = send(&app.app, get(&download_path)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
    let saved = body_bytes(response).await;

    // Same audio, with the size fields patched in the saved copy
    assert_eq!(saved.len(), streamed.len());
    assert_eq!(&saved[44..], &streamed[44..]);
    assert_eq!(wav_samples(&saved).len(), (streamed.len() - 44) / 2);
}

#[tokio::test]
async fn test_download_missing_partial_and_invalid() {
    let app = test_app(100);
    std::fs::write(app.temp_dir.path().join("tmpabc.wav.part"), b"partial").unwrap();

    let response = send(&app.app, get("/download/tmpabc.wav.part")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app.app, get("/download/tmpmissing.wav")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");

    let response = send(&app.app, get("/download/..")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generation_failure_aborts_stream_and_discards_artifact() {
    let mut backend = FakeBackend::new(100);
    backend.fail_on_call = Some(1);
    let app = test_app_with(backend, |_| {});

    let response = send(
        &app.app,
        post_json(
            "/v1/audio/speech",
            json!({
                "input": "Hello world.",
                "voice": "af_heart",
                "response_format": "wav",
                "return_download_link": true
            }),
        ),
    )
    .await;
    // Headers are already out when synthesis fails; the body errors instead
    assert_eq!(response.status(), StatusCode::OK);
    let result = axum::body::to_bytes(response.into_body(), usize::MAX).await;
    assert!(result.is_err());

    let leftovers = std::fs::read_dir(app.temp_dir.path()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_non_streaming_failure_is_server_error() {
    let mut backend = FakeBackend::new(100);
    backend.missing_weights = true;
    let app = test_app_with(backend, |_| {});

    let response = send(
        &app.app,
        post_json(
            "/v1/audio/speech",
            json!({"input": "Hello.", "voice": "af_heart", "response_format": "wav", "stream": false}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["type"], "server_error");
}

#[tokio::test]
async fn test_combine_voices() {
    let app = test_app(100);
    let response = send(
        &app.app,
        post_json("/v1/audio/voices/combine", json!("af_heart+af_bella")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "permission_denied");

    let app = test_app_with(FakeBackend::new(100), |config| {
        config.allow_local_voice_saving = true;
    });
    let response = send(
        &app.app,
        post_json("/v1/audio/voices/combine", json!(["af_heart", "af_bella"])),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    let bytes = body_bytes(response).await;
    assert_eq!(&bytes[..6], b"\x93NUMPY");

    let response = send(
        &app.app,
        post_json("/v1/audio/voices/combine", json!("af_heart+nobody")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dev_phonemize() {
    let app = test_app(100);

    let response = send(
        &app.app,
        post_json("/dev/phonemize", json!({"text": "abc"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["phonemes"], "abc");
    assert_eq!(json["tokens"].as_array().unwrap().len(), 3);

    let response = send(&app.app, post_json("/dev/phonemize", json!({"text": " "}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dev_generate_from_phonemes() {
    let app = test_app(80);

    let response = send(
        &app.app,
        post_json(
            "/dev/generate_from_phonemes",
            json!({"phonemes": "həlˈO", "voice": "bm_george"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
    assert!(response.headers().get(header::CONTENT_LENGTH).is_none());

    let bytes = body_bytes(response).await;
    assert_eq!(bytes.len(), 44 + 160);
    assert_eq!(app.backend.generations(), 1);
}
