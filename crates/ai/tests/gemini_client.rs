use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use larder_ai::{AiError, GeminiClient, GeminiConfig, RecipeAssistant, RecipeRequest, TextModel};
use larder_core::Headless;
use serde_json::{Value, json};

#[derive(Default)]
struct Seen {
    calls: Vec<String>,
    keys: Vec<String>,
    bodies: Vec<Value>,
}

#[derive(Clone)]
struct StubState {
    status: StatusCode,
    reply: Value,
    seen: Arc<Mutex<Seen>>,
}

struct StubServer {
    base_url: String,
    seen: Arc<Mutex<Seen>>,
    handle: tokio::task::JoinHandle<()>,
}

impl StubServer {
    async fn spawn(status: StatusCode, reply: Value) -> Self {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let state = StubState {
            status,
            reply,
            seen: seen.clone(),
        };
        let app = Router::new()
            .route("/v1beta/models/:call", post(generate))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            seen,
            handle,
        }
    }

    fn client(&self) -> GeminiClient {
        GeminiClient::new(
            GeminiConfig::new("test-key")
                .with_endpoint(&self.base_url)
                .with_model("gemini-test"),
        )
        .unwrap()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn generate(
    State(state): State<StubState>,
    Path(call): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut seen = state.seen.lock().unwrap();
    seen.calls.push(call);
    seen.keys.push(
        headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    );
    seen.bodies.push(body);
    (state.status, Json(state.reply.clone()))
}

fn text_reply(text: &str) -> Value {
    json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
}

#[tokio::test]
async fn posts_prompt_with_api_key() {
    let srv = StubServer::spawn(StatusCode::OK, text_reply("hello")).await;

    let text = srv.client().generate("say hello").await.unwrap();
    assert_eq!(text, "hello");

    let seen = srv.seen.lock().unwrap();
    assert_eq!(seen.calls, vec!["gemini-test:generateContent".to_string()]);
    assert_eq!(seen.keys, vec!["test-key".to_string()]);
    assert_eq!(seen.bodies[0]["contents"][0]["parts"][0]["text"], "say hello");
}

#[tokio::test]
async fn non_success_status_is_an_api_error() {
    let srv = StubServer::spawn(StatusCode::FORBIDDEN, json!({ "error": "bad key" })).await;

    match srv.client().generate("anything").await {
        Err(AiError::Api { status, body }) => {
            assert_eq!(status, 403);
            assert!(body.contains("bad key"));
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn assistant_parses_fenced_recipes_end_to_end() {
    let recipes = r#"```json
[{"title": "Chef's Special Bowl", "time": "15m", "difficulty": "Easy", "match": 90,
  "steps": ["Prep", "Cook"], "stepTimers": [0, 5], "stepTips": ["", "Medium heat"],
  "ingredients": [{"name": "Tofu", "available": true}]}]
```"#;
    let srv = StubServer::spawn(StatusCode::OK, text_reply(recipes)).await;
    let ui = Arc::new(Headless::approving());
    let model: Arc<dyn TextModel> = Arc::new(srv.client());
    let assistant = RecipeAssistant::new(Some(model), ui.clone());

    let out = assistant.generate(&RecipeRequest::new(["Tofu"])).await;
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].step_timers, vec![0, 5]);
    assert!(ui.shown().is_empty());
}

#[tokio::test]
async fn assistant_swallows_not_json_reply() {
    let srv = StubServer::spawn(StatusCode::OK, text_reply("not json")).await;
    let ui = Arc::new(Headless::approving());
    let model: Arc<dyn TextModel> = Arc::new(srv.client());
    let assistant = RecipeAssistant::new(Some(model), ui.clone());

    assert!(assistant.generate(&RecipeRequest::new(["Tofu"])).await.is_empty());
    assert_eq!(ui.shown().len(), 1);
}
