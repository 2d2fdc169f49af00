use anyhow::{Context, Result};
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use log::{error, info};
use serde::Deserialize;
use std::sync::Arc;

use crate::rag::RagEngine;

const CHAT_PAGE: &str = include_str!("../templates/chat.html");

#[derive(Debug, Deserialize)]
struct ChatForm {
    #[serde(default)]
    msg: Option<String>,
}

/// Build the application router: the chat page and the chat endpoint.
pub fn router(engine: Arc<RagEngine>) -> Router {
    Router::new()
        .route("/", get(chat_page))
        .route("/get", get(chat).post(chat))
        .with_state(engine)
}

/// Bind the listener and serve requests until the process is stopped.
pub async fn run(addr: &str, engine: Arc<RagEngine>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router(engine))
        .await
        .context("Server error")?;

    Ok(())
}

async fn chat_page() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

/// Answer one chat message. The `msg` field is validated before any upstream
/// call is made; upstream failures surface as a generic 500.
async fn chat(
    State(engine): State<Arc<RagEngine>>,
    Form(form): Form<ChatForm>,
) -> Result<String, (StatusCode, String)> {
    let Some(msg) = form.msg.filter(|m| !m.trim().is_empty()) else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Missing form field 'msg'".to_string(),
        ));
    };
    let question = msg.trim();
    info!("Question: {}", question);

    match engine.answer(question).await {
        Ok(answer) => Ok(answer),
        Err(err) => {
            error!("Failed to answer question: {:#}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate an answer".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::huggingface::{HuggingFaceClient, HuggingFaceConfig};
    use crate::pinecone::PineconeIndex;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// Engine with unreachable upstreams; fine for routes that must not make
    /// upstream calls.
    fn test_engine() -> Arc<RagEngine> {
        let huggingface = HuggingFaceClient::new(HuggingFaceConfig {
            api_token: "test-token".to_string(),
            embeddings_url: "http://localhost:9/embeddings".to_string(),
            chat_url: "http://localhost:9/chat".to_string(),
        });
        let index = PineconeIndex::new("test-key".to_string(), "localhost:9".to_string());

        Arc::new(RagEngine::new(index, huggingface, Settings::default()))
    }

    #[tokio::test]
    async fn chat_page_renders() {
        let response = router(test_engine())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let page = String::from_utf8(body.to_vec()).unwrap();
        assert!(page.contains("<form"));
        assert!(page.contains("msg"));
    }

    #[tokio::test]
    async fn missing_msg_field_is_a_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/get")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(""))
            .unwrap();

        let response = router(test_engine()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8(body.to_vec()).unwrap().contains("msg"));
    }

    #[tokio::test]
    async fn blank_msg_field_is_a_bad_request() {
        let request = Request::builder()
            .method("GET")
            .uri("/get?msg=%20%20")
            .body(Body::empty())
            .unwrap();

        let response = router(test_engine()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
