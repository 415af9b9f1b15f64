//! Authenticated student endpoints.
//!
//! The caller is identified by `Authorization: Bearer <subject>`; the token
//! has already been verified upstream of this service. Pipeline outcomes,
//! including denials, are payloads with status 200.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Json;
use serde_json::{Value, json};

use hikewise_assistant::{ChatRequest, SendMessageResponse, TranscribeRequest, TranscribeResponse};
use hikewise_core::{AssistantId, CallerCredential};

use crate::SharedState;

/// The bearer subject, if one was presented.
fn credential(headers: &HeaderMap) -> Option<CallerCredential> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(CallerCredential::new)
}

pub(crate) async fn send_message(
    State(state): State<SharedState>,
    Path(assistant): Path<String>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<SendMessageResponse>, (StatusCode, Json<Value>)> {
    let Some(assistant) = AssistantId::parse(&assistant) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("Unknown assistant '{assistant}'")})),
        ));
    };

    let credential = credential(&headers);
    let response = state
        .assistant
        .send_message(assistant, credential.as_ref(), request)
        .await;
    Ok(Json(response))
}

pub(crate) async fn transcribe(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<TranscribeRequest>,
) -> Json<TranscribeResponse> {
    let credential = credential(&headers);
    Json(
        state
            .transcription
            .transcribe(credential.as_ref(), request)
            .await,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use hikewise_core::{ExternalProfile, Tier, UserStore};
    use hikewise_store::InMemoryStore;
    use tower::ServiceExt;

    use super::*;
    use crate::{GatewayState, build_router};

    async fn app_with_student(tier: Tier) -> axum::Router {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_user(&ExternalProfile {
                subject: "user_2abc".into(),
                email: Some("jordan@example.edu".into()),
                full_name: Some("Jordan Reyes".into()),
                ..ExternalProfile::default()
            })
            .await
            .unwrap();
        store.set_tier("user_2abc", tier).await.unwrap();
        build_router(Arc::new(GatewayState::new(store)), &[])
    }

    fn post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn credential_requires_bearer_scheme() {
        let mut headers = HeaderMap::new();
        assert!(credential(&headers).is_none());

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(credential(&headers).is_none());

        headers.insert(header::AUTHORIZATION, "Bearer   ".parse().unwrap());
        assert!(credential(&headers).is_none());

        headers.insert(header::AUTHORIZATION, "Bearer user_2abc".parse().unwrap());
        assert_eq!(credential(&headers).unwrap().subject, "user_2abc");
    }

    #[tokio::test]
    async fn message_without_provider_gets_fallback() {
        let app = app_with_student(Tier::Trial).await;
        let response = app
            .oneshot(post(
                "/v1/assistants/nora/messages",
                Some("user_2abc"),
                json!({"message": "help me focus", "thinkingMode": "deep"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["tier"], "trial");
        assert_eq!(body["remaining_messages"], 9);
        assert!(body["response"].as_str().unwrap().contains("Jordan"));
    }

    #[tokio::test]
    async fn denial_is_a_payload() {
        let app = app_with_student(Tier::Free).await;
        let response = app
            .oneshot(post(
                "/v1/assistants/patrick/messages",
                Some("user_2abc"),
                json!({"message": "hey"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["error"], "ACCESS_DENIED");
        assert_eq!(body["upgrade_required"], true);
    }

    #[tokio::test]
    async fn missing_token_fails_authentication() {
        let app = app_with_student(Tier::Pro).await;
        let response = app
            .oneshot(post("/v1/assistants/nora/messages", None, json!({"message": "hi"})))
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["error"], "Authentication failed");
    }

    #[tokio::test]
    async fn unknown_assistant_is_not_found() {
        let app = app_with_student(Tier::Pro).await;
        let response = app
            .oneshot(post(
                "/v1/assistants/clippy/messages",
                Some("user_2abc"),
                json!({"message": "hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn transcription_without_key_is_reported() {
        let app = app_with_student(Tier::Pro).await;
        let response = app
            .oneshot(post(
                "/v1/transcribe",
                Some("user_2abc"),
                json!({"audio_base64": "AAAA"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["text"].is_null());
        assert_eq!(body["error"], "Transcription service not configured");
    }
}
