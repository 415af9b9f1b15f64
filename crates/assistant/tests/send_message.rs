//! End-to-end runs of `send_message` against the in-memory store.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hikewise_assistant::persona::patrick::DOCUMENT_UPSELL;
use hikewise_assistant::{
    ACCESS_DENIED_CODE, AUTH_FAILED_CODE, AssistantService, ChatRequest, MESSAGE_TOO_LONG_CODE,
};
use hikewise_core::{
    AssistantId, CallerCredential, CompletionProvider, CompletionRequest, CompletionResponse,
    ContinuityStore, ExternalProfile, FixedClock, Role, Tier, TranscriptStore, UpstreamError,
    Usage, User, UserStore,
};
use hikewise_providers::ResponsesProvider;
use hikewise_store::InMemoryStore;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

async fn student(store: &InMemoryStore, subject: &str, tier: Tier) -> User {
    store
        .create_user(&ExternalProfile {
            subject: subject.into(),
            email: Some(format!("{subject}@example.edu")),
            full_name: Some("Maya Okafor".into()),
            ..ExternalProfile::default()
        })
        .await
        .unwrap();
    store.set_tier(subject, tier).await.unwrap();
    store.user_by_subject(subject).await.unwrap().unwrap()
}

fn service(store: &Arc<InMemoryStore>) -> AssistantService {
    AssistantService::new(store.clone()).with_clock(Arc::new(FixedClock(noon())))
}

fn ok(text: &str, id: Option<&str>, total: u64) -> Result<CompletionResponse, UpstreamError> {
    Ok(CompletionResponse {
        text: text.into(),
        response_id: id.map(String::from),
        usage: Some(Usage {
            input_tokens: total / 2,
            output_tokens: total - total / 2,
            total_tokens: total,
        }),
        model: "gpt-4o-mini".into(),
        continuity_dropped: false,
    })
}

/// Replays queued results and records every request it receives.
#[derive(Default)]
struct Scripted {
    replies: Mutex<VecDeque<Result<CompletionResponse, UpstreamError>>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl Scripted {
    fn with(replies: Vec<Result<CompletionResponse, UpstreamError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, UpstreamError> {
        self.seen.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(UpstreamError::EmptyCompletion))
    }
}

struct Stalled;

#[async_trait]
impl CompletionProvider for Stalled {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, UpstreamError> {
        tokio::time::sleep(Duration::from_secs(300)).await;
        Err(UpstreamError::EmptyCompletion)
    }
}

#[tokio::test]
async fn free_tier_is_denied_nora() {
    let store = Arc::new(InMemoryStore::new());
    student(&store, "sub_free", Tier::Free).await;
    let provider = Scripted::with(vec![]);
    let service = service(&store).with_provider(AssistantId::Nora, provider.clone());

    let cred = CallerCredential::new("sub_free");
    let out = service
        .send_message(AssistantId::Nora, Some(&cred), ChatRequest::new("help me study"))
        .await;

    assert!(!out.is_success());
    assert_eq!(out.error.as_deref(), Some(ACCESS_DENIED_CODE));
    assert_eq!(out.remaining_messages, Some(0));
    assert_eq!(out.upgrade_required, Some(true));
    assert_eq!(out.tier.as_deref(), Some("free"));
    assert!(provider.requests().is_empty());
    assert_eq!(store.transcript_len().await, 0);
}

#[tokio::test]
async fn last_trial_message_leaves_zero_remaining() {
    let store = Arc::new(InMemoryStore::new());
    let user = student(&store, "sub_trial", Tier::Trial).await;
    let provider = Scripted::with(vec![ok("Here's a plan.", Some("resp_1"), 120)]);
    let service = service(&store).with_provider(AssistantId::Nora, provider.clone());

    for _ in 0..9 {
        service.ledger().record(&user.id, AssistantId::Nora, None, noon()).await.unwrap();
    }

    let cred = CallerCredential::new("sub_trial");
    let out = service
        .send_message(AssistantId::Nora, Some(&cred), ChatRequest::new("plan my week"))
        .await;
    assert!(out.is_success());
    assert_eq!(out.response, "Here's a plan.");
    assert_eq!(out.remaining_messages, Some(0));
    assert_eq!(out.tier.as_deref(), Some("trial"));

    let record = service.ledger().today(&user.id, AssistantId::Nora, noon()).await.unwrap().unwrap();
    assert_eq!(record.messages_sent, 10);
    assert_eq!(record.tokens_used, 120);

    let denied = service
        .send_message(AssistantId::Nora, Some(&cred), ChatRequest::new("one more"))
        .await;
    assert_eq!(denied.error.as_deref(), Some(ACCESS_DENIED_CODE));
    assert!(denied.response.contains("daily Nora message limit (10)"));
}

#[tokio::test]
async fn stale_continuity_is_retried_once_without_reference() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .and(body_partial_json(json!({"previous_response_id": "resp_stale"})))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": {"message": "Previous response not found"}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_fresh",
            "model": "gpt-4o-mini",
            "output_text": "Fresh start, Maya.",
            "usage": {"input_tokens": 80, "output_tokens": 20, "total_tokens": 100}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryStore::new());
    let user = student(&store, "sub_pro", Tier::Pro).await;
    store
        .save_response_id(&user.id, AssistantId::Nora, "resp_stale")
        .await
        .unwrap();

    let provider = ResponsesProvider::new(server.uri(), "sk-test", Duration::from_secs(5)).unwrap();
    let service = service(&store).with_provider(AssistantId::Nora, Arc::new(provider));

    let cred = CallerCredential::new("sub_pro");
    let out = service
        .send_message(AssistantId::Nora, Some(&cred), ChatRequest::new("hi again"))
        .await;

    assert!(out.is_success());
    assert!(out.error.is_none());
    assert_eq!(out.response, "Fresh start, Maya.");
    assert_eq!(out.remaining_messages, Some(99));
    assert_eq!(
        store.last_response_id(&user.id, AssistantId::Nora).await.unwrap().as_deref(),
        Some("resp_fresh")
    );
}

#[tokio::test]
async fn missing_provider_uses_named_fallback() {
    let store = Arc::new(InMemoryStore::new());
    let user = student(&store, "sub_nokey", Tier::Trial).await;
    let service = service(&store);
    assert!(!service.has_provider(AssistantId::Nora));

    let cred = CallerCredential::new("sub_nokey");
    let out = service
        .send_message(AssistantId::Nora, Some(&cred), ChatRequest::new("hello"))
        .await;

    assert!(out.is_success());
    assert!(out.response.starts_with("Hello Maya!"));
    assert_eq!(out.remaining_messages, Some(9));
    assert!(service.ledger().today(&user.id, AssistantId::Nora, noon()).await.unwrap().is_none());

    let thread = store.recent_messages(&user.id, AssistantId::Nora, 10).await.unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[1].metadata.get("fallback"), Some(&json!(true)));
}

#[tokio::test]
async fn patrick_declines_documents_without_spending() {
    let store = Arc::new(InMemoryStore::new());
    let user = student(&store, "sub_prem", Tier::Premium).await;
    let provider = Scripted::with(vec![]);
    let service = service(&store).with_provider(AssistantId::Patrick, provider.clone());

    let cred = CallerCredential::new("sub_prem");
    let out = service
        .send_message(
            AssistantId::Patrick,
            Some(&cred),
            ChatRequest::new("can you read this?").with_document("Lab Report.pdf"),
        )
        .await;

    assert!(out.is_success());
    assert_eq!(out.response, DOCUMENT_UPSELL);
    assert_eq!(out.remaining_messages, Some(40));
    assert_eq!(out.upgrade_prompt.as_deref(), Some("pro"));
    assert!(provider.requests().is_empty());
    assert_eq!(store.transcript_len().await, 0);
    assert!(service.ledger().today(&user.id, AssistantId::Patrick, noon()).await.unwrap().is_none());
}

#[tokio::test]
async fn missing_credential_fails_authentication() {
    let store = Arc::new(InMemoryStore::new());
    let service = service(&store);

    let out = service
        .send_message(AssistantId::Patrick, None, ChatRequest::new("hey"))
        .await;
    assert_eq!(out.error.as_deref(), Some(AUTH_FAILED_CODE));

    let unknown = CallerCredential::new("sub_ghost");
    let out = service
        .send_message(AssistantId::Patrick, Some(&unknown), ChatRequest::new("hey"))
        .await;
    assert_eq!(out.error.as_deref(), Some(AUTH_FAILED_CODE));
    assert!(out.tier.is_none());
}

#[tokio::test]
async fn upstream_error_falls_back_without_counting() {
    let store = Arc::new(InMemoryStore::new());
    let user = student(&store, "sub_500", Tier::Premium).await;
    let provider = Scripted::with(vec![Err(UpstreamError::Status {
        status_code: 500,
        message: "upstream exploded".into(),
    })]);
    let service = service(&store).with_provider(AssistantId::Patrick, provider.clone());

    let cred = CallerCredential::new("sub_500");
    let out = service
        .send_message(AssistantId::Patrick, Some(&cred), ChatRequest::new("I can't focus today"))
        .await;

    assert!(out.is_success());
    assert!(out.error.is_none());
    assert!(out.response.contains("Maya"));
    assert_eq!(provider.requests().len(), 1);
    assert!(service.ledger().today(&user.id, AssistantId::Patrick, noon()).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn slow_upstream_times_out_to_fallback() {
    let store = Arc::new(InMemoryStore::new());
    student(&store, "sub_slow", Tier::Pro).await;
    let service = service(&store)
        .with_provider(AssistantId::Nora, Arc::new(Stalled))
        .with_timeout(Duration::from_secs(2));

    let cred = CallerCredential::new("sub_slow");
    let out = service
        .send_message(AssistantId::Nora, Some(&cred), ChatRequest::new("make me a schedule"))
        .await;

    assert!(out.is_success());
    assert!(out.response.starts_with("Let's build a plan, Maya!"));
}

#[tokio::test]
async fn usage_is_priced_per_assistant() {
    let store = Arc::new(InMemoryStore::new());
    let user = student(&store, "sub_cost", Tier::Pro).await;
    let nora = Scripted::with(vec![ok("a", Some("resp_a"), 1000), ok("b", Some("resp_b"), 500)]);
    let patrick = Scripted::with(vec![ok("c", None, 2000)]);
    let service = service(&store)
        .with_provider(AssistantId::Nora, nora.clone())
        .with_provider(AssistantId::Patrick, patrick);

    let cred = CallerCredential::new("sub_cost");
    service.send_message(AssistantId::Nora, Some(&cred), ChatRequest::new("one")).await;
    let second = service.send_message(AssistantId::Nora, Some(&cred), ChatRequest::new("two")).await;
    service.send_message(AssistantId::Patrick, Some(&cred), ChatRequest::new("three")).await;

    assert_eq!(second.remaining_messages, Some(98));
    // The second call continues from the first response.
    assert_eq!(nora.requests()[1].previous_response_id.as_deref(), Some("resp_a"));

    let nora_day = service.ledger().today(&user.id, AssistantId::Nora, noon()).await.unwrap().unwrap();
    assert_eq!(nora_day.messages_sent, 2);
    assert_eq!(nora_day.tokens_used, 1500);
    // 750 in / 750 out at 0.0025 / 0.01 per 1K.
    assert!((nora_day.cost_estimate - 0.009375).abs() < 1e-9);

    let patrick_day = service.ledger().today(&user.id, AssistantId::Patrick, noon()).await.unwrap().unwrap();
    assert_eq!(patrick_day.messages_sent, 1);
    assert_eq!(patrick_day.tokens_used, 2000);
    assert!((patrick_day.cost_estimate - 0.00075).abs() < 1e-9);
}

#[tokio::test]
async fn length_limit_is_inclusive() {
    let store = Arc::new(InMemoryStore::new());
    student(&store, "sub_len", Tier::Trial).await;
    let service = service(&store);
    let cred = CallerCredential::new("sub_len");

    let at_limit = service
        .send_message(AssistantId::Nora, Some(&cred), ChatRequest::new("a".repeat(2000)))
        .await;
    assert!(at_limit.is_success());

    let over = service
        .send_message(AssistantId::Nora, Some(&cred), ChatRequest::new("a".repeat(2001)))
        .await;
    assert_eq!(over.error.as_deref(), Some(MESSAGE_TOO_LONG_CODE));
    assert_eq!(over.response, "Message too long. Max 2000 chars for your plan. Current: 2001.");
    assert_eq!(over.upgrade_required, Some(true));
}

#[tokio::test]
async fn markup_is_stripped_before_upstream() {
    let store = Arc::new(InMemoryStore::new());
    let user = student(&store, "sub_xss", Tier::Pro).await;
    let provider = Scripted::with(vec![ok("ok", Some("resp_x"), 10)]);
    let service = service(&store).with_provider(AssistantId::Nora, provider.clone());

    let cred = CallerCredential::new("sub_xss");
    service
        .send_message(
            AssistantId::Nora,
            Some(&cred),
            ChatRequest::new("  <script>alert(1)</script><b>explain mitosis</b> "),
        )
        .await;

    assert_eq!(provider.requests()[0].input, "bexplain mitosis/b");
    let thread = store.recent_messages(&user.id, AssistantId::Nora, 10).await.unwrap();
    assert_eq!(thread[0].content, "bexplain mitosis/b");
}

#[tokio::test]
async fn failed_writes_still_answer() {
    let store = Arc::new(InMemoryStore::new());
    student(&store, "sub_ro", Tier::Pro).await;
    let provider = Scripted::with(vec![ok("Still here.", Some("resp_ro"), 40)]);
    let service = service(&store).with_provider(AssistantId::Nora, provider);
    store.set_fail_writes(true);

    let cred = CallerCredential::new("sub_ro");
    let out = service
        .send_message(AssistantId::Nora, Some(&cred), ChatRequest::new("are you there?"))
        .await;

    assert!(out.is_success());
    assert_eq!(out.response, "Still here.");
    assert_eq!(store.transcript_len().await, 0);
}

#[tokio::test]
async fn patrick_history_excludes_current_message() {
    let store = Arc::new(InMemoryStore::new());
    student(&store, "sub_hist", Tier::Premium).await;
    let provider = Scripted::with(vec![ok("First reply", None, 30), ok("Second reply", None, 30)]);
    let service = service(&store).with_provider(AssistantId::Patrick, provider.clone());

    let cred = CallerCredential::new("sub_hist");
    service
        .send_message(AssistantId::Patrick, Some(&cred), ChatRequest::new("I keep procrastinating"))
        .await;
    service
        .send_message(AssistantId::Patrick, Some(&cred), ChatRequest::new("any tips?"))
        .await;

    let requests = provider.requests();
    assert!(requests[0].history.is_empty());
    assert!(requests[0].previous_response_id.is_none());
    assert_eq!(requests[0].max_output_tokens, Some(800));

    let history: Vec<(Role, &str)> = requests[1]
        .history
        .iter()
        .map(|t| (t.role, t.content.as_str()))
        .collect();
    assert_eq!(
        history,
        vec![
            (Role::User, "I keep procrastinating"),
            (Role::Assistant, "First reply"),
        ]
    );
    assert_eq!(requests[1].input, "any tips?");
}

#[tokio::test]
async fn patrick_history_keeps_repeated_question() {
    let store = Arc::new(InMemoryStore::new());
    student(&store, "sub_repeat", Tier::Premium).await;
    let provider = Scripted::with(vec![ok("Try a timer", None, 30), ok("Try it again", None, 30)]);
    let service = service(&store).with_provider(AssistantId::Patrick, provider.clone());

    let cred = CallerCredential::new("sub_repeat");
    for _ in 0..2 {
        service
            .send_message(AssistantId::Patrick, Some(&cred), ChatRequest::new("how do I start?"))
            .await;
    }

    let requests = provider.requests();
    let history: Vec<(Role, &str)> = requests[1]
        .history
        .iter()
        .map(|t| (t.role, t.content.as_str()))
        .collect();
    assert_eq!(
        history,
        vec![
            (Role::User, "how do I start?"),
            (Role::Assistant, "Try a timer"),
        ]
    );
}
