//! HTTP gateway for HikeWise.
//!
//! Exposes the two assistants, voice transcription, and the
//! identity-provider webhook that provisions accounts.
//!
//! Built on Axum.

mod routes;
mod webhook;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use hikewise_assistant::{AssistantService, TranscriptionService};
use hikewise_config::AppConfig;
use hikewise_core::{AssistantId, Clock, Store, SystemClock, UserStore};
use hikewise_security::WebhookVerifier;
use hikewise_store::SqliteStore;

/// Request bodies other than audio uploads.
const BODY_LIMIT: usize = 1024 * 1024;

/// Base64 audio, sized for the upstream's 25 MB file ceiling.
const AUDIO_BODY_LIMIT: usize = 35 * 1024 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub assistant: Arc<AssistantService>,
    pub transcription: Arc<TranscriptionService>,
    pub users: Arc<dyn UserStore>,
    /// Present when a webhook secret is configured.
    pub verifier: Option<WebhookVerifier>,
    pub clock: Arc<dyn Clock>,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    /// State with no upstream providers and no webhook verification.
    pub fn new<S: Store + 'static>(store: Arc<S>) -> Self {
        let assistant = AssistantService::new(store.clone());
        let transcription = TranscriptionService::new(assistant.identity(), None);
        Self {
            assistant: Arc::new(assistant),
            transcription: Arc::new(transcription),
            users: store,
            verifier: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config<S: Store + 'static>(
        config: &AppConfig,
        store: Arc<S>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let assistant = AssistantService::from_config(config, store.clone())?;
        let transcription = TranscriptionService::from_config(config, assistant.identity())?;
        let verifier = match config.webhook.secret.as_deref().filter(|s| !s.is_empty()) {
            Some(secret) => Some(WebhookVerifier::new(secret)?),
            None => {
                warn!("No webhook secret configured, identity webhooks are not verified");
                None
            }
        };
        Ok(Self {
            assistant: Arc::new(assistant),
            transcription: Arc::new(transcription),
            users: store,
            verifier,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_assistant(mut self, assistant: AssistantService) -> Self {
        self.assistant = Arc::new(assistant);
        self
    }

    pub fn with_transcription(mut self, transcription: TranscriptionService) -> Self {
        self.transcription = Arc::new(transcription);
        self
    }

    pub fn with_verifier(mut self, verifier: WebhookVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Build the router with all gateway routes.
///
/// Layers applied:
/// - CORS limited to `allowed_origins`
/// - Request body size limit (1 MB, larger for audio)
/// - HTTP trace logging
pub fn build_router(state: SharedState, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/v1/assistants/{assistant}/messages",
            post(routes::send_message),
        )
        .route(
            "/v1/transcribe",
            post(routes::transcribe).layer(DefaultBodyLimit::max(AUDIO_BODY_LIMIT)),
        )
        .route("/webhooks/identity", post(webhook::identity_webhook))
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server on the configured SQLite database.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = Arc::new(SqliteStore::new(&config.database.url).await?);
    let state = GatewayState::from_config(&config, store)?;

    info!(
        addr = %addr,
        nora = state.assistant.has_provider(AssistantId::Nora),
        patrick = state.assistant.has_provider(AssistantId::Patrick),
        transcription = state.transcription.is_configured(),
        "Gateway starting"
    );

    let app = build_router(Arc::new(state), &config.gateway.allowed_origins);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
