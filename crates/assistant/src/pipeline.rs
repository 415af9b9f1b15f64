//! The `send_message` orchestrator.
//!
//! Steps run strictly in order and each failure short-circuits to its own
//! payload:
//!
//! 1. **Identify** the caller
//! 2. **Check** tier and daily quota
//! 3. **Sanitize** and length-check the message
//! 4. **Preempt** requests the persona declines outright
//! 5. **Assemble** the student context
//! 6. **Persist** the inbound message
//! 7. **Complete** upstream, or fall back when no provider is configured
//! 8. **Persist** the reply and return
//!
//! Nothing past step 3 can fail the request: upstream failures resolve to the
//! persona's fallback reply and persistence failures are logged.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hikewise_config::AppConfig;
use hikewise_core::{
    AssistantId, CallerCredential, ChatMessage, Clock, CompletionProvider, CompletionRequest,
    ContextSnapshot, ContinuityStore, HistoryTurn, IdentityResolver, Store,
    StoreIdentityResolver, SystemClock, Tier, TranscriptStore, UpstreamError, User, UserStore,
};
use hikewise_providers::{ChatCompletionsProvider, ResponsesProvider};
use hikewise_security::{TooLong, sanitize_with_limit};
use hikewise_telemetry::{PricingTable, Rates};
use tracing::{debug, error, info, warn};

use crate::context::ContextAssembler;
use crate::entitlement::{Entitlement, RateLimiter};
use crate::ledger::UsageLedger;
use crate::persona::{Continuity, NoraPersona, PatrickPersona, Persona};
use crate::request::ChatRequest;
use crate::response::{
    ACCESS_DENIED_CODE, AUTH_FAILED_CODE, AUTH_FAILED_REPLY, MESSAGE_TOO_LONG_CODE,
    SendMessageResponse,
};

/// Default ceiling on one upstream exchange, retry included.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// Request-level failures. Each becomes a payload, never an `Err`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChatFailure {
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("access denied: {reason}")]
    AccessDenied { reason: String, tier: Tier },

    #[error("message too long: {} > {}", .too_long.current, .too_long.max)]
    MessageTooLong {
        too_long: TooLong,
        reply: String,
        upgrade_required: bool,
    },
}

impl ChatFailure {
    pub fn into_response(self) -> SendMessageResponse {
        match self {
            Self::AuthenticationFailed => SendMessageResponse {
                response: AUTH_FAILED_REPLY.into(),
                error: Some(AUTH_FAILED_CODE.into()),
                ..SendMessageResponse::default()
            },
            Self::AccessDenied { reason, tier } => SendMessageResponse {
                response: reason,
                error: Some(ACCESS_DENIED_CODE.into()),
                tier: Some(tier.as_str().into()),
                remaining_messages: Some(0),
                upgrade_required: Some(true),
                ..SendMessageResponse::default()
            },
            Self::MessageTooLong {
                reply,
                upgrade_required,
                ..
            } => SendMessageResponse {
                response: reply,
                error: Some(MESSAGE_TOO_LONG_CODE.into()),
                upgrade_required: Some(upgrade_required),
                ..SendMessageResponse::default()
            },
        }
    }
}

/// One assistant's persona and, if configured, its upstream provider.
struct Lane {
    persona: Arc<dyn Persona>,
    provider: Option<Arc<dyn CompletionProvider>>,
}

/// Where a reply came from.
enum Reply {
    Upstream { text: String, model: String },
    Fallback { text: String },
}

impl Reply {
    fn into_message(self, user: &User, assistant: AssistantId) -> ChatMessage {
        let (text, key, value): (String, &str, serde_json::Value) = match self {
            Reply::Upstream { text, model } => (text, "model", model.into()),
            Reply::Fallback { text } => (text, "fallback", true.into()),
        };
        let mut message = ChatMessage::assistant(user.id.clone(), assistant, text);
        message.metadata.insert(key.into(), value);
        message
    }
}

/// Everything about the current message that the upstream call needs.
struct Turn<'a> {
    user: &'a User,
    ctx: &'a ContextSnapshot,
    request: &'a ChatRequest,
    input: &'a str,
    inbound_id: &'a str,
    now: DateTime<Utc>,
}

pub struct AssistantService {
    store: Arc<dyn Store>,
    identity: Arc<dyn IdentityResolver>,
    context: ContextAssembler,
    ledger: UsageLedger,
    clock: Arc<dyn Clock>,
    nora: Lane,
    patrick: Lane,
    timeout: Duration,
}

impl AssistantService {
    /// A service with default personas, no upstream providers, the system
    /// clock and built-in pricing.
    pub fn new<S: Store + 'static>(store: Arc<S>) -> Self {
        let users: Arc<dyn UserStore> = store.clone();
        let store: Arc<dyn Store> = store;
        Self {
            identity: Arc::new(StoreIdentityResolver::new(users)),
            context: ContextAssembler::new(store.clone()),
            ledger: UsageLedger::new(store.clone(), Arc::new(PricingTable::with_defaults())),
            clock: Arc::new(SystemClock),
            nora: Lane {
                persona: Arc::new(NoraPersona::default()),
                provider: None,
            },
            patrick: Lane {
                persona: Arc::new(PatrickPersona::default()),
                provider: None,
            },
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
            store,
        }
    }

    /// Wire providers, models, pricing and the ledger day from config.
    /// Assistants without an API key run on their fallback responder.
    pub fn from_config<S: Store + 'static>(
        config: &AppConfig,
        store: Arc<S>,
    ) -> Result<Self, UpstreamError> {
        let timeout = Duration::from_secs(config.upstream.timeout_secs);
        let base_url = config.upstream.base_url.as_str();

        let pricing = PricingTable::with_defaults();
        let unknown = pricing.apply_overrides(
            config
                .pricing
                .iter()
                .map(|(name, p)| (name.as_str(), Rates::new(p.input_per_k, p.output_per_k))),
        );
        for name in unknown {
            warn!(assistant = %name, "Ignoring pricing override for unknown assistant");
        }

        let nora_settings = &config.assistants.nora;
        let patrick_settings = &config.assistants.patrick;

        let mut service = Self::new(store)
            .with_pricing(Arc::new(pricing))
            .with_utc_offset(config.ledger.utc_offset_minutes)
            .with_timeout(timeout)
            .with_persona(Arc::new(NoraPersona::with_models(
                nora_settings.model.as_deref(),
                nora_settings.deep_model.as_deref(),
            )))
            .with_persona(Arc::new(PatrickPersona::with_model(
                patrick_settings.model.as_deref(),
            )));

        match config.nora_api_key().filter(|k| !k.is_empty()) {
            Some(key) => {
                let provider = ResponsesProvider::new(base_url, key, timeout)?;
                service = service.with_provider(AssistantId::Nora, Arc::new(provider));
            }
            None => warn!("No API key for nora, replies will use the fallback responder"),
        }
        match config.patrick_api_key().filter(|k| !k.is_empty()) {
            Some(key) => {
                let provider = ChatCompletionsProvider::new(base_url, key, timeout)?;
                service = service.with_provider(AssistantId::Patrick, Arc::new(provider));
            }
            None => warn!("No API key for patrick, replies will use the fallback responder"),
        }

        Ok(service)
    }

    pub fn with_provider(
        mut self,
        assistant: AssistantId,
        provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        self.lane_mut(assistant).provider = Some(provider);
        self
    }

    /// Replace the persona for the assistant it identifies as.
    pub fn with_persona(mut self, persona: Arc<dyn Persona>) -> Self {
        let assistant = persona.id();
        self.lane_mut(assistant).persona = persona;
        self
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_pricing(mut self, pricing: Arc<PricingTable>) -> Self {
        self.ledger = UsageLedger::new(self.store.clone(), pricing);
        self
    }

    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.ledger = self.ledger.with_utc_offset(minutes);
        self
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    pub fn identity(&self) -> Arc<dyn IdentityResolver> {
        self.identity.clone()
    }

    pub fn has_provider(&self, assistant: AssistantId) -> bool {
        self.lane(assistant).provider.is_some()
    }

    fn lane(&self, assistant: AssistantId) -> &Lane {
        match assistant {
            AssistantId::Nora => &self.nora,
            AssistantId::Patrick => &self.patrick,
        }
    }

    fn lane_mut(&mut self, assistant: AssistantId) -> &mut Lane {
        match assistant {
            AssistantId::Nora => &mut self.nora,
            AssistantId::Patrick => &mut self.patrick,
        }
    }

    /// Handle one student message. Always returns a payload.
    pub async fn send_message(
        &self,
        assistant: AssistantId,
        credential: Option<&CallerCredential>,
        request: ChatRequest,
    ) -> SendMessageResponse {
        match self.run(assistant, credential, &request).await {
            Ok(response) => response,
            Err(failure) => {
                info!(assistant = %assistant, failure = %failure, "Message rejected");
                failure.into_response()
            }
        }
    }

    async fn run(
        &self,
        assistant: AssistantId,
        credential: Option<&CallerCredential>,
        request: &ChatRequest,
    ) -> Result<SendMessageResponse, ChatFailure> {
        let lane = self.lane(assistant);
        let persona = lane.persona.as_ref();

        // ── 1. Identity ──
        let user = match self.identity.resolve(credential).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(ChatFailure::AuthenticationFailed),
            Err(e) => {
                error!(assistant = %assistant, "Identity lookup failed: {e}");
                return Err(ChatFailure::AuthenticationFailed);
            }
        };

        // ── 2. Entitlement ──
        let now = self.clock.now();
        let entitlement = RateLimiter::new(&self.ledger).check(&user, persona, now).await;
        if !entitlement.allowed {
            return Err(ChatFailure::AccessDenied {
                reason: entitlement.reason,
                tier: entitlement.tier,
            });
        }

        // ── 3. Sanitize ──
        let input = sanitize_with_limit(&request.message, entitlement.max_len).map_err(|too_long| {
            ChatFailure::MessageTooLong {
                reply: persona.too_long_reply(&too_long),
                upgrade_required: persona.too_long_upgrade(entitlement.tier),
                too_long,
            }
        })?;

        // ── 4. Preempt (no quota, no persistence) ──
        if let Some(preempt) = persona.preempt(request) {
            let mut response =
                SendMessageResponse::success(preempt.reply, entitlement.tier, entitlement.remaining);
            response.upgrade_prompt = Some(preempt.upgrade_prompt.into());
            return Ok(response);
        }

        // ── 5. Context ──
        let ctx = self.context.assemble(&user, persona.session_window()).await;

        // ── 6. Inbound message ──
        let inbound = ChatMessage::user(user.id.clone(), assistant, input.clone());
        if let Err(e) = self.store.append_message(&inbound).await {
            error!(user = %user.id, assistant = %assistant, "Failed to save inbound message: {e}");
        }

        // ── 7. Reply ──
        let reply = match &lane.provider {
            Some(provider) => {
                let turn = Turn {
                    user: &user,
                    ctx: &ctx,
                    request,
                    input: &input,
                    inbound_id: &inbound.id,
                    now,
                };
                self.complete(provider.as_ref(), persona, &turn).await
            }
            None => {
                warn!(assistant = %assistant, kind = "not_configured", "Upstream unavailable, using fallback");
                Reply::Fallback {
                    text: persona.fallback(&input, &ctx, request),
                }
            }
        };

        // ── 8. Outbound message ──
        let outbound = reply.into_message(&user, assistant);
        if let Err(e) = self.store.append_message(&outbound).await {
            error!(user = %user.id, assistant = %assistant, "Failed to save reply: {e}");
        }

        Ok(self.success(outbound.content, &entitlement, persona, &ctx, request))
    }

    fn success(
        &self,
        text: String,
        entitlement: &Entitlement,
        persona: &dyn Persona,
        ctx: &ContextSnapshot,
        request: &ChatRequest,
    ) -> SendMessageResponse {
        let remaining = entitlement.remaining.saturating_sub(1);
        info!(
            assistant = %persona.id(),
            tier = %entitlement.tier,
            remaining,
            "Message answered"
        );
        let mut response = SendMessageResponse::success(text, entitlement.tier, remaining);
        response.context = persona.reply_context(ctx, request);
        response
    }

    /// Call upstream, record continuity and usage, or fall back on any failure.
    async fn complete(
        &self,
        provider: &dyn CompletionProvider,
        persona: &dyn Persona,
        turn: &Turn<'_>,
    ) -> Reply {
        let Turn {
            user,
            ctx,
            request,
            input,
            inbound_id,
            now,
        } = *turn;
        let assistant = persona.id();
        let plan = persona.plan(request);

        let mut completion = CompletionRequest {
            model: plan.model,
            instructions: persona.instructions(ctx, request),
            input: input.to_string(),
            history: Vec::new(),
            capabilities: plan.capabilities,
            temperature: plan.temperature,
            max_output_tokens: plan.max_output_tokens,
            previous_response_id: None,
        };

        match plan.continuity {
            Continuity::ResponseChain => {
                completion.previous_response_id = self
                    .store
                    .last_response_id(&user.id, assistant)
                    .await
                    .unwrap_or_else(|e| {
                        error!(user = %user.id, "Continuity read failed: {e}");
                        None
                    });
            }
            Continuity::Transcript { window } => {
                completion.history = self.history(user, assistant, window, inbound_id).await;
            }
        }

        debug!(
            assistant = %assistant,
            provider = provider.name(),
            model = %completion.model,
            history = completion.history.len(),
            continued = completion.previous_response_id.is_some(),
            "Calling upstream"
        );

        let outcome = match tokio::time::timeout(self.timeout, provider.complete(completion)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(self.timeout.as_secs())),
        };

        match outcome {
            Ok(response) => {
                if response.continuity_dropped {
                    info!(user = %user.id, assistant = %assistant, "Recovered after dropping stale continuity reference");
                }
                if let (Continuity::ResponseChain, Some(id)) = (plan.continuity, &response.response_id) {
                    if let Err(e) = self.store.save_response_id(&user.id, assistant, id).await {
                        error!(user = %user.id, "Failed to save continuity reference: {e}");
                    }
                }
                if let Err(e) = self
                    .ledger
                    .record(&user.id, assistant, response.usage.as_ref(), now)
                    .await
                {
                    error!(user = %user.id, assistant = %assistant, "Failed to record usage: {e}");
                }
                Reply::Upstream {
                    text: response.text,
                    model: response.model,
                }
            }
            Err(e) => {
                warn!(assistant = %assistant, kind = e.kind(), "Upstream unavailable, using fallback: {e}");
                Reply::Fallback {
                    text: persona.fallback(input, ctx, request),
                }
            }
        }
    }

    /// Recent transcript turns, oldest first, without the message just saved.
    async fn history(
        &self,
        user: &User,
        assistant: AssistantId,
        window: usize,
        inbound_id: &str,
    ) -> Vec<HistoryTurn> {
        match self.store.recent_messages(&user.id, assistant, window).await {
            Ok(messages) => messages
                .into_iter()
                .filter(|m| m.id != inbound_id)
                .map(|m| HistoryTurn {
                    role: m.role,
                    content: m.content,
                })
                .collect(),
            Err(e) => {
                error!(user = %user.id, "Transcript read failed: {e}");
                Vec::new()
            }
        }
    }
}
