//! Patrick: the coaching-only study companion.
//!
//! Stateless chat completions with a replayed transcript window. Declines
//! documents, web research and heavy computation, pointing at Nora instead.

use hikewise_core::{AssistantId, ContextSnapshot, Tier};
use hikewise_security::TooLong;

use super::{
    CompletionPlan, Continuity, DEFAULT_FOCUS_METHOD, DEFAULT_WEEKLY_GOAL, Persona, Preempt,
    greeting_name, mentions,
};
use crate::entitlement::{Denial, TierPolicy};
use crate::request::ChatRequest;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const TEMPERATURE: f32 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 800;
const SESSION_WINDOW: usize = 5;
const TRANSCRIPT_WINDOW: usize = 10;

pub const DOCUMENT_UPSELL: &str = "I appreciate you sharing that document! Unfortunately, I'm not able to read or analyze PDFs. But Nora AI on the Pro plan can dive deep into your documents — she'll create study guides, practice questions, and summaries from them. Want me to help you with something else in the meantime?";

#[derive(Debug, Clone)]
pub struct PatrickPersona {
    model: String,
}

impl Default for PatrickPersona {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
        }
    }
}

impl PatrickPersona {
    pub fn with_model(model: Option<&str>) -> Self {
        model
            .map(|m| Self { model: m.to_string() })
            .unwrap_or_default()
    }
}

fn profile_lines(ctx: &ContextSnapshot) -> String {
    let mut lines = String::new();
    if let Some(university) = ctx.university() {
        lines.push_str(&format!("\n- University: {university}"));
    }
    if let Some(major) = ctx.major() {
        lines.push_str(&format!("\n- Major: {major}"));
    }
    if let Some(lb) = &ctx.leaderboard {
        lines.push_str(&format!(
            "\n- Level: {}\n- Total Focus Time: {} hours\n- Current Streak: {} days\n- Sessions Completed: {}",
            ctx.level(),
            lb.total_focus_hours(),
            lb.current_streak,
            lb.sessions_completed
        ));
    }
    if !ctx.recent_sessions.is_empty() {
        lines.push_str(&format!(
            "\n- Recent Activity: {} sessions, {} minutes total",
            ctx.recent_sessions.len(),
            ctx.recent_focus_minutes()
        ));
    }
    lines
}

impl Persona for PatrickPersona {
    fn id(&self) -> AssistantId {
        AssistantId::Patrick
    }

    fn policy(&self, tier: Tier) -> TierPolicy {
        match tier {
            Tier::Trial => TierPolicy::enabled(15, 1500),
            Tier::Premium => TierPolicy::enabled(40, 2000),
            Tier::Pro => TierPolicy::enabled(100, 3000),
            Tier::Free | Tier::Unknown => TierPolicy::disabled(500),
        }
    }

    fn denial_reason(&self, tier: Tier, denial: Denial, policy: &TierPolicy) -> String {
        match denial {
            Denial::TierIneligible => "Patrick AI is available for Premium and Pro members. Upgrade to unlock your personal study coach!".into(),
            Denial::QuotaExhausted => {
                let next = if tier == Tier::Premium {
                    "Upgrade to Pro for more messages and access to Nora AI!"
                } else {
                    "Come back tomorrow!"
                };
                format!(
                    "You've reached your daily Patrick message limit ({}). {next}",
                    policy.messages_per_day
                )
            }
        }
    }

    fn too_long_reply(&self, too_long: &TooLong) -> String {
        format!(
            "Message too long. Max {} characters for your plan. Current: {}.",
            too_long.max, too_long.current
        )
    }

    fn too_long_upgrade(&self, tier: Tier) -> bool {
        tier == Tier::Premium
    }

    fn session_window(&self) -> usize {
        SESSION_WINDOW
    }

    fn preempt(&self, request: &ChatRequest) -> Option<Preempt> {
        request.document.as_ref().map(|_| Preempt {
            reply: DOCUMENT_UPSELL,
            upgrade_prompt: "pro",
        })
    }

    fn instructions(&self, ctx: &ContextSnapshot, _request: &ChatRequest) -> String {
        let name = greeting_name(ctx);
        let method = ctx.focus_method().unwrap_or(DEFAULT_FOCUS_METHOD);
        let goal = ctx.weekly_focus_goal().unwrap_or(DEFAULT_WEEKLY_GOAL);
        let profile = profile_lines(ctx);

        format!(
            r#"You are Patrick, a friendly and knowledgeable AI study coach inside HikeWise — the academic success platform. You're warm, encouraging, and practical. Think of yourself as a supportive upperclassman who's been through it all and genuinely wants to help.

**Student Profile:**
- Name: {name}
- Study Method: {method}
- Weekly Focus Goal: {goal} hours{profile}

**Your Strengths (what you're great at):**
- Study planning and scheduling advice
- Focus and concentration techniques (especially {method})
- Time management and productivity strategies
- Motivation, accountability, and overcoming procrastination
- General study tips and academic advice
- Exam preparation strategies
- Stress management and work-life balance
- Celebrating progress and encouraging consistency

**Your Style:**
- Be conversational and encouraging — not robotic or generic
- Give specific, actionable advice (not just "study harder")
- Reference their actual data when relevant (streak, focus time, weekly goal)
- Keep responses concise but helpful (2-4 paragraphs max unless they ask for more)
- Use their name naturally (not every message, but occasionally)
- When they're struggling, be empathetic first, then offer practical next steps
- Celebrate wins, no matter how small

**Boundaries (handle gracefully):**
- If asked to search the web, research something, or find current information: "I can't search the web, but I can share what I know! For real-time research, Nora AI on the Pro plan can search the internet and cite sources for you."
- If asked to analyze a PDF, document, or uploaded file: "I'm not able to read documents, but Nora AI on the Pro plan can analyze your PDFs, create study guides, and generate practice questions from them!"
- If asked to solve complex math, run code, or do STEM calculations: "That's a bit beyond my wheelhouse! Nora AI on the Pro plan has a code interpreter that can work through math and science problems step by step."
- If asked to write entire essays or complete assignments: "I'd love to help you plan and outline your work! I can help with thesis development, structure, and study strategies — but the actual writing is your superpower. Want to start with an outline?"
- Keep upsell mentions natural and helpful, not pushy — mention Nora only when genuinely relevant

**Safety:**
- Follow academic integrity guidelines
- Provide guidance and scaffolding, not complete solutions to graded work
- Be honest when you don't know something"#
        )
    }

    fn fallback(&self, input: &str, ctx: &ContextSnapshot, _request: &ChatRequest) -> String {
        let name = greeting_name(ctx);
        let lower = input.to_lowercase();

        if mentions(&lower, &["focus", "concentrate"]) {
            return format!(
                "Great question about focus, {name}! Try the \"5-4-3-2-1\" grounding technique before your next study session: name 5 things you see, 4 you hear, 3 you feel, 2 you smell, 1 you taste. It brings your mind fully into the present. Then start with just 15 minutes of focused work — momentum will carry you from there!"
            );
        }
        if mentions(&lower, &["motivation", "procrastination"]) {
            return format!(
                "I hear you, {name}. Here's what works: pick the smallest possible next step for your task. Not \"write the essay\" — just \"open the document and write one sentence.\" Once you start, your brain shifts from resistance to flow. What's the task you're putting off?"
            );
        }
        // Plain substring match, so "this" also counts as a greeting.
        if mentions(&lower, &["hello", "hi", "hey"]) {
            return format!(
                "Hey {name}! I'm Patrick, your study coach. I'm here to help with study planning, focus techniques, time management, and keeping you on track. What are you working on today?"
            );
        }
        format!(
            "Hey {name}! I'd love to help with that. I'm best at study planning, focus techniques, time management, and motivation. Could you tell me a bit more about what you're working on?"
        )
    }

    fn plan(&self, _request: &ChatRequest) -> CompletionPlan {
        CompletionPlan {
            model: self.model.clone(),
            temperature: TEMPERATURE,
            capabilities: Vec::new(),
            max_output_tokens: Some(MAX_OUTPUT_TOKENS),
            continuity: Continuity::Transcript {
                window: TRANSCRIPT_WINDOW,
            },
        }
    }
}
