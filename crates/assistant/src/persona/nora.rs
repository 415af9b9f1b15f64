//! Nora: the research-capable study companion.
//!
//! Runs on the Responses endpoint with server-side tools and chains turns
//! through the stored response id.

use hikewise_core::{AssistantId, Capability, ContextSnapshot, Tier};
use hikewise_security::TooLong;

use super::{
    CompletionPlan, Continuity, DEFAULT_FOCUS_METHOD, DEFAULT_WEEKLY_GOAL, Persona, greeting_name,
    mentions,
};
use crate::entitlement::{Denial, TierPolicy};
use crate::request::{ChatRequest, ThinkingMode};
use crate::response::ReplyContext;

pub const DEFAULT_FAST_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_DEEP_MODEL: &str = "gpt-4o";

const FAST_TEMPERATURE: f32 = 0.7;
const DEEP_TEMPERATURE: f32 = 0.8;
const SESSION_WINDOW: usize = 10;

#[derive(Debug, Clone)]
pub struct NoraPersona {
    fast_model: String,
    deep_model: String,
}

impl Default for NoraPersona {
    fn default() -> Self {
        Self {
            fast_model: DEFAULT_FAST_MODEL.into(),
            deep_model: DEFAULT_DEEP_MODEL.into(),
        }
    }
}

impl NoraPersona {
    pub fn with_models(fast: Option<&str>, deep: Option<&str>) -> Self {
        let defaults = Self::default();
        Self {
            fast_model: fast.map(String::from).unwrap_or(defaults.fast_model),
            deep_model: deep.map(String::from).unwrap_or(defaults.deep_model),
        }
    }
}

fn stats_line(ctx: &ContextSnapshot) -> String {
    let Some(lb) = &ctx.leaderboard else {
        return String::new();
    };
    format!(
        "\n**Current Stats:** Level {}, {}h total focus time, {}-day streak (longest: {})",
        ctx.level(),
        lb.total_focus_hours(),
        lb.current_streak,
        lb.longest_streak
    )
}

fn activity_line(ctx: &ContextSnapshot) -> String {
    if ctx.recent_sessions.is_empty() {
        return String::new();
    }
    format!(
        "\n**Recent Activity:** {} sessions, {} min total",
        ctx.recent_sessions.len(),
        ctx.recent_focus_minutes()
    )
}

impl Persona for NoraPersona {
    fn id(&self) -> AssistantId {
        AssistantId::Nora
    }

    fn policy(&self, tier: Tier) -> TierPolicy {
        match tier {
            Tier::Trial => TierPolicy::enabled(10, 2000),
            Tier::Pro => TierPolicy::enabled(100, 5000),
            Tier::Free | Tier::Premium | Tier::Unknown => TierPolicy::disabled(500),
        }
    }

    fn denial_reason(&self, tier: Tier, denial: Denial, policy: &TierPolicy) -> String {
        match denial {
            Denial::TierIneligible if tier == Tier::Premium => "Nora AI is a Pro-exclusive feature. You're already on Premium — upgrade to Pro to unlock web research, document analysis, and advanced study support!".into(),
            Denial::TierIneligible => "Nora AI is available for Pro members. Upgrade to Pro to unlock web research, document analysis, and advanced study support!".into(),
            Denial::QuotaExhausted => {
                let next = if tier == Tier::Trial {
                    "Upgrade to Pro for 100 messages per day!"
                } else {
                    "Come back tomorrow!"
                };
                format!(
                    "You've reached your daily Nora message limit ({}). {next}",
                    policy.messages_per_day
                )
            }
        }
    }

    fn too_long_reply(&self, too_long: &TooLong) -> String {
        format!(
            "Message too long. Max {} chars for your plan. Current: {}.",
            too_long.max, too_long.current
        )
    }

    fn too_long_upgrade(&self, tier: Tier) -> bool {
        tier != Tier::Pro
    }

    fn session_window(&self) -> usize {
        SESSION_WINDOW
    }

    fn instructions(&self, ctx: &ContextSnapshot, request: &ChatRequest) -> String {
        let name = greeting_name(ctx);
        let method = ctx.focus_method().unwrap_or(DEFAULT_FOCUS_METHOD);
        let goal = ctx.weekly_focus_goal().unwrap_or(DEFAULT_WEEKLY_GOAL);
        let university = ctx.university().unwrap_or("your university");
        let major = ctx.major().unwrap_or("your studies");
        let stats = stats_line(ctx);
        let activity = activity_line(ctx);

        let mut instructions = format!(
            r#"You are Nora, an advanced AI study companion inside HikeWise — the academic success platform. You have deep knowledge of each student's academic journey and provide personalized, actionable study support.

**Student Profile:**
- Name: {name}
- Study Method: {method}
- Weekly Focus Goal: {goal} hours
- University: {university}
- Major: {major}{stats}{activity}

**Your Capabilities (use these tools when relevant):**
1. **Web Search** — Search the internet for current information, research papers, study resources, facts, and up-to-date data. Use this proactively when the student asks about topics that benefit from current information.
2. **File Search** — When the student has uploaded PDFs or documents, search through the ENTIRE document to find specific information, generate study questions, create summaries, and extract key concepts. Always use file_search when a document is attached.
3. **Code Interpreter** — Run Python code to solve math problems, create charts, analyze data, or work through science/engineering calculations step-by-step. Use this for any STEM homework that involves computation.

**Core Responsibilities:**
- Study planning: craft schedules, break down assignments, plan revision cycles
- Focus enhancement: concentration techniques tuned to their {method} method
- Content mastery: explain concepts, design active-recall prompts, generate quizzes
- Document analysis: summarize PDFs, build study guides, extract key arguments, create question banks
- Academic writing: thesis creation, outline building, evidence integration, revision
- Motivation: encouragement, progress reflections, accountability

**Communication Style:**
- Warm, encouraging, practical, and specific — like an elite academic coach
- Match the student's energy (brief questions get concise answers; detailed questions get comprehensive responses)
- When users say "make it shorter", "explain more", "simplify" — apply the transformation to your previous response
- Track conversation topics and acknowledge subject changes naturally
- Reference their {goal}-hour weekly goal when discussing planning

**When documents are attached:**
- ALWAYS use file_search to scan the document thoroughly
- Quote retrieved snippets and cite sections (e.g., "[Chapter 3, p.12]")
- If the document doesn't contain the answer, say so clearly
- Never fabricate citations

**Safety:**
- Follow OpenAI safety policies and academic integrity guidelines
- Provide guidance and scaffolding rather than complete graded work solutions
- Refuse requests that constitute cheating"#
        );

        if let Some(doc) = &request.document {
            instructions.push_str(&format!(
                "\n\n**Active Document:** \"{}\"\nWhen the student asks about this document, use file_search to retrieve specific information from it.",
                doc.title
            ));
        }

        instructions
    }

    fn fallback(&self, input: &str, ctx: &ContextSnapshot, request: &ChatRequest) -> String {
        let name = greeting_name(ctx);
        let method = ctx.focus_method().unwrap_or(DEFAULT_FOCUS_METHOD);
        let goal = ctx.weekly_focus_goal().unwrap_or(DEFAULT_WEEKLY_GOAL);
        let lower = input.to_lowercase();

        if let Some(doc) = &request.document {
            return format!(
                "I see you're working with \"{}\". I can help you create study plans, practice questions, or explain concepts from this material. What would you like to focus on?",
                doc.title
            );
        }
        if mentions(&lower, &["focus", "concentrate"]) {
            return format!(
                "Great question about focus, {name}! With your {method} style, I recommend structured sessions. Your {goal}-hour weekly goal breaks down to manageable daily blocks. What specific focus challenge are you facing?"
            );
        }
        if mentions(&lower, &["plan", "schedule"]) {
            return format!(
                "Let's build a plan, {name}! With your {goal}-hour weekly goal and {method} approach, we can create an effective schedule. What subjects are you working on?"
            );
        }
        if mentions(&lower, &["motivation", "procrastination"]) {
            return format!(
                "I understand the struggle, {name}. Try the 15-Minute Rule: commit to just 15 minutes right now. Progress beats perfection! What task are you putting off?"
            );
        }
        format!(
            "Hello {name}! I'm Nora, your AI study companion. I can help with study planning, focus techniques, content mastery, document analysis, web research, and homework. What would you like to work on today?"
        )
    }

    fn plan(&self, request: &ChatRequest) -> CompletionPlan {
        let deep = request.thinking_mode == ThinkingMode::Deep;

        let mut capabilities = vec![Capability::WebSearch];
        if let Some(id) = request.vector_store() {
            capabilities.push(Capability::FileSearch {
                vector_store_ids: vec![id.to_string()],
            });
        }
        if deep {
            capabilities.push(Capability::CodeInterpreter);
        }

        let model = if deep {
            self.deep_model.clone()
        } else {
            self.fast_model.clone()
        };

        CompletionPlan {
            model,
            temperature: if deep { DEEP_TEMPERATURE } else { FAST_TEMPERATURE },
            capabilities,
            max_output_tokens: None,
            continuity: Continuity::ResponseChain,
        }
    }

    fn reply_context(&self, ctx: &ContextSnapshot, request: &ChatRequest) -> Option<ReplyContext> {
        Some(ReplyContext {
            pdf_active: request.document.is_some(),
            focus_method: ctx.focus_method().map(String::from),
            user_level: ctx.level(),
        })
    }
}
