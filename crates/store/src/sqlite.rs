//! SQLite backend.
//!
//! One database file holds every table the pipeline touches:
//! - `users`, `onboarding_preferences`, `leaderboard_stats`, `focus_sessions`
//! - `usage_records` keyed by (user, assistant, date)
//! - `chat_messages`, the append-only transcript
//! - `continuity`, one upstream response id per user per assistant
//!
//! Timestamps are stored as RFC 3339 text, calendar dates as `YYYY-MM-DD`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use hikewise_core::error::StoreError;
use hikewise_core::{
    AssistantId, ChatMessage, ContinuityStore, ExternalProfile, FocusSession, LeaderboardStats,
    OnboardingPreferences, ProfileStore, Role, Tier, TranscriptStore, UsageIncrement, UsageKey,
    UsageRecord, UsageStore, User, UserId, UserStore,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

type StoreResult<T> = Result<T, StoreError>;

/// A production SQLite store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `url` and run migrations.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
    pub async fn new(url: &str) -> StoreResult<Self> {
        let in_memory = url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite url: {e}")))?
            .create_if_missing(true)
            .pragma("foreign_keys", "ON");
        if !in_memory {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        // Each connection to `:memory:` is its own database, so pin one.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {url}");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> StoreResult<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        let statements: [(&str, &str); 9] = [
            (
                "users table",
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id               TEXT PRIMARY KEY,
                    external_subject TEXT UNIQUE NOT NULL,
                    email            TEXT NOT NULL,
                    username         TEXT,
                    full_name        TEXT,
                    first_name       TEXT,
                    last_name        TEXT,
                    avatar_url       TEXT,
                    university       TEXT,
                    major            TEXT,
                    tier             TEXT NOT NULL DEFAULT 'free',
                    trial_ends_at    TEXT,
                    created_at       TEXT NOT NULL
                )
                "#,
            ),
            (
                "onboarding table",
                r#"
                CREATE TABLE IF NOT EXISTS onboarding_preferences (
                    user_id                TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                    is_onboarding_complete INTEGER NOT NULL DEFAULT 0,
                    focus_method           TEXT,
                    weekly_focus_goal      INTEGER,
                    university             TEXT,
                    major                  TEXT
                )
                "#,
            ),
            (
                "leaderboard table",
                r#"
                CREATE TABLE IF NOT EXISTS leaderboard_stats (
                    user_id            TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                    level              INTEGER NOT NULL DEFAULT 1,
                    total_focus_time   INTEGER NOT NULL DEFAULT 0,
                    current_streak     INTEGER NOT NULL DEFAULT 0,
                    longest_streak     INTEGER NOT NULL DEFAULT 0,
                    sessions_completed INTEGER NOT NULL DEFAULT 0
                )
                "#,
            ),
            (
                "focus sessions table",
                r#"
                CREATE TABLE IF NOT EXISTS focus_sessions (
                    id               TEXT PRIMARY KEY,
                    user_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    started_at       TEXT NOT NULL,
                    ended_at         TEXT,
                    duration_seconds INTEGER,
                    status           TEXT
                )
                "#,
            ),
            (
                "usage table",
                r#"
                CREATE TABLE IF NOT EXISTS usage_records (
                    user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    assistant       TEXT NOT NULL,
                    date            TEXT NOT NULL,
                    messages_sent   INTEGER NOT NULL DEFAULT 0,
                    tokens_used     INTEGER NOT NULL DEFAULT 0,
                    cost_estimate   REAL NOT NULL DEFAULT 0.0,
                    last_message_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, assistant, date)
                )
                "#,
            ),
            (
                "chat messages table",
                r#"
                CREATE TABLE IF NOT EXISTS chat_messages (
                    iid        INTEGER PRIMARY KEY AUTOINCREMENT,
                    id         TEXT UNIQUE NOT NULL,
                    user_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    assistant  TEXT NOT NULL,
                    role       TEXT NOT NULL,
                    content    TEXT NOT NULL,
                    metadata   TEXT NOT NULL DEFAULT '{}',
                    created_at TEXT NOT NULL
                )
                "#,
            ),
            (
                "continuity table",
                r#"
                CREATE TABLE IF NOT EXISTS continuity (
                    user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    assistant   TEXT NOT NULL,
                    response_id TEXT NOT NULL,
                    updated_at  TEXT NOT NULL,
                    PRIMARY KEY (user_id, assistant)
                )
                "#,
            ),
            (
                "focus sessions index",
                "CREATE INDEX IF NOT EXISTS idx_focus_sessions_user ON focus_sessions(user_id, started_at DESC)",
            ),
            (
                "chat messages index",
                "CREATE INDEX IF NOT EXISTS idx_chat_messages_thread ON chat_messages(user_id, assistant, iid DESC)",
            ),
        ];

        for (what, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{what}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    async fn user_where(&self, column: &str, value: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT * FROM users WHERE {column} = ?1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("user lookup: {e}")))?;
        row.as_ref().map(row_to_user).transpose()
    }
}

fn col<'r, T>(row: &'r SqliteRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn parse_ts(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidRecord(format!("timestamp '{raw}': {e}")))
}

fn parse_opt_ts(raw: Option<String>) -> StoreResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_ts).transpose()
}

fn parse_assistant(raw: &str) -> StoreResult<AssistantId> {
    AssistantId::parse(raw).ok_or_else(|| StoreError::InvalidRecord(format!("assistant '{raw}'")))
}

fn non_negative(v: i64) -> u64 {
    u64::try_from(v).unwrap_or(0)
}

fn small(v: i64) -> u32 {
    u32::try_from(v).unwrap_or(0)
}

fn row_to_user(row: &SqliteRow) -> StoreResult<User> {
    let tier: String = col(row, "tier")?;
    let created_at: String = col(row, "created_at")?;
    Ok(User {
        id: UserId(col(row, "id")?),
        external_subject: col(row, "external_subject")?,
        email: col(row, "email")?,
        username: col(row, "username")?,
        full_name: col(row, "full_name")?,
        first_name: col(row, "first_name")?,
        last_name: col(row, "last_name")?,
        avatar_url: col(row, "avatar_url")?,
        university: col(row, "university")?,
        major: col(row, "major")?,
        tier: Tier::parse(&tier),
        trial_ends_at: parse_opt_ts(col(row, "trial_ends_at")?)?,
        created_at: parse_ts(&created_at)?,
    })
}

fn row_to_usage(row: &SqliteRow) -> StoreResult<UsageRecord> {
    let assistant: String = col(row, "assistant")?;
    let date: String = col(row, "date")?;
    let last: String = col(row, "last_message_at")?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|e| StoreError::InvalidRecord(format!("date '{date}': {e}")))?;
    Ok(UsageRecord {
        key: UsageKey::new(
            UserId(col(row, "user_id")?),
            parse_assistant(&assistant)?,
            date,
        ),
        messages_sent: small(col(row, "messages_sent")?),
        tokens_used: non_negative(col(row, "tokens_used")?),
        cost_estimate: col(row, "cost_estimate")?,
        last_message_at: parse_ts(&last)?,
    })
}

fn row_to_message(row: &SqliteRow) -> StoreResult<ChatMessage> {
    let assistant: String = col(row, "assistant")?;
    let role: String = col(row, "role")?;
    let metadata: String = col(row, "metadata")?;
    let created_at: String = col(row, "created_at")?;
    Ok(ChatMessage {
        id: col(row, "id")?,
        user_id: UserId(col(row, "user_id")?),
        assistant: parse_assistant(&assistant)?,
        role: Role::parse(&role)
            .ok_or_else(|| StoreError::InvalidRecord(format!("role '{role}'")))?,
        content: col(row, "content")?,
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        created_at: parse_ts(&created_at)?,
    })
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn user_by_subject(&self, subject: &str) -> StoreResult<Option<User>> {
        self.user_where("external_subject", subject).await
    }

    async fn user_by_id(&self, id: &UserId) -> StoreResult<Option<User>> {
        self.user_where("id", id.as_str()).await
    }

    async fn create_user(&self, profile: &ExternalProfile) -> StoreResult<User> {
        if let Some(existing) = self.user_by_subject(&profile.subject).await? {
            return Ok(existing);
        }
        let email = profile
            .email
            .as_deref()
            .ok_or_else(|| StoreError::InvalidRecord("email is required".into()))?;

        let id = UserId::new();
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("begin: {e}")))?;

        // A concurrent create for the same subject is absorbed by the UNIQUE
        // constraint; the re-read below returns whichever row won.
        sqlx::query(
            r#"
            INSERT INTO users (id, external_subject, email, username, full_name, first_name,
                               last_name, avatar_url, tier, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'trial', ?9)
            ON CONFLICT(external_subject) DO NOTHING
            "#,
        )
        .bind(id.as_str())
        .bind(&profile.subject)
        .bind(email)
        .bind(&profile.username)
        .bind(&profile.full_name)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.avatar_url)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT user failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO onboarding_preferences (user_id, is_onboarding_complete)
            SELECT id, 0 FROM users WHERE external_subject = ?1
            "#,
        )
        .bind(&profile.subject)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT onboarding failed: {e}")))?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO leaderboard_stats (user_id, level)
            SELECT id, 1 FROM users WHERE external_subject = ?1
            "#,
        )
        .bind(&profile.subject)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT leaderboard failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit: {e}")))?;

        self.user_by_subject(&profile.subject)
            .await?
            .ok_or_else(|| StoreError::NotFound(profile.subject.clone()))
    }

    async fn update_user(&self, profile: &ExternalProfile) -> StoreResult<Option<User>> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                email      = COALESCE(?2, email),
                username   = COALESCE(?3, username),
                full_name  = COALESCE(?4, full_name),
                first_name = COALESCE(?5, first_name),
                last_name  = COALESCE(?6, last_name),
                avatar_url = COALESCE(?7, avatar_url)
            WHERE external_subject = ?1
            "#,
        )
        .bind(&profile.subject)
        .bind(&profile.email)
        .bind(&profile.username)
        .bind(&profile.full_name)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.avatar_url)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE user failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.user_by_subject(&profile.subject).await
    }

    async fn delete_user(&self, subject: &str) -> StoreResult<bool> {
        let Some(user) = self.user_by_subject(subject).await? else {
            return Ok(false);
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("begin: {e}")))?;

        for table in [
            "onboarding_preferences",
            "leaderboard_stats",
            "focus_sessions",
            "usage_records",
            "chat_messages",
            "continuity",
            "users",
        ] {
            let key = if table == "users" { "id" } else { "user_id" };
            sqlx::query(&format!("DELETE FROM {table} WHERE {key} = ?1"))
                .bind(user.id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Storage(format!("DELETE from {table} failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit: {e}")))?;
        Ok(true)
    }

    async fn set_tier(&self, subject: &str, tier: Tier) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE users SET tier = ?2 WHERE external_subject = ?1")
            .bind(subject)
            .bind(tier.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE tier failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn onboarding(&self, user: &UserId) -> StoreResult<Option<OnboardingPreferences>> {
        let row = sqlx::query("SELECT * FROM onboarding_preferences WHERE user_id = ?1")
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("onboarding: {e}")))?;

        row.map(|row| -> StoreResult<OnboardingPreferences> {
            let goal: Option<i64> = col(&row, "weekly_focus_goal")?;
            Ok(OnboardingPreferences {
                user_id: user.clone(),
                is_onboarding_complete: col(&row, "is_onboarding_complete")?,
                focus_method: col(&row, "focus_method")?,
                weekly_focus_goal: goal.map(small),
                university: col(&row, "university")?,
                major: col(&row, "major")?,
            })
        })
        .transpose()
    }

    async fn leaderboard(&self, user: &UserId) -> StoreResult<Option<LeaderboardStats>> {
        let row = sqlx::query("SELECT * FROM leaderboard_stats WHERE user_id = ?1")
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("leaderboard: {e}")))?;

        row.map(|row| -> StoreResult<LeaderboardStats> {
            Ok(LeaderboardStats {
                user_id: user.clone(),
                level: small(col(&row, "level")?),
                total_focus_time: non_negative(col(&row, "total_focus_time")?),
                current_streak: small(col(&row, "current_streak")?),
                longest_streak: small(col(&row, "longest_streak")?),
                sessions_completed: small(col(&row, "sessions_completed")?),
            })
        })
        .transpose()
    }

    async fn recent_focus_sessions(
        &self,
        user: &UserId,
        limit: usize,
    ) -> StoreResult<Vec<FocusSession>> {
        let rows = sqlx::query(
            "SELECT * FROM focus_sessions WHERE user_id = ?1 ORDER BY started_at DESC LIMIT ?2",
        )
        .bind(user.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("focus sessions: {e}")))?;

        rows.iter()
            .map(|row| -> StoreResult<FocusSession> {
                let started: String = col(row, "started_at")?;
                let duration: Option<i64> = col(row, "duration_seconds")?;
                Ok(FocusSession {
                    id: col(row, "id")?,
                    user_id: user.clone(),
                    started_at: parse_ts(&started)?,
                    ended_at: parse_opt_ts(col(row, "ended_at")?)?,
                    duration_seconds: duration.map(non_negative),
                    status: col(row, "status")?,
                })
            })
            .collect()
    }

    async fn save_onboarding(&self, prefs: &OnboardingPreferences) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO onboarding_preferences
                (user_id, is_onboarding_complete, focus_method, weekly_focus_goal, university, major)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id) DO UPDATE SET
                is_onboarding_complete = excluded.is_onboarding_complete,
                focus_method = excluded.focus_method,
                weekly_focus_goal = excluded.weekly_focus_goal,
                university = excluded.university,
                major = excluded.major
            "#,
        )
        .bind(prefs.user_id.as_str())
        .bind(prefs.is_onboarding_complete)
        .bind(&prefs.focus_method)
        .bind(prefs.weekly_focus_goal.map(i64::from))
        .bind(&prefs.university)
        .bind(&prefs.major)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPSERT onboarding failed: {e}")))?;
        Ok(())
    }

    async fn save_leaderboard(&self, stats: &LeaderboardStats) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO leaderboard_stats
                (user_id, level, total_focus_time, current_streak, longest_streak, sessions_completed)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id) DO UPDATE SET
                level = excluded.level,
                total_focus_time = excluded.total_focus_time,
                current_streak = excluded.current_streak,
                longest_streak = excluded.longest_streak,
                sessions_completed = excluded.sessions_completed
            "#,
        )
        .bind(stats.user_id.as_str())
        .bind(i64::from(stats.level))
        .bind(i64::try_from(stats.total_focus_time).unwrap_or(i64::MAX))
        .bind(i64::from(stats.current_streak))
        .bind(i64::from(stats.longest_streak))
        .bind(i64::from(stats.sessions_completed))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPSERT leaderboard failed: {e}")))?;
        Ok(())
    }

    async fn add_focus_session(&self, session: &FocusSession) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO focus_sessions (id, user_id, started_at, ended_at, duration_seconds, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&session.id)
        .bind(session.user_id.as_str())
        .bind(session.started_at.to_rfc3339())
        .bind(session.ended_at.map(|t| t.to_rfc3339()))
        .bind(
            session
                .duration_seconds
                .map(|d| i64::try_from(d).unwrap_or(i64::MAX)),
        )
        .bind(&session.status)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT focus session failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl UsageStore for SqliteStore {
    async fn usage(&self, key: &UsageKey) -> StoreResult<Option<UsageRecord>> {
        let row = sqlx::query(
            "SELECT * FROM usage_records WHERE user_id = ?1 AND assistant = ?2 AND date = ?3",
        )
        .bind(key.user_id.as_str())
        .bind(key.assistant.as_str())
        .bind(date_key(key.date))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("usage: {e}")))?;
        row.as_ref().map(row_to_usage).transpose()
    }

    async fn record_usage(
        &self,
        key: &UsageKey,
        inc: UsageIncrement,
        at: DateTime<Utc>,
    ) -> StoreResult<UsageRecord> {
        sqlx::query(
            r#"
            INSERT INTO usage_records
                (user_id, assistant, date, messages_sent, tokens_used, cost_estimate, last_message_at)
            VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6)
            ON CONFLICT(user_id, assistant, date) DO UPDATE SET
                messages_sent = messages_sent + 1,
                tokens_used = tokens_used + excluded.tokens_used,
                cost_estimate = cost_estimate + excluded.cost_estimate,
                last_message_at = excluded.last_message_at
            "#,
        )
        .bind(key.user_id.as_str())
        .bind(key.assistant.as_str())
        .bind(date_key(key.date))
        .bind(i64::try_from(inc.tokens).unwrap_or(i64::MAX))
        .bind(inc.cost)
        .bind(at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPSERT usage failed: {e}")))?;

        self.usage(key)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("usage for {}", key.user_id)))
    }

    async fn usage_history(&self, user: &UserId) -> StoreResult<Vec<UsageRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM usage_records WHERE user_id = ?1 ORDER BY date DESC, assistant ASC",
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("usage history: {e}")))?;
        rows.iter().map(row_to_usage).collect()
    }
}

#[async_trait]
impl TranscriptStore for SqliteStore {
    async fn append_message(&self, message: &ChatMessage) -> StoreResult<()> {
        let metadata = serde_json::to_string(&message.metadata)
            .map_err(|e| StoreError::Storage(format!("metadata serialization: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, user_id, assistant, role, content, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&message.id)
        .bind(message.user_id.as_str())
        .bind(message.assistant.as_str())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(&metadata)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT message failed: {e}")))?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        user: &UserId,
        assistant: AssistantId,
        limit: usize,
    ) -> StoreResult<Vec<ChatMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM (
                SELECT * FROM chat_messages
                WHERE user_id = ?1 AND assistant = ?2
                ORDER BY iid DESC
                LIMIT ?3
            ) ORDER BY iid ASC
            "#,
        )
        .bind(user.as_str())
        .bind(assistant.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("recent messages: {e}")))?;
        rows.iter().map(row_to_message).collect()
    }
}

#[async_trait]
impl ContinuityStore for SqliteStore {
    async fn last_response_id(
        &self,
        user: &UserId,
        assistant: AssistantId,
    ) -> StoreResult<Option<String>> {
        let row = sqlx::query(
            "SELECT response_id FROM continuity WHERE user_id = ?1 AND assistant = ?2",
        )
        .bind(user.as_str())
        .bind(assistant.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("continuity: {e}")))?;
        row.map(|r| col(&r, "response_id")).transpose()
    }

    async fn save_response_id(
        &self,
        user: &UserId,
        assistant: AssistantId,
        response_id: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO continuity (user_id, assistant, response_id, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, assistant) DO UPDATE SET
                response_id = excluded.response_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user.as_str())
        .bind(assistant.as_str())
        .bind(response_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPSERT continuity failed: {e}")))?;
        Ok(())
    }
}
