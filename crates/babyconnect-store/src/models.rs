//! Record types stored under the collection keys.
//!
//! Field names serialize as camelCase so that stores and backup files
//! written by earlier releases stay readable. Optional or later-added fields
//! carry `#[serde(default)]` so an old record never fails to parse just
//! because it predates a field.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
//  Config
// ═══════════════════════════════════════════════════════════════════════

/// Operator-editable application configuration (singleton).
///
/// `#[serde(default)]` on the container means a stored config that lacks a
/// newly introduced field is filled from [`AppConfig::default`] on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub app_name: String,
    pub logo_url: String,
    pub banner_url: String,
    pub footer_text: String,
    pub social_link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_group_link: Option<String>,
    /// System prompt handed to the AI collaborator.
    pub doula_system_instruction: String,
    /// AI credential entered by the operator; takes precedence over env vars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════
//  Catalogs
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductCategory {
    Amamentacao,
    Enxoval,
    Essenciais,
    Mae,
    Bebe,
    Comunidade,
    #[serde(other)]
    Other,
}

/// Operator-owned catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default)]
    pub image: String,
    pub category: ProductCategory,
    /// External purchase link.
    #[serde(default)]
    pub shopee_link: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// User-listed product. The owner fields are fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceProduct {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub image: String,
    pub owner_id: String,
    #[serde(default)]
    pub owner_name: String,
    /// Contact number (WhatsApp).
    #[serde(default)]
    pub owner_phone: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecklistCategory {
    Mae,
    Bebe,
    Acompanhante,
    Documentos,
    #[serde(other)]
    Other,
}

/// Checklist definition. Progress lives in [`UserSettings::checklist_progress`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistItem {
    pub id: String,
    pub name: String,
    pub category: ChecklistCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shopee_link: Option<String>,
    #[serde(default)]
    pub checked: bool,
}

/// Per-week content, indexed by `week` (1..=42).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekInfo {
    pub week: u8,
    #[serde(default)]
    pub baby_size: String,
    #[serde(default)]
    pub development: String,
    #[serde(default)]
    pub body_changes: String,
    #[serde(default)]
    pub symptoms: String,
    #[serde(default)]
    pub tips: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_product_id: Option<String>,
    #[serde(default)]
    pub weekly_checklist: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════
//  User settings
// ═══════════════════════════════════════════════════════════════════════

/// A favourited baby name with its AI-provided meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameMeaning {
    pub name: String,
    #[serde(default)]
    pub meaning: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Tired,
    Anxious,
    Excited,
    Sick,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    pub week: u32,
    /// ISO-8601 timestamp.
    pub date: String,
    pub content: String,
    pub mood: Mood,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KickSession {
    pub id: String,
    /// ISO-8601 timestamp.
    pub date: String,
    pub duration_seconds: u64,
    pub count: u32,
}

/// A contraction; `end_time` is `None` while it is in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contraction {
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub start_time: i64,
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    /// Seconds since the previous contraction started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<i64>,
}

/// Aggregate root for all personal progress on this device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    /// `YYYY-MM-DD`, kept as entered.
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub name_favorites: Vec<NameMeaning>,
    /// Ids of checked checklist items.
    #[serde(default)]
    pub checklist_progress: Vec<String>,
    /// `"<week>-<taskIndex>"` keys of completed weekly tasks.
    #[serde(default)]
    pub weekly_tasks_completed: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_phone: Option<String>,

    #[serde(default)]
    pub journal_entries: Vec<JournalEntry>,
    #[serde(default)]
    pub kick_sessions: Vec<KickSession>,
    #[serde(default)]
    pub contractions: Vec<Contraction>,
}

impl UserSettings {
    /// Parsed due date, if one is set and well formed.
    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Accounts, sessions, quota
// ═══════════════════════════════════════════════════════════════════════

/// Local credential record (used when no remote backend is configured).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

/// Time-bounded proof of authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub username: String,
    pub token: String,
    /// Milliseconds since the Unix epoch.
    pub expires_at: i64,
}

impl AuthSession {
    /// Valid iff `now < expires_at`.
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        now_millis < self.expires_at
    }
}

/// Daily AI call counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiUsage {
    /// Calendar day the count belongs to (`YYYY-MM-DD`; older records use
    /// `Sun Oct 18 2026`).
    pub date: String,
    pub count: u32,
}

// ═══════════════════════════════════════════════════════════════════════
//  Social
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author_name: String,
    pub text: String,
    pub timestamp: i64,
    #[serde(default)]
    pub is_dev: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub author_name: String,
    /// Gestational week at time of posting, 0 when unknown.
    #[serde(default)]
    pub author_week: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_photo: Option<String>,
    /// Identity allowed to delete this post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub liked_by_me: bool,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub timestamp: i64,
}

fn default_true() -> bool {
    true
}
