//! Logical collection keys.
//!
//! Every record lives under one of these fixed keys. All of them share the
//! [`KEY_PREFIX`] namespace, which is what backup restore uses to decide
//! which properties of an imported file it is allowed to write.

/// Reserved namespace prefix for every key this application owns.
pub const KEY_PREFIX: &str = "bc_";

pub const CONFIG: &str = "bc_config";
pub const PRODUCTS: &str = "bc_products";
pub const MARKETPLACE: &str = "bc_marketplace";
pub const CHECKLIST_DEF: &str = "bc_checklist_def";
pub const WEEKS: &str = "bc_weeks";
pub const USER_SETTINGS: &str = "bc_user_settings";
pub const USERS: &str = "bc_users";
pub const AUTH_SESSION: &str = "bc_auth_session";
pub const AI_USAGE: &str = "bc_ai_daily_usage";
pub const POSTS: &str = "bc_posts";
pub const DATA_VERSION: &str = "bc_data_version";

/// Every key the application knows about, in backup order.
pub const ALL: &[&str] = &[
    CONFIG,
    PRODUCTS,
    MARKETPLACE,
    CHECKLIST_DEF,
    WEEKS,
    USER_SETTINGS,
    USERS,
    AUTH_SESSION,
    AI_USAGE,
    POSTS,
    DATA_VERSION,
];

/// Whether `key` belongs to the application's namespace.
pub fn is_namespaced(key: &str) -> bool {
    key.starts_with(KEY_PREFIX) && key.len() > KEY_PREFIX.len()
}
