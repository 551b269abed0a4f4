//! The remote backend seam.
//!
//! [`RemoteBackend`] is what the coordinator needs from a hosted backend:
//! the shared social collections, image uploads for posts, a generic upsert
//! for mirroring private records, and the backend's own account/session
//! endpoints.
//! [`RestBackend`](crate::rest::RestBackend) is the HTTP implementation;
//! tests substitute an in-memory one.

use async_trait::async_trait;
use babyconnect_store::models::{Comment, Post};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncResult;

/// Session issued by the remote backend's auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSession {
    pub access_token: String,
    /// Backend user id; used as the owner identity of shared records.
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Display name chosen at sign-up.
    #[serde(default)]
    pub username: Option<String>,
}

/// Operations the coordinator performs against the hosted backend.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// All posts, newest first. `viewer` decides `liked_by_me`.
    async fn fetch_posts(&self, viewer: Option<&str>) -> SyncResult<Vec<Post>>;

    /// Store a new post. Returns it as stored (the backend may assign the id).
    async fn insert_post(&self, post: &Post) -> SyncResult<Post>;

    /// Delete post `id` if it is owned by `owner_id`. Returns `false` when
    /// nothing matched.
    async fn delete_post(&self, id: &str, owner_id: &str) -> SyncResult<bool>;

    /// Record or withdraw `user_id`'s like on a post.
    async fn set_like(&self, post_id: &str, user_id: &str, liked: bool) -> SyncResult<()>;

    async fn add_comment(&self, post_id: &str, comment: &Comment) -> SyncResult<()>;

    /// Store image bytes under `path` in the public image bucket and return
    /// the public URL. `None` when the backend refused the upload.
    async fn upload_image(&self, path: &str, bytes: Vec<u8>) -> SyncResult<Option<String>>;

    /// Insert or replace a row in `collection`, keyed by its `id` field.
    async fn upsert_record(&self, collection: &str, value: &Value) -> SyncResult<()>;

    /// Create an account. `None` when the backend requires confirmation
    /// before a session is issued.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> SyncResult<Option<RemoteSession>>;

    async fn sign_in(&self, email: &str, password: &str) -> SyncResult<RemoteSession>;

    async fn sign_out(&self, session: &RemoteSession) -> SyncResult<()>;

    /// Authenticate subsequent calls with a session obtained earlier, e.g.
    /// one persisted by a previous process.
    fn resume(&self, _session: &RemoteSession) {}
}
