//! Write-through coordination between the record store and the remote.
//!
//! The mode is decided once, at construction:
//!
//! - **Local-only**: everything, shared posts included, lives in the record
//!   store.
//! - **Hybrid**: device-private collections are written locally first and
//!   then mirrored in the background; a failed mirror is logged and
//!   dropped. Shared posts are read and written *only* through the remote,
//!   so a failed read yields an empty feed rather than stale local data.
//!
//! Concurrent edits are not merged: the last write the remote observes
//! wins.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use babyconnect_store::models::{
    AppConfig, ChecklistItem, Comment, Post, Product, UserSettings, WeekInfo,
};
use babyconnect_store::{CatalogStore, Clock, RecordStore, keys};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::{RemoteConfig, SyncPolicy};
use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteBackend, RemoteSession};
use crate::rest::RestBackend;

/// Remote tables private collections are mirrored into.
pub mod tables {
    pub const USER_SETTINGS: &str = "user_settings";
    pub const CONFIG: &str = "app_config";
    pub const PRODUCTS: &str = "products";
    pub const WEEKS: &str = "weeks";
    pub const CHECKLIST: &str = "checklist_items";
    pub const PROFILES: &str = "profiles";
}

/// Where shared collections are served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    LocalOnly,
    Hybrid,
}

/// Author-supplied part of a new post.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostDraft {
    pub author_name: String,
    /// Gestational week, 0 when unknown.
    pub author_week: u32,
    pub author_photo: Option<String>,
    pub content: String,
    pub image: Option<String>,
}

/// Routes reads and writes between the record store and the remote backend.
pub struct SyncCoordinator {
    store: RecordStore,
    catalog: CatalogStore,
    clock: Arc<dyn Clock>,
    remote: Option<Arc<dyn RemoteBackend>>,
    policy: SyncPolicy,
    session: RwLock<Option<RemoteSession>>,
    mirrors: Mutex<JoinSet<()>>,
}

impl SyncCoordinator {
    /// Coordinator that never talks to a remote.
    pub fn local_only(store: RecordStore, clock: Arc<dyn Clock>) -> Self {
        Self::build(store, clock, None, SyncPolicy::default())
    }

    /// Hybrid coordinator over an explicit backend.
    pub fn with_backend(
        store: RecordStore,
        clock: Arc<dyn Clock>,
        backend: Arc<dyn RemoteBackend>,
        policy: SyncPolicy,
    ) -> Self {
        Self::build(store, clock, Some(backend), policy)
    }

    /// Hybrid over [`RestBackend`] when `config` holds real credentials,
    /// local-only otherwise.
    pub fn from_config(
        store: RecordStore,
        clock: Arc<dyn Clock>,
        config: &RemoteConfig,
        policy: SyncPolicy,
    ) -> SyncResult<Self> {
        if !config.is_configured() {
            info!("remote backend not configured, running local-only");
            return Ok(Self::local_only(store, clock));
        }
        let backend = RestBackend::new(config)?;
        info!(url = %config.url, "remote backend configured, running hybrid");
        Ok(Self::with_backend(store, clock, Arc::new(backend), policy))
    }

    fn build(
        store: RecordStore,
        clock: Arc<dyn Clock>,
        remote: Option<Arc<dyn RemoteBackend>>,
        policy: SyncPolicy,
    ) -> Self {
        Self {
            catalog: CatalogStore::new(store.clone()),
            store,
            clock,
            remote,
            policy,
            session: RwLock::new(None),
            mirrors: Mutex::new(JoinSet::new()),
        }
    }

    pub fn mode(&self) -> SyncMode {
        if self.remote.is_some() {
            SyncMode::Hybrid
        } else {
            SyncMode::LocalOnly
        }
    }

    // ── device-private collections ───────────────────────────────────

    pub fn save_settings(&self, settings: &UserSettings) -> SyncResult<()> {
        self.store.write(keys::USER_SETTINGS, settings)?;
        match self.remote_session() {
            Some(session) => self.mirror(
                tables::USER_SETTINGS,
                json!({ "id": session.user_id, "data": settings }),
            ),
            None => debug!("no remote session, settings kept local"),
        }
        Ok(())
    }

    pub fn save_config(&self, config: &AppConfig) -> SyncResult<()> {
        self.catalog.save_config(config)?;
        // The AI credential never leaves the device.
        let shared = AppConfig {
            api_key: None,
            ..config.clone()
        };
        self.mirror(tables::CONFIG, json!({ "id": "singleton", "data": shared }));
        Ok(())
    }

    pub fn save_products(&self, products: &[Product]) -> SyncResult<()> {
        self.catalog.save_products(products)?;
        self.mirror_rows(tables::PRODUCTS, products);
        Ok(())
    }

    pub fn save_weeks(&self, weeks: &[WeekInfo]) -> SyncResult<()> {
        self.catalog.save_weeks(weeks)?;
        self.mirror_rows(tables::WEEKS, weeks);
        Ok(())
    }

    pub fn save_checklist(&self, items: &[ChecklistItem]) -> SyncResult<()> {
        self.catalog.save_checklist_definitions(items)?;
        self.mirror_rows(tables::CHECKLIST, items);
        Ok(())
    }

    fn mirror_rows<T: Serialize>(&self, collection: &'static str, rows: &[T]) {
        match serde_json::to_value(rows) {
            Ok(value) => self.mirror(collection, value),
            Err(e) => warn!(collection, error = %e, "could not serialize rows for mirroring"),
        }
    }

    /// Push `payload` to the remote in the background. Failures are logged
    /// and dropped; the local copy is already written.
    fn mirror(&self, collection: &'static str, payload: Value) {
        let Some(remote) = &self.remote else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(collection, "no async runtime, skipping remote mirror");
            return;
        };
        let remote = Arc::clone(remote);
        let policy = self.policy;
        let mut mirrors = self.mirrors();
        reap_finished(&mut mirrors);
        mirrors.spawn_on(
            async move {
                let result = bounded(
                    policy,
                    "upsert_record",
                    remote.upsert_record(collection, &payload),
                )
                .await;
                match result {
                    Ok(()) => debug!(collection, "mirrored to remote"),
                    Err(e) => warn!(
                        collection,
                        error = %e,
                        "background mirror failed, local copy kept"
                    ),
                }
            },
            &handle,
        );
    }

    /// Wait for every background mirror started so far. Returns how many
    /// finished.
    pub async fn flush(&self) -> usize {
        let mut pending = std::mem::take(&mut *self.mirrors());
        let mut finished = 0;
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "mirror task aborted");
            }
            finished += 1;
        }
        finished
    }

    fn mirrors(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.mirrors.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Background mirrors not yet collected.
    pub fn pending_mirrors(&self) -> usize {
        self.mirrors().len()
    }

    // ── shared posts ─────────────────────────────────────────────────

    /// The feed, newest first. In hybrid mode a remote failure yields an
    /// empty list.
    pub async fn list_posts(&self) -> Vec<Post> {
        let Some(remote) = &self.remote else {
            return self.store.read(keys::POSTS, Vec::new);
        };
        let viewer = self.remote_session().map(|s| s.user_id);
        match bounded(self.policy, "fetch_posts", remote.fetch_posts(viewer.as_deref())).await {
            Ok(posts) => posts,
            Err(e) => {
                warn!(error = %e, "could not load posts from remote");
                Vec::new()
            }
        }
    }

    /// Upload a post image read from `file_name` and return its public URL.
    /// `None` in local-only mode or when the upload fails; the caller then
    /// posts without the image.
    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn upload_image(&self, file_name: &str, bytes: Vec<u8>) -> Option<String> {
        let Some(remote) = &self.remote else {
            debug!("no remote backend, image not uploaded");
            return None;
        };
        let id = Uuid::now_v7();
        let path = match std::path::Path::new(file_name).extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("posts/{id}.{}", ext.to_ascii_lowercase()),
            None => format!("posts/{id}"),
        };
        match bounded(self.policy, "upload_image", remote.upload_image(&path, bytes)).await {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "image upload failed");
                None
            }
        }
    }

    /// Publish a post owned by `identity`.
    #[instrument(skip(self, draft))]
    pub async fn create_post(&self, identity: &str, draft: PostDraft) -> SyncResult<Post> {
        let has_image = draft.image.as_deref().is_some_and(|i| !i.is_empty());
        if draft.content.trim().is_empty() && !has_image {
            return Err(SyncError::InvalidInput {
                reason: "post needs text or an image".into(),
            });
        }
        let post = Post {
            id: Uuid::now_v7().to_string(),
            author_name: draft.author_name,
            author_week: draft.author_week,
            author_photo: draft.author_photo,
            owner_id: Some(identity.to_string()),
            content: draft.content,
            image: draft.image.filter(|i| !i.is_empty()),
            likes: 0,
            liked_by_me: false,
            comments: Vec::new(),
            timestamp: self.clock.now_millis(),
        };

        if let Some(remote) = &self.remote {
            let stored = bounded(self.policy, "insert_post", remote.insert_post(&post)).await?;
            info!(post_id = %stored.id, "post published to remote");
            return Ok(stored);
        }

        self.store
            .update(keys::POSTS, Vec::new, |posts: &mut Vec<Post>| {
                posts.insert(0, post.clone());
                true
            })?;
        info!(post_id = %post.id, "post stored locally");
        Ok(post)
    }

    /// Delete a post. Only its owner may do so.
    #[instrument(skip(self))]
    pub async fn delete_post(&self, id: &str, identity: &str) -> SyncResult<()> {
        if let Some(remote) = &self.remote {
            let deleted = bounded(self.policy, "delete_post", remote.delete_post(id, identity)).await?;
            if !deleted {
                return Err(not_owner(id, identity));
            }
            info!("post deleted on remote");
            return Ok(());
        }

        let mut outcome = Ok(());
        self.store
            .update(keys::POSTS, Vec::new, |posts: &mut Vec<Post>| {
                match posts.iter().position(|p| p.id == id) {
                    None => {
                        outcome = Err(not_found("post", id));
                        false
                    }
                    Some(index) if posts[index].owner_id.as_deref() != Some(identity) => {
                        outcome = Err(not_owner(id, identity));
                        false
                    }
                    Some(index) => {
                        posts.remove(index);
                        outcome = Ok(());
                        true
                    }
                }
            })?;
        if let Err(e) = &outcome {
            warn!(error = %e, "post delete rejected");
        }
        outcome
    }

    /// Flip `identity`'s like on a post and return the post as it now looks.
    pub async fn toggle_like(&self, post_id: &str, identity: &str) -> SyncResult<Post> {
        if let Some(remote) = &self.remote {
            let posts = bounded(self.policy, "fetch_posts", remote.fetch_posts(Some(identity))).await?;
            let mut post = posts
                .into_iter()
                .find(|p| p.id == post_id)
                .ok_or_else(|| not_found("post", post_id))?;
            let liked = !post.liked_by_me;
            bounded(self.policy, "set_like", remote.set_like(post_id, identity, liked)).await?;
            apply_like(&mut post, liked);
            return Ok(post);
        }

        let mut found = None;
        self.store
            .update(keys::POSTS, Vec::new, |posts: &mut Vec<Post>| {
                let Some(post) = posts.iter_mut().find(|p| p.id == post_id) else {
                    found = None;
                    return false;
                };
                let liked = !post.liked_by_me;
                apply_like(post, liked);
                found = Some(post.clone());
                true
            })?;
        found.ok_or_else(|| not_found("post", post_id))
    }

    pub async fn add_comment(
        &self,
        post_id: &str,
        author_name: &str,
        text: &str,
    ) -> SyncResult<Comment> {
        if text.trim().is_empty() {
            return Err(SyncError::InvalidInput {
                reason: "comment is empty".into(),
            });
        }
        let comment = Comment {
            id: Uuid::now_v7().to_string(),
            author_name: author_name.to_string(),
            text: text.to_string(),
            timestamp: self.clock.now_millis(),
            is_dev: false,
        };

        if let Some(remote) = &self.remote {
            bounded(self.policy, "add_comment", remote.add_comment(post_id, &comment)).await?;
            return Ok(comment);
        }

        let mut exists = false;
        self.store
            .update(keys::POSTS, Vec::new, |posts: &mut Vec<Post>| {
                let Some(post) = posts.iter_mut().find(|p| p.id == post_id) else {
                    exists = false;
                    return false;
                };
                post.comments.push(comment.clone());
                exists = true;
                true
            })?;
        if !exists {
            return Err(not_found("post", post_id));
        }
        Ok(comment)
    }

    // ── profile and remote auth ──────────────────────────────────────

    /// Push the profile fields of `settings` to the remote `profiles`
    /// table. A no-op in local-only mode.
    pub async fn sync_profile(&self, settings: &UserSettings) -> SyncResult<()> {
        let Some(remote) = &self.remote else {
            debug!("local-only, profile not synced");
            return Ok(());
        };
        let session = self.remote_session().ok_or(SyncError::NotSignedIn)?;
        let profile = json!({
            "id": session.user_id,
            "username": settings.user_name.clone().or(session.username.clone()),
            "bio": settings.user_bio,
            "photo": settings.user_photo,
            "phone": settings.user_phone,
        });
        bounded(
            self.policy,
            "upsert_record",
            remote.upsert_record(tables::PROFILES, &profile),
        )
        .await?;
        info!(user_id = %session.user_id, "profile synced");
        Ok(())
    }

    pub async fn remote_sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> SyncResult<Option<RemoteSession>> {
        let remote = self.remote.as_ref().ok_or(SyncError::NotConfigured)?;
        let session =
            bounded(self.policy, "sign_up", remote.sign_up(email, password, username)).await?;
        match &session {
            Some(s) => self.set_session(Some(s.clone())),
            None => info!("sign-up pending confirmation"),
        }
        Ok(session)
    }

    pub async fn remote_sign_in(&self, email: &str, password: &str) -> SyncResult<RemoteSession> {
        let remote = self.remote.as_ref().ok_or(SyncError::NotConfigured)?;
        let session = bounded(self.policy, "sign_in", remote.sign_in(email, password)).await?;
        self.set_session(Some(session.clone()));
        info!(user_id = %session.user_id, "signed in to remote");
        Ok(session)
    }

    /// Drop the remote session. The local copy is cleared even if the
    /// remote call fails.
    pub async fn remote_sign_out(&self) -> SyncResult<()> {
        let remote = self.remote.as_ref().ok_or(SyncError::NotConfigured)?;
        let Some(session) = self.take_session() else {
            return Ok(());
        };
        bounded(self.policy, "sign_out", remote.sign_out(&session)).await
    }

    /// Reinstate a session obtained by an earlier process.
    pub fn resume_session(&self, session: RemoteSession) {
        if let Some(remote) = &self.remote {
            remote.resume(&session);
        }
        self.set_session(Some(session));
    }

    pub fn remote_session(&self) -> Option<RemoteSession> {
        self.session.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_session(&self, session: Option<RemoteSession>) {
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = session;
    }

    fn take_session(&self) -> Option<RemoteSession> {
        self.session.write().unwrap_or_else(|e| e.into_inner()).take()
    }
}

/// Drop finished mirror tasks so a long-lived coordinator does not keep
/// every completed handle until the next flush.
fn reap_finished(mirrors: &mut JoinSet<()>) {
    while let Some(result) = mirrors.try_join_next() {
        if let Err(e) = result {
            warn!(error = %e, "mirror task aborted");
        }
    }
}

/// Run a remote call under the policy timeout.
async fn bounded<T>(
    policy: SyncPolicy,
    operation: &'static str,
    call: impl Future<Output = SyncResult<T>>,
) -> SyncResult<T> {
    match policy.timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| SyncError::Timeout {
                operation,
                seconds: limit.as_secs(),
            })?,
        None => call.await,
    }
}

fn apply_like(post: &mut Post, liked: bool) {
    if liked == post.liked_by_me {
        return;
    }
    post.liked_by_me = liked;
    post.likes = if liked {
        post.likes.saturating_add(1)
    } else {
        post.likes.saturating_sub(1)
    };
}

fn not_found(entity: &'static str, id: &str) -> SyncError {
    SyncError::NotFound {
        entity,
        id: id.to_string(),
    }
}

fn not_owner(id: &str, identity: &str) -> SyncError {
    SyncError::NotOwner {
        entity: "post",
        id: id.to_string(),
        identity: identity.to_string(),
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use async_trait::async_trait;
    use babyconnect_store::ManualClock;
    use chrono::{TimeZone, Utc};

    use super::*;

    /// In-memory stand-in for the hosted backend.
    #[derive(Default)]
    struct MockBackend {
        state: Mutex<MockState>,
    }

    #[derive(Default)]
    struct MockState {
        posts: Vec<Post>,
        likes: HashSet<(String, String)>,
        upserts: Vec<(String, Value)>,
        images: Vec<(String, usize)>,
        failing: bool,
        delay: Option<Duration>,
    }

    impl MockBackend {
        fn failing() -> Self {
            let backend = Self::default();
            backend.state().failing = true;
            backend
        }

        fn slow(delay: Duration) -> Self {
            let backend = Self::default();
            backend.state().delay = Some(delay);
            backend
        }

        fn state(&self) -> MutexGuard<'_, MockState> {
            self.state.lock().unwrap()
        }

        async fn enter(&self) -> SyncResult<()> {
            let delay = self.state().delay;
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            if self.state().failing {
                return Err(SyncError::RemoteUnavailable {
                    reason: "connection refused".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteBackend for MockBackend {
        async fn fetch_posts(&self, viewer: Option<&str>) -> SyncResult<Vec<Post>> {
            self.enter().await?;
            let state = self.state();
            Ok(state
                .posts
                .iter()
                .map(|p| {
                    let mut p = p.clone();
                    p.likes = state.likes.iter().filter(|(id, _)| *id == p.id).count() as u32;
                    p.liked_by_me = viewer
                        .is_some_and(|v| state.likes.contains(&(p.id.clone(), v.to_string())));
                    p
                })
                .collect())
        }

        async fn insert_post(&self, post: &Post) -> SyncResult<Post> {
            self.enter().await?;
            self.state().posts.insert(0, post.clone());
            Ok(post.clone())
        }

        async fn delete_post(&self, id: &str, owner_id: &str) -> SyncResult<bool> {
            self.enter().await?;
            let mut state = self.state();
            let before = state.posts.len();
            state
                .posts
                .retain(|p| !(p.id == id && p.owner_id.as_deref() == Some(owner_id)));
            Ok(state.posts.len() != before)
        }

        async fn set_like(&self, post_id: &str, user_id: &str, liked: bool) -> SyncResult<()> {
            self.enter().await?;
            let key = (post_id.to_string(), user_id.to_string());
            let mut state = self.state();
            if liked {
                state.likes.insert(key);
            } else {
                state.likes.remove(&key);
            }
            Ok(())
        }

        async fn add_comment(&self, post_id: &str, comment: &Comment) -> SyncResult<()> {
            self.enter().await?;
            let mut state = self.state();
            let post = state
                .posts
                .iter_mut()
                .find(|p| p.id == post_id)
                .ok_or_else(|| not_found("post", post_id))?;
            post.comments.push(comment.clone());
            Ok(())
        }

        async fn upload_image(&self, path: &str, bytes: Vec<u8>) -> SyncResult<Option<String>> {
            self.enter().await?;
            self.state().images.push((path.to_string(), bytes.len()));
            Ok(Some(format!("https://cdn.test/{path}")))
        }

        async fn upsert_record(&self, collection: &str, value: &Value) -> SyncResult<()> {
            self.enter().await?;
            self.state()
                .upserts
                .push((collection.to_string(), value.clone()));
            Ok(())
        }

        async fn sign_up(
            &self,
            email: &str,
            _password: &str,
            username: &str,
        ) -> SyncResult<Option<RemoteSession>> {
            self.enter().await?;
            Ok(Some(session(email, Some(username))))
        }

        async fn sign_in(&self, email: &str, _password: &str) -> SyncResult<RemoteSession> {
            self.enter().await?;
            Ok(session(email, None))
        }

        async fn sign_out(&self, _session: &RemoteSession) -> SyncResult<()> {
            self.enter().await
        }
    }

    fn session(email: &str, username: Option<&str>) -> RemoteSession {
        RemoteSession {
            access_token: "token".into(),
            user_id: format!("uid-{email}"),
            email: Some(email.into()),
            username: username.map(str::to_string),
        }
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 18, 15, 0, 0).unwrap(),
        ))
    }

    fn hybrid(backend: Arc<MockBackend>) -> (RecordStore, SyncCoordinator) {
        let store = RecordStore::in_memory();
        let coordinator =
            SyncCoordinator::with_backend(store.clone(), clock(), backend, SyncPolicy::default());
        (store, coordinator)
    }

    fn draft(content: &str) -> PostDraft {
        PostDraft {
            author_name: "Ana".into(),
            author_week: 20,
            content: content.into(),
            ..Default::default()
        }
    }

    // -- local-only ---------------------------------------------------------

    #[tokio::test]
    async fn local_mode_serves_posts_from_store() {
        let store = RecordStore::in_memory();
        let sync = SyncCoordinator::local_only(store.clone(), clock());
        assert_eq!(sync.mode(), SyncMode::LocalOnly);

        let first = sync.create_post("ana", draft("primeiro")).await.unwrap();
        sync.create_post("bia", draft("segundo")).await.unwrap();

        let posts = sync.list_posts().await;
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].content, "segundo");
        assert_eq!(posts[1].owner_id.as_deref(), Some("ana"));
        assert!(store.contains(keys::POSTS));

        assert!(matches!(
            sync.delete_post(&first.id, "bia").await,
            Err(SyncError::NotOwner { .. })
        ));
        sync.delete_post(&first.id, "ana").await.unwrap();
        assert_eq!(sync.list_posts().await.len(), 1);
        assert!(matches!(
            sync.delete_post(&first.id, "ana").await,
            Err(SyncError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn local_likes_and_comments() {
        let sync = SyncCoordinator::local_only(RecordStore::in_memory(), clock());
        let post = sync.create_post("ana", draft("oi")).await.unwrap();

        let liked = sync.toggle_like(&post.id, "ana").await.unwrap();
        assert_eq!((liked.likes, liked.liked_by_me), (1, true));
        let unliked = sync.toggle_like(&post.id, "ana").await.unwrap();
        assert_eq!((unliked.likes, unliked.liked_by_me), (0, false));

        sync.add_comment(&post.id, "Bia", "que lindo").await.unwrap();
        assert_eq!(sync.list_posts().await[0].comments.len(), 1);

        assert!(sync.add_comment("missing", "Bia", "x").await.is_err());
        assert!(sync.add_comment(&post.id, "Bia", "  ").await.is_err());
        assert!(sync.toggle_like("missing", "ana").await.is_err());
    }

    #[tokio::test]
    async fn empty_post_is_rejected() {
        let sync = SyncCoordinator::local_only(RecordStore::in_memory(), clock());
        assert!(matches!(
            sync.create_post("ana", draft("   ")).await,
            Err(SyncError::InvalidInput { .. })
        ));
        let with_image = PostDraft {
            image: Some("https://img/1.png".into()),
            ..draft("")
        };
        assert!(sync.create_post("ana", with_image).await.is_ok());
    }

    #[tokio::test]
    async fn local_mode_rejects_remote_auth() {
        let sync = SyncCoordinator::local_only(RecordStore::in_memory(), clock());
        assert!(matches!(
            sync.remote_sign_in("a@b.c", "pw").await,
            Err(SyncError::NotConfigured)
        ));
        sync.sync_profile(&UserSettings::default()).await.unwrap();
    }

    #[test]
    fn unconfigured_remote_falls_back_to_local() {
        let sync = SyncCoordinator::from_config(
            RecordStore::in_memory(),
            clock(),
            &RemoteConfig::new("COLE_SUA_URL_SUPABASE_AQUI", "COLE_SUA_CHAVE_ANON_AQUI"),
            SyncPolicy::default(),
        )
        .unwrap();
        assert_eq!(sync.mode(), SyncMode::LocalOnly);
    }

    // -- hybrid ---------------------------------------------------------------

    #[tokio::test]
    async fn private_write_succeeds_when_remote_is_down() {
        let backend = Arc::new(MockBackend::failing());
        let (store, sync) = hybrid(backend.clone());
        sync.resume_session(session("a@b.c", None));

        let settings = UserSettings {
            checklist_progress: vec!["c1".into()],
            ..Default::default()
        };
        sync.save_settings(&settings).unwrap();
        assert_eq!(sync.flush().await, 1);

        let stored: UserSettings = store.try_read(keys::USER_SETTINGS).unwrap();
        assert_eq!(stored, settings);
        assert!(backend.state().upserts.is_empty());
    }

    #[tokio::test]
    async fn private_writes_are_mirrored() {
        let backend = Arc::new(MockBackend::default());
        let (store, sync) = hybrid(backend.clone());
        sync.resume_session(session("a@b.c", None));

        sync.save_settings(&UserSettings::default()).unwrap();
        let config = AppConfig {
            api_key: Some("secret".into()),
            ..AppConfig::default()
        };
        sync.save_config(&config).unwrap();
        sync.save_checklist(&babyconnect_store::seed::checklist()).unwrap();
        assert_eq!(sync.flush().await, 3);

        let upserts = backend.state().upserts.clone();
        let collections: HashSet<_> = upserts.iter().map(|(c, _)| c.as_str()).collect();
        assert!(collections.contains(tables::USER_SETTINGS));
        assert!(collections.contains(tables::CHECKLIST));
        let (_, mirrored_config) = upserts
            .iter()
            .find(|(c, _)| c == tables::CONFIG)
            .unwrap();
        assert!(mirrored_config["data"].get("apiKey").is_none());

        // Local copy keeps the key.
        let local: AppConfig = store.try_read(keys::CONFIG).unwrap();
        assert_eq!(local.api_key.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn finished_mirrors_are_collected_before_new_ones() {
        let backend = Arc::new(MockBackend::default());
        let (_, sync) = hybrid(backend.clone());
        sync.resume_session(session("a@b.c", None));

        sync.save_settings(&UserSettings::default()).unwrap();
        for _ in 0..100 {
            if !backend.state().upserts.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(backend.state().upserts.len(), 1);
        tokio::task::yield_now().await;

        sync.save_settings(&UserSettings::default()).unwrap();
        assert_eq!(sync.pending_mirrors(), 1);
        assert_eq!(sync.flush().await, 1);
        assert_eq!(sync.pending_mirrors(), 0);
        assert_eq!(backend.state().upserts.len(), 2);
    }

    #[tokio::test]
    async fn image_upload_goes_to_posts_folder() {
        let backend = Arc::new(MockBackend::default());
        let (_, sync) = hybrid(backend.clone());

        let url = sync.upload_image("barriga.PNG", vec![1, 2, 3]).await.unwrap();
        let images = backend.state().images.clone();
        assert_eq!(images.len(), 1);
        let (path, size) = &images[0];
        assert!(path.starts_with("posts/") && path.ends_with(".png"), "{path}");
        assert_eq!(*size, 3);
        assert_eq!(url, format!("https://cdn.test/{path}"));
    }

    #[tokio::test]
    async fn image_upload_without_working_remote_is_none() {
        let store = RecordStore::in_memory();
        let local = SyncCoordinator::local_only(store, clock());
        assert_eq!(local.upload_image("a.jpg", vec![0]).await, None);

        let (_, sync) = hybrid(Arc::new(MockBackend::failing()));
        assert_eq!(sync.upload_image("a.jpg", vec![0]).await, None);
    }

    #[tokio::test]
    async fn settings_without_remote_session_stay_local() {
        let backend = Arc::new(MockBackend::default());
        let (_, sync) = hybrid(backend.clone());
        sync.save_settings(&UserSettings::default()).unwrap();
        assert_eq!(sync.flush().await, 0);
    }

    #[tokio::test]
    async fn hybrid_feed_never_reads_local_posts() {
        let backend = Arc::new(MockBackend::failing());
        let (store, sync) = hybrid(backend);
        let local = SyncCoordinator::local_only(store.clone(), clock());
        local.create_post("ana", draft("local only")).await.unwrap();

        assert!(sync.list_posts().await.is_empty());
    }

    #[tokio::test]
    async fn hybrid_posts_round_trip_through_remote() {
        let backend = Arc::new(MockBackend::default());
        let (store, sync) = hybrid(backend.clone());
        let me = sync.remote_sign_in("ana@x.com", "pw").await.unwrap();

        let post = sync.create_post(&me.user_id, draft("oi")).await.unwrap();
        assert!(!store.contains(keys::POSTS));
        assert_eq!(sync.list_posts().await.len(), 1);

        let liked = sync.toggle_like(&post.id, &me.user_id).await.unwrap();
        assert!(liked.liked_by_me);
        assert!(sync.list_posts().await[0].liked_by_me);

        sync.add_comment(&post.id, "Ana", "obrigada").await.unwrap();
        assert_eq!(backend.state().posts[0].comments.len(), 1);

        assert!(matches!(
            sync.delete_post(&post.id, "someone-else").await,
            Err(SyncError::NotOwner { .. })
        ));
        sync.delete_post(&post.id, &me.user_id).await.unwrap();
        assert!(sync.list_posts().await.is_empty());
    }

    #[tokio::test]
    async fn slow_remote_hits_timeout() {
        let backend = Arc::new(MockBackend::slow(Duration::from_secs(5)));
        let store = RecordStore::in_memory();
        let sync = SyncCoordinator::with_backend(
            store,
            clock(),
            backend,
            SyncPolicy {
                timeout: Some(Duration::from_millis(50)),
            },
        );

        assert!(sync.list_posts().await.is_empty());
        let err = sync.create_post("u1", draft("oi")).await.unwrap_err();
        assert!(matches!(err, SyncError::Timeout { operation: "insert_post", .. }));
        assert!(err.is_remote_failure());
    }

    #[tokio::test]
    async fn profile_sync_needs_session() {
        let backend = Arc::new(MockBackend::default());
        let (_, sync) = hybrid(backend.clone());
        let settings = UserSettings {
            user_bio: Some("mãe de primeira viagem".into()),
            ..Default::default()
        };
        assert!(matches!(
            sync.sync_profile(&settings).await,
            Err(SyncError::NotSignedIn)
        ));

        sync.remote_sign_up("ana@x.com", "pw", "Ana").await.unwrap();
        sync.sync_profile(&settings).await.unwrap();
        let upserts = backend.state().upserts.clone();
        let (collection, profile) = &upserts[0];
        assert_eq!(collection, tables::PROFILES);
        assert_eq!(profile["username"], "Ana");
        assert_eq!(profile["bio"], "mãe de primeira viagem");

        sync.remote_sign_out().await.unwrap();
        assert!(sync.remote_session().is_none());
    }
}
