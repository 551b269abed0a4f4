//! HTTP implementation of [`RemoteBackend`].
//!
//! Talks to a hosted Postgres REST gateway (`/rest/v1/<table>`, PostgREST
//! filter syntax) and its auth service (`/auth/v1/...`). Every request
//! carries the anon key as `apikey`; the bearer is the signed-in user's
//! access token when there is one, otherwise the anon key.
//!
//! Tables: `posts`, `comments` and `post_likes` for the shared feed, plus
//! one table per mirrored private collection (see [`crate::coordinator`]).
//! Post images go to the public `images` bucket of the object storage
//! service (`/storage/v1/object/...`).

use std::sync::RwLock;

use async_trait::async_trait;
use babyconnect_store::models::{Comment, Post};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::RemoteConfig;
use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteBackend, RemoteSession};

const POSTS: &str = "posts";
const COMMENTS: &str = "comments";
const LIKES: &str = "post_likes";
const IMAGE_BUCKET: &str = "images";

/// Embedded select used when listing the feed.
const FEED_SELECT: &str = "*,comments(*),post_likes(user_id)";

// ---------------------------------------------------------------------------
// Wire rows
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct PostRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    author_name: String,
    #[serde(default)]
    author_week: u32,
    #[serde(default)]
    author_photo: Option<String>,
    #[serde(default)]
    owner_id: Option<String>,
    content: String,
    #[serde(default)]
    image: Option<String>,
    timestamp: i64,
    #[serde(default, skip_serializing)]
    comments: Vec<CommentRow>,
    #[serde(default, skip_serializing)]
    post_likes: Vec<LikeRow>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CommentRow {
    id: String,
    #[serde(default)]
    post_id: String,
    author_name: String,
    text: String,
    timestamp: i64,
    #[serde(default)]
    is_dev: bool,
}

#[derive(Debug, Deserialize)]
struct LikeRow {
    user_id: String,
}

impl PostRow {
    fn from_post(post: &Post) -> Self {
        Self {
            id: (!post.id.is_empty()).then(|| post.id.clone()),
            author_name: post.author_name.clone(),
            author_week: post.author_week,
            author_photo: post.author_photo.clone(),
            owner_id: post.owner_id.clone(),
            content: post.content.clone(),
            image: post.image.clone(),
            timestamp: post.timestamp,
            comments: Vec::new(),
            post_likes: Vec::new(),
        }
    }

    fn into_post(self, viewer: Option<&str>) -> Post {
        let liked_by_me = viewer.is_some_and(|v| self.post_likes.iter().any(|l| l.user_id == v));
        let mut comments: Vec<Comment> = self
            .comments
            .into_iter()
            .map(|c| Comment {
                id: c.id,
                author_name: c.author_name,
                text: c.text,
                timestamp: c.timestamp,
                is_dev: c.is_dev,
            })
            .collect();
        comments.sort_by_key(|c| c.timestamp);
        Post {
            id: self.id.unwrap_or_default(),
            author_name: self.author_name,
            author_week: self.author_week,
            author_photo: self.author_photo,
            owner_id: self.owner_id,
            content: self.content,
            image: self.image,
            likes: u32::try_from(self.post_likes.len()).unwrap_or(u32::MAX),
            liked_by_me,
            comments,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

/// Token and signup responses; signup without auto-confirm returns the bare
/// user at top level instead of a session.
#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<AuthUser>,
}

impl AuthResponse {
    fn into_session(self) -> Option<RemoteSession> {
        let access_token = self.access_token?;
        let user = self.user?;
        Some(RemoteSession {
            access_token,
            user_id: user.id,
            email: user.email,
            username: user
                .user_metadata
                .get("username")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// REST client for the hosted backend.
#[derive(Debug)]
pub struct RestBackend {
    http: reqwest::Client,
    base: Url,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

impl RestBackend {
    pub fn new(config: &RemoteConfig) -> SyncResult<Self> {
        let base = Url::parse(&format!("{}/", config.url.trim().trim_end_matches('/'))).map_err(
            |e| SyncError::InvalidInput {
                reason: format!("invalid remote url: {e}"),
            },
        )?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| SyncError::RemoteUnavailable {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            base,
            anon_key: config.anon_key.trim().to_string(),
            access_token: RwLock::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> SyncResult<Url> {
        self.base.join(path).map_err(|e| SyncError::InvalidInput {
            reason: format!("invalid endpoint {path}: {e}"),
        })
    }

    fn table(&self, table: &str) -> SyncResult<Url> {
        self.endpoint(&format!("rest/v1/{table}"))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let token = self
            .access_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .unwrap_or_else(|| self.anon_key.clone());
        let builder = self.http.request(method, url).header("apikey", &self.anon_key);
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(value) => builder.header(AUTHORIZATION, value),
            Err(_) => builder,
        }
    }

    fn set_token(&self, token: Option<String>) {
        *self.access_token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    async fn send(&self, request: RequestBuilder) -> SyncResult<Response> {
        let resp = request.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(SyncError::RemoteStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RemoteBackend for RestBackend {
    #[instrument(skip(self))]
    async fn fetch_posts(&self, viewer: Option<&str>) -> SyncResult<Vec<Post>> {
        let mut url = self.table(POSTS)?;
        url.query_pairs_mut()
            .append_pair("select", FEED_SELECT)
            .append_pair("order", "timestamp.desc");
        let rows: Vec<PostRow> = self.send(self.request(Method::GET, url)).await?.json().await?;
        debug!(count = rows.len(), "posts fetched");
        Ok(rows.into_iter().map(|r| r.into_post(viewer)).collect())
    }

    #[instrument(skip(self, post), fields(owner = ?post.owner_id))]
    async fn insert_post(&self, post: &Post) -> SyncResult<Post> {
        let url = self.table(POSTS)?;
        let request = self
            .request(Method::POST, url)
            .header("Prefer", "return=representation")
            .json(&PostRow::from_post(post));
        let mut rows: Vec<PostRow> = self.send(request).await?.json().await?;
        let row = rows.pop().ok_or_else(|| SyncError::RemoteUnavailable {
            reason: "insert returned no row".into(),
        })?;
        Ok(row.into_post(post.owner_id.as_deref()))
    }

    #[instrument(skip(self))]
    async fn delete_post(&self, id: &str, owner_id: &str) -> SyncResult<bool> {
        let mut url = self.table(POSTS)?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{id}"))
            .append_pair("owner_id", &format!("eq.{owner_id}"));
        let request = self
            .request(Method::DELETE, url)
            .header("Prefer", "return=representation");
        let rows: Vec<Value> = self.send(request).await?.json().await?;
        Ok(!rows.is_empty())
    }

    #[instrument(skip(self))]
    async fn set_like(&self, post_id: &str, user_id: &str, liked: bool) -> SyncResult<()> {
        let mut url = self.table(LIKES)?;
        let request = if liked {
            self.request(Method::POST, url)
                .header("Prefer", "resolution=ignore-duplicates")
                .json(&json!({ "post_id": post_id, "user_id": user_id }))
        } else {
            url.query_pairs_mut()
                .append_pair("post_id", &format!("eq.{post_id}"))
                .append_pair("user_id", &format!("eq.{user_id}"));
            self.request(Method::DELETE, url)
        };
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, comment))]
    async fn add_comment(&self, post_id: &str, comment: &Comment) -> SyncResult<()> {
        let row = CommentRow {
            id: comment.id.clone(),
            post_id: post_id.to_string(),
            author_name: comment.author_name.clone(),
            text: comment.text.clone(),
            timestamp: comment.timestamp,
            is_dev: comment.is_dev,
        };
        let request = self.request(Method::POST, self.table(COMMENTS)?).json(&row);
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, bytes), fields(bytes = bytes.len()))]
    async fn upload_image(&self, path: &str, bytes: Vec<u8>) -> SyncResult<Option<String>> {
        let path = path.trim_start_matches('/');
        let url = self.endpoint(&format!("storage/v1/object/{IMAGE_BUCKET}/{path}"))?;
        let request = self
            .request(Method::POST, url)
            .header(CONTENT_TYPE, image_content_type(path))
            .body(bytes);
        if let Err(e) = self.send(request).await {
            warn!(error = %e, "image upload failed");
            return Ok(None);
        }
        let public = self.endpoint(&format!("storage/v1/object/public/{IMAGE_BUCKET}/{path}"))?;
        debug!(url = %public, "image uploaded");
        Ok(Some(public.to_string()))
    }

    #[instrument(skip(self, value))]
    async fn upsert_record(&self, collection: &str, value: &Value) -> SyncResult<()> {
        let request = self
            .request(Method::POST, self.table(collection)?)
            .header("Prefer", "resolution=merge-duplicates")
            .json(value);
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, password))]
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> SyncResult<Option<RemoteSession>> {
        let request = self
            .request(Method::POST, self.endpoint("auth/v1/signup")?)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "username": username },
            }));
        let response: AuthResponse = self.send(request).await?.json().await?;
        let session = response.into_session();
        if let Some(s) = &session {
            self.set_token(Some(s.access_token.clone()));
        }
        Ok(session)
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> SyncResult<RemoteSession> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let request = self
            .request(Method::POST, url)
            .json(&json!({ "email": email, "password": password }));
        let response: AuthResponse = self.send(request).await?.json().await?;
        let session = response
            .into_session()
            .ok_or_else(|| SyncError::RemoteUnavailable {
                reason: "token response carried no session".into(),
            })?;
        self.set_token(Some(session.access_token.clone()));
        Ok(session)
    }

    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    async fn sign_out(&self, session: &RemoteSession) -> SyncResult<()> {
        let request = self
            .http
            .post(self.endpoint("auth/v1/logout")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token);
        let result = self.send(request).await;
        self.set_token(None);
        result.map(|_| ())
    }

    fn resume(&self, session: &RemoteSession) {
        self.set_token(Some(session.access_token.clone()));
    }
}

/// MIME type for an image path, from its extension.
fn image_content_type(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}
