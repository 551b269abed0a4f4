//! Local accounts and the current session.
//!
//! [`SessionManager`] owns two records: the account list
//! ([`keys::USERS`]) and the single active session ([`keys::AUTH_SESSION`]).
//! Usernames are unique case-insensitively but stored as entered. A session
//! is valid while `now < expires_at`; reading an expired one deletes it.

use std::num::NonZeroU32;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use babyconnect_store::models::{AuthSession, UserAccount};
use babyconnect_store::{Clock, RecordStore, keys};
use chrono::Duration;
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::password;

/// Session lifetime in hours unless configured otherwise.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 7 * 24;

/// Random bytes in a session token.
const TOKEN_LEN: usize = 32;

/// Registers accounts and issues, checks and revokes sessions.
#[derive(Clone)]
pub struct SessionManager {
    store: RecordStore,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    iterations: NonZeroU32,
}

impl SessionManager {
    pub fn new(store: RecordStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            iterations: NonZeroU32::new(password::DEFAULT_ITERATIONS).unwrap_or(NonZeroU32::MIN),
        }
    }

    /// Override how long issued sessions stay valid.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Override the PBKDF2 iteration count used for new digests.
    pub fn with_hash_iterations(mut self, iterations: NonZeroU32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Create an account and log it in.
    #[instrument(skip(self, password))]
    pub fn register(&self, username: &str, password: &str) -> AuthResult<AuthSession> {
        let username = username.trim();
        validate(username, password)?;
        // Built first so an unusable TTL leaves no account behind.
        let session = self.new_session(username)?;

        let digest = password::hash_password(password, self.iterations)?;
        let account = UserAccount {
            id: Uuid::now_v7().to_string(),
            username: username.to_string(),
            password_hash: digest,
            created_at: self.clock.now_millis(),
        };

        let mut taken = false;
        self.store
            .update(keys::USERS, Vec::new, |accounts: &mut Vec<UserAccount>| {
                taken = find(accounts, username).is_some();
                if taken {
                    return false;
                }
                accounts.push(account.clone());
                true
            })?;
        if taken {
            return Err(AuthError::DuplicateUsername {
                username: username.to_string(),
            });
        }

        info!(user_id = %account.id, "account registered");
        self.persist(session)
    }

    /// Check credentials and issue a fresh session.
    #[instrument(skip(self, password))]
    pub fn login(&self, username: &str, password: &str) -> AuthResult<AuthSession> {
        let username = username.trim();
        let accounts = self.accounts();
        let account = find(&accounts, username).ok_or_else(|| AuthError::UserNotFound {
            username: username.to_string(),
        })?;

        if !password::verify_password(password, &account.password_hash)? {
            warn!("login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        if password::is_legacy(&account.password_hash) {
            self.upgrade_digest(&account.id, password)?;
        }

        self.issue(&account.username)
    }

    /// The stored session if it has not expired. An expired session is
    /// deleted.
    pub fn get_session(&self) -> Option<AuthSession> {
        let session: AuthSession = self.store.try_read(keys::AUTH_SESSION)?;
        if session.is_valid_at(self.clock.now_millis()) {
            return Some(session);
        }
        debug!(username = %session.username, "session expired");
        if let Err(e) = self.store.remove(keys::AUTH_SESSION) {
            warn!(error = %e, "failed to delete expired session");
        }
        None
    }

    /// Account behind the current valid session.
    pub fn current_user(&self) -> Option<UserAccount> {
        let session = self.get_session()?;
        find(&self.accounts(), &session.username).cloned()
    }

    pub fn logout(&self) -> AuthResult<()> {
        if self.store.remove(keys::AUTH_SESSION)? {
            info!("logged out");
        }
        Ok(())
    }

    /// All local accounts.
    pub fn accounts(&self) -> Vec<UserAccount> {
        self.store.read(keys::USERS, Vec::new)
    }

    fn issue(&self, username: &str) -> AuthResult<AuthSession> {
        let session = self.new_session(username)?;
        self.persist(session)
    }

    fn new_session(&self, username: &str) -> AuthResult<AuthSession> {
        let expires = self
            .clock
            .now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::InvalidInput {
                reason: format!("session ttl of {} hours is out of range", self.ttl.num_hours()),
            })?;
        Ok(AuthSession {
            username: username.to_string(),
            token: new_token()?,
            expires_at: expires.timestamp_millis(),
        })
    }

    fn persist(&self, session: AuthSession) -> AuthResult<AuthSession> {
        self.store.write(keys::AUTH_SESSION, &session)?;
        debug!(username = %session.username, expires_at = session.expires_at, "session issued");
        Ok(session)
    }

    fn upgrade_digest(&self, account_id: &str, password: &str) -> AuthResult<()> {
        let digest = password::hash_password(password, self.iterations)?;
        self.store
            .update(keys::USERS, Vec::new, |accounts: &mut Vec<UserAccount>| {
                match accounts.iter_mut().find(|a| a.id == account_id) {
                    Some(account) if password::is_legacy(&account.password_hash) => {
                        account.password_hash = digest.clone();
                        true
                    }
                    _ => false,
                }
            })?;
        info!(user_id = account_id, "legacy password digest upgraded");
        Ok(())
    }
}

fn find<'a>(accounts: &'a [UserAccount], username: &str) -> Option<&'a UserAccount> {
    accounts
        .iter()
        .find(|a| a.username.to_lowercase() == username.to_lowercase())
}

fn validate(username: &str, password: &str) -> AuthResult<()> {
    if username.is_empty() {
        return Err(AuthError::InvalidInput {
            reason: "username is empty".into(),
        });
    }
    if password.is_empty() {
        return Err(AuthError::InvalidInput {
            reason: "password is empty".into(),
        });
    }
    Ok(())
}

fn new_token() -> AuthResult<String> {
    let mut bytes = [0u8; TOKEN_LEN];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AuthError::Crypto {
            reason: "failed to generate session token".into(),
        })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

// ── tests ────────────────────────────────────────────────────────────
