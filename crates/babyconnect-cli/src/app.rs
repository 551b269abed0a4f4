//! Everything a subcommand needs, built once from the resolved config.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use babyconnect_ai::{GeminiClient, MeteredGenerator};
use babyconnect_auth::SessionManager;
use babyconnect_store::migration::{self, MigrationReport};
use babyconnect_store::{
    CatalogStore, Clock, QuotaMeter, RecordStore, SettingsStore, SqliteMedium, SystemClock,
};
use babyconnect_sync::{RemoteSession, SyncCoordinator};
use tracing::{debug, info, warn};

use crate::config::CliConfig;

pub struct App {
    pub config: CliConfig,
    pub store: RecordStore,
    pub clock: Arc<dyn Clock>,
    pub migration: MigrationReport,
}

impl App {
    /// Open the database named by `config` and bring it up to date.
    pub fn open(config: CliConfig) -> Result<Self> {
        let path = config.storage.path.clone();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let medium = SqliteMedium::open(&path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        let store = RecordStore::new(medium);
        let migration = migration::run_all(&store).context("migration failed")?;
        if !migration.applied.is_empty() {
            info!(from = migration.from, to = migration.to, "database migrated");
        }
        Ok(Self {
            config,
            store,
            clock: Arc::new(SystemClock),
            migration,
        })
    }

    pub fn catalog(&self) -> CatalogStore {
        CatalogStore::new(self.store.clone())
    }

    pub fn settings(&self) -> SettingsStore {
        SettingsStore::new(self.store.clone(), Arc::clone(&self.clock))
    }

    pub fn sessions(&self) -> Result<SessionManager> {
        Ok(SessionManager::new(self.store.clone(), Arc::clone(&self.clock))
            .with_session_ttl(self.config.session_ttl()?))
    }

    pub fn quota(&self) -> QuotaMeter {
        QuotaMeter::new(self.store.clone(), Arc::clone(&self.clock))
            .with_limit(self.config.ai.daily_limit)
    }

    /// Coordinator for the configured remote, with any saved remote session
    /// resumed.
    pub fn sync(&self) -> Result<SyncCoordinator> {
        let sync = SyncCoordinator::from_config(
            self.store.clone(),
            Arc::clone(&self.clock),
            &self.config.remote_config(),
            self.config.sync_policy(),
        )?;
        if let Some(session) = self.load_remote_session() {
            debug!(user_id = %session.user_id, "resuming remote session");
            sync.resume_session(session);
        }
        Ok(sync)
    }

    /// The AI collaborator, when a key is available.
    pub fn ai(&self) -> Result<MeteredGenerator> {
        let mut app_config = self.catalog().config();
        if let Some(key) = &self.config.ai.api_key {
            app_config.api_key = Some(key.clone());
        }
        let client = GeminiClient::from_config(&app_config, self.config.ai.model.clone())
            .context("no AI key: set GEMINI_API_KEY or [ai].api_key")?;
        Ok(MeteredGenerator::new(Arc::new(client), self.quota()).with_policy(self.config.ai_policy()))
    }

    // ── remote session sidecar ───────────────────────────────────────

    fn load_remote_session(&self) -> Option<RemoteSession> {
        let path = self.config.remote_session_file();
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable remote session");
                None
            }
        }
    }

    pub fn save_remote_session(&self, session: Option<&RemoteSession>) -> Result<()> {
        let path = self.config.remote_session_file();
        match session {
            Some(session) => write_private(&path, &serde_json::to_string(session)?),
            None => match std::fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
            },
        }
    }
}

/// Write a file readable only by the owner where the platform allows it.
/// A new file is created with that mode, so it is never briefly readable by
/// others; an existing file is narrowed before it is rewritten.
fn write_private(path: &Path, content: &str) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        if path.exists() {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("failed to restrict {}", path.display()))?;
        }
    }
    let mut file = options
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
