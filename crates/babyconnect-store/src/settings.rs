//! Device-private user progress.
//!
//! [`SettingsStore`] wraps the single [`UserSettings`] record: due date,
//! checklist and weekly-task progress, favourite names, profile, journal,
//! kick counts and contractions. Every mutation is an atomic
//! read-modify-write through [`RecordStore::update`].

use std::sync::Arc;

use chrono::{NaiveDate, SecondsFormat};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{StoreError, StoreResult};
use crate::keys;
use crate::models::{Contraction, JournalEntry, KickSession, Mood, NameMeaning, UserSettings};
use crate::record::RecordStore;
use crate::seed::{FIRST_WEEK, LAST_WEEK};

/// Full-term pregnancy length used for week arithmetic.
const PREGNANCY_DAYS: i64 = 280;

/// Flip membership of `id` in `set`. Returns `true` if `id` is now present.
///
/// Applying it twice with the same id restores the original set.
pub fn toggle(set: &mut Vec<String>, id: &str) -> bool {
    match set.iter().position(|x| x == id) {
        Some(index) => {
            set.remove(index);
            false
        }
        None => {
            set.push(id.to_string());
            true
        }
    }
}

/// Gestational week for `today` given a due date, or `None` when it falls
/// outside the tracked range.
pub fn gestational_week(due: NaiveDate, today: NaiveDate) -> Option<u8> {
    let days_remaining = (due - today).num_days();
    let week = (PREGNANCY_DAYS - days_remaining).div_euclid(7) + 1;
    u8::try_from(week)
        .ok()
        .filter(|w| (FIRST_WEEK..=LAST_WEEK).contains(w))
}

/// Key identifying task `index` of `week` in `weekly_tasks_completed`.
pub fn weekly_task_key(week: u8, index: usize) -> String {
    format!("{week}-{index}")
}

/// Profile fields shared with the social features.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub user_name: Option<String>,
    pub user_bio: Option<String>,
    pub user_photo: Option<String>,
    pub user_phone: Option<String>,
}

/// Typed access to the [`UserSettings`] record.
#[derive(Clone)]
pub struct SettingsStore {
    store: RecordStore,
    clock: Arc<dyn Clock>,
}

impl SettingsStore {
    pub fn new(store: RecordStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Current settings, created with defaults on first read.
    pub fn get(&self) -> UserSettings {
        self.store.read_or_init(keys::USER_SETTINGS, UserSettings::default)
    }

    pub fn save(&self, settings: &UserSettings) -> StoreResult<()> {
        self.store.write(keys::USER_SETTINGS, settings)
    }

    fn modify<R>(&self, mut f: impl FnMut(&mut UserSettings) -> R) -> StoreResult<R> {
        let mut out = None;
        self.store
            .update(keys::USER_SETTINGS, UserSettings::default, |settings| {
                out = Some(f(settings));
                true
            })?;
        out.ok_or_else(|| StoreError::InvalidArgument("settings update did not run".into()))
    }

    /// Toggle a checklist item. Returns `true` if it is now checked.
    #[instrument(skip(self))]
    pub fn toggle_checklist_item(&self, item_id: &str) -> StoreResult<bool> {
        self.modify(|s| toggle(&mut s.checklist_progress, item_id))
    }

    /// Toggle a weekly task key (see [`weekly_task_key`]). Returns `true` if
    /// it is now completed.
    #[instrument(skip(self))]
    pub fn toggle_weekly_task(&self, task_key: &str) -> StoreResult<bool> {
        self.modify(|s| toggle(&mut s.weekly_tasks_completed, task_key))
    }

    /// Add or remove a favourite name (matched by name). Returns `true` if it
    /// is now a favourite.
    #[instrument(skip(self, name), fields(name = %name.name))]
    pub fn toggle_favorite_name(&self, name: NameMeaning) -> StoreResult<bool> {
        self.modify(|s| {
            if let Some(index) = s.name_favorites.iter().position(|n| n.name == name.name) {
                s.name_favorites.remove(index);
                false
            } else {
                s.name_favorites.push(name.clone());
                true
            }
        })
    }

    pub fn set_due_date(&self, due: Option<NaiveDate>) -> StoreResult<()> {
        self.modify(|s| {
            s.due_date = due.map(|d| d.format("%Y-%m-%d").to_string());
        })
    }

    /// Gestational week today, if a due date is set.
    pub fn current_week(&self) -> Option<u8> {
        let due = self.get().due_date()?;
        gestational_week(due, self.clock.today())
    }

    /// Overwrite the fields of `update` that are `Some`.
    pub fn update_profile(&self, update: ProfileUpdate) -> StoreResult<UserSettings> {
        self.modify(|s| {
            if let Some(v) = &update.user_name {
                s.user_name = Some(v.clone());
            }
            if let Some(v) = &update.user_bio {
                s.user_bio = Some(v.clone());
            }
            if let Some(v) = &update.user_photo {
                s.user_photo = Some(v.clone());
            }
            if let Some(v) = &update.user_phone {
                s.user_phone = Some(v.clone());
            }
            s.clone()
        })
    }

    pub fn add_journal_entry(&self, content: &str, mood: Mood) -> StoreResult<JournalEntry> {
        if content.trim().is_empty() {
            return Err(StoreError::InvalidArgument(
                "journal entry must not be empty".into(),
            ));
        }
        let entry = JournalEntry {
            id: Uuid::now_v7().to_string(),
            week: self.current_week().map(u32::from).unwrap_or(0),
            date: self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true),
            content: content.to_string(),
            mood,
        };
        self.modify(|s| s.journal_entries.insert(0, entry.clone()))?;
        debug!(entry_id = %entry.id, "journal entry added");
        Ok(entry)
    }

    pub fn record_kick_session(&self, duration_seconds: u64, count: u32) -> StoreResult<KickSession> {
        let session = KickSession {
            id: Uuid::now_v7().to_string(),
            date: self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true),
            duration_seconds,
            count,
        };
        self.modify(|s| s.kick_sessions.insert(0, session.clone()))?;
        Ok(session)
    }

    /// Start timing a contraction. Fails if one is already in progress.
    pub fn start_contraction(&self) -> StoreResult<Contraction> {
        let now = self.clock.now_millis();
        let contraction = Contraction {
            id: Uuid::now_v7().to_string(),
            start_time: now,
            end_time: None,
            duration_seconds: None,
            interval_seconds: None,
        };
        let started = self.modify(|s| {
            if s.contractions.iter().any(|c| c.end_time.is_none()) {
                return false;
            }
            s.contractions.push(contraction.clone());
            true
        })?;
        if !started {
            return Err(StoreError::InvalidArgument(
                "a contraction is already in progress".into(),
            ));
        }
        Ok(contraction)
    }

    /// Stop the contraction in progress, filling duration and the interval
    /// since the previous contraction started.
    pub fn finish_contraction(&self) -> StoreResult<Contraction> {
        let now = self.clock.now_millis();
        let finished = self.modify(|s| {
            let index = s.contractions.iter().rposition(|c| c.end_time.is_none())?;
            let previous_start = index
                .checked_sub(1)
                .map(|i| s.contractions[i].start_time);
            let current = &mut s.contractions[index];
            current.end_time = Some(now);
            current.duration_seconds = Some((now - current.start_time) / 1000);
            current.interval_seconds = previous_start.map(|p| (current.start_time - p) / 1000);
            Some(current.clone())
        })?;
        finished.ok_or(StoreError::NotFound {
            entity: "contraction",
            id: "in progress".into(),
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────
