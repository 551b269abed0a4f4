//! Operator-owned catalogs and the user-listed marketplace.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{StoreError, StoreResult};
use crate::keys;
use crate::models::{AppConfig, ChecklistItem, MarketplaceProduct, Product, WeekInfo};
use crate::record::RecordStore;
use crate::seed::{self, FIRST_WEEK, LAST_WEEK};

// ── catalogs ─────────────────────────────────────────────────────────

/// Config, products, checklist definitions and week content.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    store: RecordStore,
}

impl CatalogStore {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub fn config(&self) -> AppConfig {
        self.store.read_or_init(keys::CONFIG, AppConfig::default)
    }

    pub fn save_config(&self, config: &AppConfig) -> StoreResult<()> {
        info!(app_name = %config.app_name, "saving config");
        self.store.write(keys::CONFIG, config)
    }

    pub fn products(&self) -> Vec<Product> {
        self.store.read_or_init(keys::PRODUCTS, seed::products)
    }

    /// Products shown to users.
    pub fn active_products(&self) -> Vec<Product> {
        self.products().into_iter().filter(|p| p.active).collect()
    }

    pub fn save_products(&self, products: &[Product]) -> StoreResult<()> {
        ensure_unique_ids(products.iter().map(|p| p.id.as_str()), "product")?;
        self.store.write(keys::PRODUCTS, products)
    }

    pub fn checklist_definitions(&self) -> Vec<ChecklistItem> {
        self.store.read_or_init(keys::CHECKLIST_DEF, seed::checklist)
    }

    pub fn save_checklist_definitions(&self, items: &[ChecklistItem]) -> StoreResult<()> {
        ensure_unique_ids(items.iter().map(|c| c.id.as_str()), "checklist item")?;
        self.store.write(keys::CHECKLIST_DEF, items)
    }

    pub fn weeks(&self) -> Vec<WeekInfo> {
        self.store.read_or_init(keys::WEEKS, seed::weeks)
    }

    pub fn week(&self, week: u8) -> Option<WeekInfo> {
        self.weeks().into_iter().find(|w| w.week == week)
    }

    /// Replace the week catalog. Week numbers must be unique and within
    /// the tracked range.
    pub fn save_weeks(&self, weeks: &[WeekInfo]) -> StoreResult<()> {
        let mut seen = HashSet::new();
        for w in weeks {
            if !(FIRST_WEEK..=LAST_WEEK).contains(&w.week) {
                return Err(StoreError::InvalidArgument(format!(
                    "week {} outside {FIRST_WEEK}..={LAST_WEEK}",
                    w.week
                )));
            }
            if !seen.insert(w.week) {
                return Err(StoreError::InvalidArgument(format!(
                    "week {} listed twice",
                    w.week
                )));
            }
        }
        self.store.write(keys::WEEKS, weeks)
    }
}

fn ensure_unique_ids<'a>(ids: impl Iterator<Item = &'a str>, entity: &str) -> StoreResult<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(StoreError::InvalidArgument(format!(
                "duplicate {entity} id {id}"
            )));
        }
    }
    Ok(())
}

// ── marketplace ──────────────────────────────────────────────────────

/// Fields a user supplies when listing a product.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewListing {
    pub name: String,
    pub description: String,
    pub price: String,
    pub image: String,
    pub owner_name: String,
    pub owner_phone: String,
    pub city: String,
    pub state: String,
}

/// User-listed products. Only the owner may change or remove a listing.
#[derive(Clone)]
pub struct MarketplaceStore {
    store: RecordStore,
    clock: Arc<dyn Clock>,
}

impl MarketplaceStore {
    pub fn new(store: RecordStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// All listings, newest first.
    pub fn list(&self) -> Vec<MarketplaceProduct> {
        self.store.read(keys::MARKETPLACE, Vec::new)
    }

    #[instrument(skip(self, listing), fields(name = %listing.name))]
    pub fn add(&self, owner_id: &str, listing: NewListing) -> StoreResult<MarketplaceProduct> {
        if listing.name.trim().is_empty() {
            return Err(StoreError::InvalidArgument("listing name is required".into()));
        }
        let product = MarketplaceProduct {
            id: Uuid::now_v7().to_string(),
            name: listing.name,
            description: listing.description,
            price: listing.price,
            image: listing.image,
            owner_id: owner_id.to_string(),
            owner_name: listing.owner_name,
            owner_phone: listing.owner_phone,
            city: listing.city,
            state: listing.state,
            created_at: self.clock.now_millis(),
        };
        self.store.update(keys::MARKETPLACE, Vec::new, |all: &mut Vec<MarketplaceProduct>| {
            all.insert(0, product.clone());
            true
        })?;
        info!(id = %product.id, "listing added");
        Ok(product)
    }

    /// Replace the editable fields of a listing. The owner and creation time
    /// of the stored listing are kept.
    #[instrument(skip(self, product), fields(id = %product.id))]
    pub fn update(&self, owner_id: &str, product: MarketplaceProduct) -> StoreResult<MarketplaceProduct> {
        let mut outcome: StoreResult<MarketplaceProduct> = Err(not_found(&product.id));
        self.store.update(keys::MARKETPLACE, Vec::new, |all: &mut Vec<MarketplaceProduct>| {
            let Some(existing) = all.iter_mut().find(|p| p.id == product.id) else {
                outcome = Err(not_found(&product.id));
                return false;
            };
            if existing.owner_id != owner_id {
                outcome = Err(not_owner(&product.id, owner_id));
                return false;
            }
            let updated = MarketplaceProduct {
                owner_id: existing.owner_id.clone(),
                created_at: existing.created_at,
                ..product.clone()
            };
            *existing = updated.clone();
            outcome = Ok(updated);
            true
        })?;
        if let Err(e) = &outcome {
            warn!(error = %e, "listing update rejected");
        }
        outcome
    }

    /// Remove a listing owned by `owner_id`.
    #[instrument(skip(self))]
    pub fn delete(&self, id: &str, owner_id: &str) -> StoreResult<()> {
        let mut outcome = Ok(());
        self.store.update(keys::MARKETPLACE, Vec::new, |all: &mut Vec<MarketplaceProduct>| {
            match all.iter().position(|p| p.id == id) {
                None => {
                    outcome = Err(not_found(id));
                    false
                }
                Some(index) if all[index].owner_id != owner_id => {
                    outcome = Err(not_owner(id, owner_id));
                    false
                }
                Some(index) => {
                    all.remove(index);
                    outcome = Ok(());
                    true
                }
            }
        })?;
        if let Err(e) = &outcome {
            warn!(error = %e, "listing delete rejected");
        }
        outcome
    }
}

fn not_found(id: &str) -> StoreError {
    StoreError::NotFound {
        entity: "listing",
        id: id.to_string(),
    }
}

fn not_owner(id: &str, owner_id: &str) -> StoreError {
    StoreError::NotOwner {
        entity: "listing",
        id: id.to_string(),
        owner: owner_id.to_string(),
    }
}

// ── tests ────────────────────────────────────────────────────────────
