//! Vote sessions
//!
//! A session binds one wallet to its carts. Carts persist per owner, so a
//! new session for the same wallet picks up where the last one stopped.
//! Every mutation is written through to the store.

use alloy_primitives::U256;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use super::cart::{CartItemDraft, MultiCart, VoteCartItem};
use super::error::{CartError, StoreError};
use super::store::{CartStore, JsonFileCartStore, MemoryCartStore};
use super::types::{Owner, TermId};

/// Where session carts are kept
#[derive(Debug, Clone)]
pub enum StoreBackend {
    Memory,
    /// One subdirectory per owner under `root`
    Directory { root: PathBuf, prefix: String },
}

impl StoreBackend {
    fn open(&self, owner: Owner) -> Result<Arc<dyn CartStore>, StoreError> {
        match self {
            StoreBackend::Memory => Ok(Arc::new(MemoryCartStore::new())),
            StoreBackend::Directory { root, prefix } => {
                let dir = root.join(format!("{:#x}", owner));
                Ok(Arc::new(JsonFileCartStore::open(dir, prefix.clone())?))
            }
        }
    }
}

pub struct VoteSession {
    pub id: String,
    pub owner: Owner,
    pub carts: MultiCart,
    pub created_at: Instant,
    store: Arc<dyn CartStore>,
}

impl VoteSession {
    /// Split borrow for the executor: carts mutably, store shared
    pub fn carts_and_store(&mut self) -> (&mut MultiCart, &dyn CartStore) {
        (&mut self.carts, self.store.as_ref())
    }

    pub fn add_item(
        &mut self,
        subject_id: TermId,
        subject_name: &str,
        draft: CartItemDraft,
    ) -> Result<String, CartError> {
        self.write_through(&subject_id, |carts| carts.add(subject_id, subject_name, draft))
    }

    pub fn remove_item(&mut self, subject_id: &TermId, item_id: &str) -> Result<VoteCartItem, CartError> {
        self.write_through(subject_id, |carts| carts.remove(subject_id, item_id))
    }

    pub fn update_amount(
        &mut self,
        subject_id: &TermId,
        item_id: &str,
        amount: U256,
    ) -> Result<(), CartError> {
        self.write_through(subject_id, |carts| carts.update_amount(subject_id, item_id, amount))
    }

    pub fn clear_founder(&mut self, subject_id: &TermId) -> Result<(), CartError> {
        self.store.delete(subject_id)?;
        self.carts.clear_founder(subject_id);
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), CartError> {
        for cart in self.carts.carts() {
            self.store.delete(&cart.subject_id)?;
        }
        self.carts.clear();
        Ok(())
    }

    /// Apply `change` and save the subject's cart. Memory is restored when
    /// either fails, so it never runs ahead of the store.
    fn write_through<T>(
        &mut self,
        subject_id: &TermId,
        change: impl FnOnce(&mut MultiCart) -> Result<T, CartError>,
    ) -> Result<T, CartError> {
        let before = self.carts.clone();
        let result = change(&mut self.carts).and_then(|out| self.persist(subject_id).map(|()| out));
        if let Err(e) = &result {
            tracing::warn!("cart change for {} not applied: {}", subject_id, e);
            self.carts = before;
        }
        result
    }

    fn persist(&self, subject_id: &TermId) -> Result<(), CartError> {
        match self.carts.get(subject_id) {
            Some(cart) => self.store.save(cart)?,
            None => self.store.delete(subject_id)?,
        }
        Ok(())
    }
}

/// Session store keyed by session id
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<RwLock<VoteSession>>>>,
    backend: StoreBackend,
}

impl SessionManager {
    pub fn new(backend: StoreBackend) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            backend,
        }
    }

    /// Create a session for `owner`, reloading any carts it left behind
    pub async fn create_session(&self, owner: Owner) -> Result<String, StoreError> {
        let store = self.backend.open(owner)?;
        let carts = MultiCart::from_carts(store.load_all()?);
        if !carts.is_empty() {
            tracing::info!(
                "Restored {} cart item(s) across {} founder(s) for {}",
                carts.item_count(),
                carts.founders().len(),
                owner
            );
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let session = VoteSession {
            id: session_id.clone(),
            owner,
            carts,
            created_at: Instant::now(),
            store,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.clone(), Arc::new(RwLock::new(session)));

        Ok(session_id)
    }

    /// Get a session by ID
    pub async fn get_session(&self, session_id: &str) -> Option<Arc<RwLock<VoteSession>>> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
