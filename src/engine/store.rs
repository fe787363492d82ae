//! Cart persistence
//!
//! One record per subject, keyed by a fixed prefix plus the subject id.
//! A reload reconstructs the exact item list, amounts included.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::cart::VoteCart;
use super::error::StoreError;
use super::types::TermId;

/// Default key prefix for cart records
pub const DEFAULT_KEY_PREFIX: &str = "vote_cart_";

pub trait CartStore: Send + Sync {
    fn save(&self, cart: &VoteCart) -> Result<(), StoreError>;
    fn load(&self, subject_id: &TermId) -> Result<Option<VoteCart>, StoreError>;
    fn delete(&self, subject_id: &TermId) -> Result<(), StoreError>;
    fn load_all(&self) -> Result<Vec<VoteCart>, StoreError>;
}

/// Record key for a subject
pub fn cart_key(prefix: &str, subject_id: &TermId) -> String {
    format!("{}{}", prefix, subject_id)
}

/// JSON files in a directory, one per subject: `{prefix}{subject_id}.json`
pub struct JsonFileCartStore {
    dir: PathBuf,
    prefix: String,
}

impl JsonFileCartStore {
    /// Create the store, creating `dir` if needed
    pub fn open(dir: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            prefix: prefix.into(),
        })
    }

    fn path_for(&self, subject_id: &TermId) -> PathBuf {
        self.dir
            .join(format!("{}.json", cart_key(&self.prefix, subject_id)))
    }
}

impl CartStore for JsonFileCartStore {
    fn save(&self, cart: &VoteCart) -> Result<(), StoreError> {
        if cart.is_empty() {
            return self.delete(&cart.subject_id);
        }
        let content = serde_json::to_string_pretty(cart)?;
        // Write-then-rename so a crash never leaves a truncated record
        let path = self.path_for(&cart.subject_id);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn load(&self, subject_id: &TermId) -> Result<Option<VoteCart>, StoreError> {
        let path = self.path_for(subject_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn delete(&self, subject_id: &TermId) -> Result<(), StoreError> {
        let path = self.path_for(subject_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load_all(&self) -> Result<Vec<VoteCart>, StoreError> {
        let mut carts = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with(&self.prefix) || !name.ends_with(".json") {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<VoteCart>(&content) {
                Ok(cart) => carts.push(cart),
                Err(e) => {
                    tracing::warn!("Skipping unreadable cart record {}: {}", path.display(), e);
                }
            }
        }
        carts.sort_by_key(|c| c.subject_id);
        Ok(carts)
    }
}

/// In-process store for tests and ephemeral sessions
pub struct MemoryCartStore {
    records: Mutex<HashMap<String, String>>,
    prefix: String,
}

impl MemoryCartStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryCartStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CartStore for MemoryCartStore {
    fn save(&self, cart: &VoteCart) -> Result<(), StoreError> {
        if cart.is_empty() {
            return self.delete(&cart.subject_id);
        }
        let content = serde_json::to_string(cart)?;
        self.records()
            .insert(cart_key(&self.prefix, &cart.subject_id), content);
        Ok(())
    }

    fn load(&self, subject_id: &TermId) -> Result<Option<VoteCart>, StoreError> {
        match self.records().get(&cart_key(&self.prefix, subject_id)) {
            Some(content) => Ok(Some(serde_json::from_str(content)?)),
            None => Ok(None),
        }
    }

    fn delete(&self, subject_id: &TermId) -> Result<(), StoreError> {
        self.records().remove(&cart_key(&self.prefix, subject_id));
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<VoteCart>, StoreError> {
        let mut carts = self
            .records()
            .values()
            .map(|c| serde_json::from_str::<VoteCart>(c))
            .collect::<Result<Vec<_>, _>>()?;
        carts.sort_by_key(|c| c.subject_id);
        Ok(carts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cart::CartItemDraft;
    use crate::engine::types::{atom_id, CurveId, Direction, Position, Ref};
    use alloy_primitives::U256;

    fn sample_cart() -> VoteCart {
        let mut cart = VoteCart::new(atom_id("founder"), "Founder");
        cart.add(CartItemDraft {
            totem: Ref::ByLabel("Lion".into()),
            totem_name: None,
            predicate: Ref::Existing(atom_id("represented_by")),
            direction: Direction::Support,
            curve_id: CurveId::Linear,
            // larger than u128
            amount: U256::from(u128::MAX) * U256::from(3u8),
            current_position: None,
        })
        .unwrap();
        cart.add(CartItemDraft {
            totem: Ref::Existing(atom_id("Owl")),
            totem_name: Some("Owl".into()),
            predicate: Ref::Existing(atom_id("represented_by")),
            direction: Direction::Oppose,
            curve_id: CurveId::Progressive,
            amount: U256::from(1234u64),
            current_position: Some(Position {
                direction: Direction::Oppose,
                curve_id: CurveId::Progressive,
                shares: U256::from(77u64),
            }),
        })
        .unwrap();
        cart
    }

    #[test]
    fn test_file_store_roundtrip_keeps_order_and_amounts() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCartStore::open(dir.path(), DEFAULT_KEY_PREFIX).unwrap();
        let cart = sample_cart();

        store.save(&cart).unwrap();
        let loaded = store.load(&cart.subject_id).unwrap().unwrap();
        assert_eq!(loaded, cart);

        let expected_file = dir
            .path()
            .join(format!("{}.json", cart_key(DEFAULT_KEY_PREFIX, &cart.subject_id)));
        assert!(expected_file.exists());
        assert_eq!(store.load_all().unwrap(), vec![cart.clone()]);

        store.delete(&cart.subject_id).unwrap();
        assert!(store.load(&cart.subject_id).unwrap().is_none());
        // deleting twice is fine
        store.delete(&cart.subject_id).unwrap();
    }

    #[test]
    fn test_saving_empty_cart_removes_record() {
        let store = MemoryCartStore::new();
        let mut cart = sample_cart();
        store.save(&cart).unwrap();
        cart.clear();
        store.save(&cart).unwrap();
        assert!(store.load(&cart.subject_id).unwrap().is_none());
        assert!(store.load_all().unwrap().is_empty());
    }
}
