//! Vote cart model
//!
//! One `VoteCart` per subject (founder), collected in a `MultiCart`. Items are
//! keyed by (predicate, totem, curve, direction): adding the same key again
//! replaces the amount instead of creating a second item.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::amount_math;
use super::error::{CartError, ValidationError};
use super::types::{decimal, CurveId, Direction, Position, Ref, TermId};

/// One pending position change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCartItem {
    pub id: String,
    pub subject_id: TermId,
    pub totem_id: TermId,
    pub totem_name: String,
    /// Atom data to create the totem from, when the caller referenced it by label
    #[serde(default)]
    pub totem_label: Option<String>,
    pub predicate_id: TermId,
    pub direction: Direction,
    pub curve_id: CurveId,
    #[serde(with = "decimal")]
    pub amount: U256,
    #[serde(default)]
    pub current_position: Option<Position>,
}

impl VoteCartItem {
    fn same_slot(&self, predicate: TermId, totem: TermId, curve: CurveId, direction: Direction) -> bool {
        self.predicate_id == predicate
            && self.totem_id == totem
            && self.curve_id == curve
            && self.direction == direction
    }

    /// Whether the item came in as a new-claim proposal (totem named by label)
    pub fn is_proposal(&self) -> bool {
        self.totem_label.is_some()
    }
}

/// Input for adding an item; refs are resolved here, at the cart boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemDraft {
    pub totem: Ref,
    #[serde(default)]
    pub totem_name: Option<String>,
    pub predicate: Ref,
    pub direction: Direction,
    pub curve_id: CurveId,
    #[serde(with = "decimal")]
    pub amount: U256,
    #[serde(default)]
    pub current_position: Option<Position>,
}

/// Pending votes for one subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCart {
    pub subject_id: TermId,
    pub subject_name: String,
    pub items: Vec<VoteCartItem>,
}

impl VoteCart {
    pub fn new(subject_id: TermId, subject_name: impl Into<String>) -> Self {
        Self {
            subject_id,
            subject_name: subject_name.into(),
            items: Vec::new(),
        }
    }

    /// Add an item, or replace the amount of the item in the same slot.
    /// Returns the id of the stored item.
    pub fn add(&mut self, draft: CartItemDraft) -> Result<String, CartError> {
        let totem = draft.totem.resolve();
        let predicate = draft.predicate.resolve();

        if let Some(existing) = self.items.iter_mut().find(|i| {
            i.same_slot(predicate.id, totem.id, draft.curve_id, draft.direction)
        }) {
            existing.amount = draft.amount;
            if draft.current_position.is_some() {
                existing.current_position = draft.current_position;
            }
            return Ok(existing.id.clone());
        }

        let totem_name = draft
            .totem_name
            .or_else(|| totem.label.clone())
            .unwrap_or_else(|| totem.id.to_string());
        let item = VoteCartItem {
            id: uuid::Uuid::new_v4().to_string(),
            subject_id: self.subject_id,
            totem_id: totem.id,
            totem_name,
            totem_label: totem.label,
            predicate_id: predicate.id,
            direction: draft.direction,
            curve_id: draft.curve_id,
            amount: draft.amount,
            current_position: draft.current_position,
        };
        let id = item.id.clone();
        self.items.push(item);
        Ok(id)
    }

    pub fn remove(&mut self, item_id: &str) -> Result<VoteCartItem, CartError> {
        let idx = self
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| CartError::ItemNotFound(item_id.to_string()))?;
        Ok(self.items.remove(idx))
    }

    pub fn update_amount(&mut self, item_id: &str, amount: U256) -> Result<(), CartError> {
        if amount.is_zero() {
            return Err(ValidationError::ZeroAmount {
                item_id: item_id.to_string(),
            }
            .into());
        }
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| CartError::ItemNotFound(item_id.to_string()))?;
        item.amount = amount;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, item_id: &str) -> Option<&VoteCartItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn total(&self) -> U256 {
        amount_math::sum(self.items.iter().map(|i| &i.amount))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the cart already holds the other side of `direction` on `curve`
    /// for this totem
    pub fn has_opposite_item(
        &self,
        predicate_id: TermId,
        totem_id: TermId,
        curve_id: CurveId,
        direction: Direction,
    ) -> bool {
        self.items
            .iter()
            .any(|i| i.same_slot(predicate_id, totem_id, curve_id, direction.opposite()))
    }
}

/// All carts, keyed by subject id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiCart {
    carts: HashMap<TermId, VoteCart>,
}

impl MultiCart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_carts(carts: impl IntoIterator<Item = VoteCart>) -> Self {
        Self {
            carts: carts.into_iter().map(|c| (c.subject_id, c)).collect(),
        }
    }

    /// Cart for a subject, created empty on first touch
    pub fn cart_mut(&mut self, subject_id: TermId, subject_name: &str) -> &mut VoteCart {
        self.carts
            .entry(subject_id)
            .or_insert_with(|| VoteCart::new(subject_id, subject_name))
    }

    pub fn get(&self, subject_id: &TermId) -> Option<&VoteCart> {
        self.carts.get(subject_id)
    }

    pub fn get_mut(&mut self, subject_id: &TermId) -> Option<&mut VoteCart> {
        self.carts.get_mut(subject_id)
    }

    pub fn add(
        &mut self,
        subject_id: TermId,
        subject_name: &str,
        draft: CartItemDraft,
    ) -> Result<String, CartError> {
        self.cart_mut(subject_id, subject_name).add(draft)
    }

    pub fn remove(&mut self, subject_id: &TermId, item_id: &str) -> Result<VoteCartItem, CartError> {
        self.carts
            .get_mut(subject_id)
            .ok_or(CartError::FounderNotFound(*subject_id))?
            .remove(item_id)
    }

    pub fn update_amount(
        &mut self,
        subject_id: &TermId,
        item_id: &str,
        amount: U256,
    ) -> Result<(), CartError> {
        self.carts
            .get_mut(subject_id)
            .ok_or(CartError::FounderNotFound(*subject_id))?
            .update_amount(item_id, amount)
    }

    /// Drop every cart
    pub fn clear(&mut self) {
        self.carts.clear();
    }

    /// Drop one founder's cart
    pub fn clear_founder(&mut self, subject_id: &TermId) -> Option<VoteCart> {
        self.carts.remove(subject_id)
    }

    /// Founders with at least one item, ordered by id for deterministic runs
    pub fn founders(&self) -> Vec<TermId> {
        let mut ids: Vec<TermId> = self
            .carts
            .values()
            .filter(|c| !c.is_empty())
            .map(|c| c.subject_id)
            .collect();
        ids.sort();
        ids
    }

    pub fn carts(&self) -> impl Iterator<Item = &VoteCart> {
        self.carts.values()
    }

    pub fn total(&self) -> U256 {
        self.carts
            .values()
            .fold(U256::ZERO, |acc, c| acc.saturating_add(c.total()))
    }

    pub fn item_count(&self) -> usize {
        self.carts.values().map(|c| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }
}
