//! Triple deduplication
//!
//! Collapses cart items into unique (predicate, object) triples. One triple
//! has an independent vault per curve, so items that differ only by curve or
//! direction land in the same group. The subject is the cart's, so it is not
//! part of the key.

use std::collections::HashMap;

use super::cart::{VoteCart, VoteCartItem};
use super::types::{triple_id, CurveId, Direction, TermId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueTriple {
    pub subject_id: TermId,
    pub predicate_id: TermId,
    pub object_id: TermId,
    pub object_name: String,
    /// 1 to 4 items, in cart order
    pub items: Vec<VoteCartItem>,
}

impl UniqueTriple {
    pub fn triple_id(&self) -> TermId {
        triple_id(self.subject_id, self.predicate_id, self.object_id)
    }

    /// Every item is a linear-curve support
    pub fn is_linear_support_only(&self) -> bool {
        self.items
            .iter()
            .all(|i| i.curve_id == CurveId::Linear && i.direction == Direction::Support)
    }

    pub fn is_proposal(&self) -> bool {
        self.items.iter().any(|i| i.is_proposal())
    }
}

/// Group cart items by (predicate, totem), preserving first-seen order
pub fn deduplicate(cart: &VoteCart) -> Vec<UniqueTriple> {
    let mut groups: Vec<UniqueTriple> = Vec::new();
    let mut index: HashMap<(TermId, TermId), usize> = HashMap::new();

    for item in &cart.items {
        let key = (item.predicate_id, item.totem_id);
        match index.get(&key) {
            Some(&i) => groups[i].items.push(item.clone()),
            None => {
                index.insert(key, groups.len());
                groups.push(UniqueTriple {
                    subject_id: cart.subject_id,
                    predicate_id: item.predicate_id,
                    object_id: item.totem_id,
                    object_name: item.totem_name.clone(),
                    items: vec![item.clone()],
                });
            }
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cart::CartItemDraft;
    use crate::engine::types::{atom_id, Ref};
    use alloy_primitives::U256;

    fn add(cart: &mut VoteCart, predicate: &str, totem: &str, curve: CurveId, direction: Direction) {
        cart.add(CartItemDraft {
            totem: Ref::ByLabel(totem.to_string()),
            totem_name: None,
            predicate: Ref::Existing(atom_id(predicate)),
            direction,
            curve_id: curve,
            amount: U256::from(1u8),
            current_position: None,
        })
        .unwrap();
    }

    #[test]
    fn test_same_triple_different_curves_share_a_group() {
        let mut cart = VoteCart::new(atom_id("founder"), "Founder");
        add(&mut cart, "represented_by", "Lion", CurveId::Linear, Direction::Support);
        add(&mut cart, "represented_by", "Owl", CurveId::Linear, Direction::Support);
        add(&mut cart, "represented_by", "Lion", CurveId::Progressive, Direction::Oppose);
        add(&mut cart, "embodies", "Lion", CurveId::Linear, Direction::Support);

        let triples = deduplicate(&cart);
        assert_eq!(triples.len(), 3);
        // first-seen order
        assert_eq!(triples[0].object_name, "Lion");
        assert_eq!(triples[0].items.len(), 2);
        assert_eq!(triples[1].object_name, "Owl");
        assert_eq!(triples[2].predicate_id, atom_id("embodies"));

        assert!(!triples[0].is_linear_support_only());
        assert!(triples[0].is_proposal());
        assert!(triples[1].is_linear_support_only());

        let total: usize = triples.iter().map(|t| t.items.len()).sum();
        assert_eq!(total, cart.len());
    }

    #[test]
    fn test_empty_cart_has_no_triples() {
        let cart = VoteCart::new(atom_id("founder"), "Founder");
        assert!(deduplicate(&cart).is_empty());
    }
}
