//! Protocol vocabulary shared by the engine
//!
//! Term ids, curves, directions, positions and the per-pass contract
//! configuration. Atom and triple ids are derived deterministically so a
//! label can be resolved to its canonical id before the atom exists on-chain.

use alloy_primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Canonical on-chain identifier of an atom, a triple, or a triple's counter vault
pub type TermId = B256;

/// Wallet that owns positions and pays for calls
pub type Owner = Address;

pub type TxHash = B256;

/// Domain tag mixed into a triple id to derive its AGAINST vault
const COUNTER_TAG: &[u8] = b"counter";

/// One of the two independent bonding curves a vault can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveId {
    Linear,
    Progressive,
}

impl CurveId {
    pub fn as_str(&self) -> &'static str {
        match self {
            CurveId::Linear => "linear",
            CurveId::Progressive => "progressive",
        }
    }

    pub fn all() -> &'static [CurveId] {
        &[CurveId::Linear, CurveId::Progressive]
    }
}

/// Side of a claim a position backs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Support,
    Oppose,
}

impl Direction {
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Support => Direction::Oppose,
            Direction::Oppose => Direction::Support,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Support => "support",
            Direction::Oppose => "oppose",
        }
    }
}

/// A vault address: one term on one curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VaultKey {
    pub term_id: TermId,
    pub curve_id: CurveId,
}

impl VaultKey {
    pub fn new(term_id: TermId, curve_id: CurveId) -> Self {
        Self { term_id, curve_id }
    }
}

/// Vault totals as read directly from the vault contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VaultState {
    #[serde(with = "decimal")]
    pub total_assets: U256,
    #[serde(with = "decimal")]
    pub total_shares: U256,
}

/// A position snapshot read from chain. Never mutated by the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub direction: Direction,
    pub curve_id: CurveId,
    #[serde(with = "decimal")]
    pub shares: U256,
}

/// Protocol costs, refreshed once per planning pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    #[serde(with = "decimal")]
    pub triple_base_cost: U256,
    #[serde(with = "decimal")]
    pub atom_cost: U256,
    #[serde(with = "decimal")]
    pub min_deposit: U256,
    /// Entry fee taken from every deposit, in basis points
    pub entry_fee_bps: u16,
}

/// Reference to an atom as supplied by a caller: an id that already exists,
/// or a label to resolve (and possibly create).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Ref {
    Existing(TermId),
    ByLabel(String),
}

/// A `Ref` after resolution. `label` is kept for atoms that may need creating.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AtomRef {
    pub id: TermId,
    pub label: Option<String>,
}

impl Ref {
    pub fn resolve(&self) -> AtomRef {
        match self {
            Ref::Existing(id) => AtomRef {
                id: *id,
                label: None,
            },
            Ref::ByLabel(label) => AtomRef {
                id: atom_id(label),
                label: Some(label.clone()),
            },
        }
    }
}

/// Atom id for a label: keccak256 of the atom data
pub fn atom_id(label: &str) -> TermId {
    keccak256(label.as_bytes())
}

/// Triple id: keccak256(subject || predicate || object)
pub fn triple_id(subject: TermId, predicate: TermId, object: TermId) -> TermId {
    let mut buf = [0u8; 96];
    buf[..32].copy_from_slice(subject.as_slice());
    buf[32..64].copy_from_slice(predicate.as_slice());
    buf[64..].copy_from_slice(object.as_slice());
    keccak256(buf)
}

/// Id of the AGAINST vault paired with a triple
pub fn counter_term_id(triple: TermId) -> TermId {
    let mut buf = Vec::with_capacity(COUNTER_TAG.len() + 32);
    buf.extend_from_slice(COUNTER_TAG);
    buf.extend_from_slice(triple.as_slice());
    keccak256(buf)
}

/// Vault term a deposit in `direction` lands in
pub fn vault_term(triple: TermId, direction: Direction) -> TermId {
    match direction {
        Direction::Support => triple,
        Direction::Oppose => counter_term_id(triple),
    }
}

/// Serde adapter: U256 as a base-10 string
pub mod decimal {
    use alloy_primitives::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    /// Parse a base-10 amount string
    pub fn parse(raw: &str) -> Result<U256, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid decimal amount: {:?}", raw));
        }
        U256::from_str_radix(trimmed, 10).map_err(|e| format!("invalid decimal amount {:?}: {}", raw, e))
    }

    /// Same adapter for `Vec<U256>`
    pub mod vec {
        use alloy_primitives::U256;
        use serde::{de::Error, ser::SerializeSeq, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(values: &[U256], serializer: S) -> Result<S::Ok, S::Error> {
            let mut seq = serializer.serialize_seq(Some(values.len()))?;
            for v in values {
                seq.serialize_element(&v.to_string())?;
            }
            seq.end()
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<U256>, D::Error> {
            let raw = Vec::<String>::deserialize(deserializer)?;
            raw.iter()
                .map(|s| super::parse(s).map_err(D::Error::custom))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_resolution_is_deterministic() {
        let a = Ref::ByLabel("Lion".to_string()).resolve();
        let b = Ref::ByLabel("Lion".to_string()).resolve();
        assert_eq!(a.id, b.id);
        assert_eq!(a.label.as_deref(), Some("Lion"));

        let existing = Ref::Existing(a.id).resolve();
        assert_eq!(existing.id, a.id);
        assert!(existing.label.is_none());
    }

    #[test]
    fn test_counter_vault_differs_from_triple() {
        let t = triple_id(atom_id("s"), atom_id("p"), atom_id("o"));
        assert_ne!(counter_term_id(t), t);
        assert_eq!(vault_term(t, Direction::Support), t);
        assert_eq!(vault_term(t, Direction::Oppose), counter_term_id(t));
    }

    #[test]
    fn test_decimal_parse() {
        assert_eq!(decimal::parse("1000").unwrap(), U256::from(1000u64));
        assert!(decimal::parse("0x10").is_err());
        assert!(decimal::parse("").is_err());
        assert!(decimal::parse("-1").is_err());
    }
}
