//! Curve availability
//!
//! A user may hold support on one curve and oppose on the other for the same
//! triple. The only forbidden state is both sides on the same curve. Given a
//! requested direction, a curve is blocked when the user already holds, or
//! has in the cart, the opposite side on that curve.
//!
//! Pure: the caller supplies the position snapshot and the cart.

use serde::{Deserialize, Serialize};

use super::cart::VoteCart;
use super::types::{CurveId, Direction, Position, TermId};

/// What stands in the way on one curve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveBlockers {
    pub has_opposite_position: bool,
    pub has_opposite_cart_item: bool,
}

impl CurveBlockers {
    pub fn is_blocked(&self) -> bool {
        self.has_opposite_position || self.has_opposite_cart_item
    }

    fn reason(&self, direction: Direction, curve: CurveId) -> Option<String> {
        let cause = match (self.has_opposite_position, self.has_opposite_cart_item) {
            (true, true) => "opposite position held and opposite vote in cart",
            (true, false) => "opposite position held",
            (false, true) => "opposite vote in cart",
            (false, false) => return None,
        };
        Some(format!(
            "{} blocked on {}: {}",
            direction.as_str(),
            curve.as_str(),
            cause
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveAvailability {
    pub linear: bool,
    pub progressive: bool,
    pub blocked_reason: Option<String>,
    /// No curve is usable without redeeming first
    pub all_blocked: bool,
}

impl CurveAvailability {
    pub fn is_available(&self, curve: CurveId) -> bool {
        match curve {
            CurveId::Linear => self.linear,
            CurveId::Progressive => self.progressive,
        }
    }

    /// First usable curve, linear preferred
    pub fn preferred_curve(&self) -> Option<CurveId> {
        if self.linear {
            Some(CurveId::Linear)
        } else if self.progressive {
            Some(CurveId::Progressive)
        } else {
            None
        }
    }
}

/// Which curves are open for `direction`
pub fn resolve(
    direction: Direction,
    linear: CurveBlockers,
    progressive: CurveBlockers,
) -> CurveAvailability {
    let reasons: Vec<String> = [
        linear.reason(direction, CurveId::Linear),
        progressive.reason(direction, CurveId::Progressive),
    ]
    .into_iter()
    .flatten()
    .collect();

    CurveAvailability {
        linear: !linear.is_blocked(),
        progressive: !progressive.is_blocked(),
        blocked_reason: if reasons.is_empty() {
            None
        } else {
            Some(reasons.join("; "))
        },
        all_blocked: linear.is_blocked() && progressive.is_blocked(),
    }
}

/// Blockers on `curve` for a vote in `direction`, from a position snapshot
/// and the cart
pub fn blockers_for(
    direction: Direction,
    curve: CurveId,
    positions: &[Position],
    cart: Option<&VoteCart>,
    predicate_id: TermId,
    totem_id: TermId,
) -> CurveBlockers {
    let opposite = direction.opposite();
    CurveBlockers {
        has_opposite_position: positions
            .iter()
            .any(|p| p.curve_id == curve && p.direction == opposite && !p.shares.is_zero()),
        has_opposite_cart_item: cart
            .map(|c| c.has_opposite_item(predicate_id, totem_id, curve, direction))
            .unwrap_or(false),
    }
}

/// Resolve both curves from snapshots in one go
pub fn resolve_for(
    direction: Direction,
    positions: &[Position],
    cart: Option<&VoteCart>,
    predicate_id: TermId,
    totem_id: TermId,
) -> CurveAvailability {
    resolve(
        direction,
        blockers_for(direction, CurveId::Linear, positions, cart, predicate_id, totem_id),
        blockers_for(direction, CurveId::Progressive, positions, cart, predicate_id, totem_id),
    )
}
