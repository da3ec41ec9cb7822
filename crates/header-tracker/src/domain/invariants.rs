//! Invariants of the tip state machine.

use super::{TipState, TipTransition};

/// Monotonic tip.
///
/// The tip height after an observation is never below the height before it.
pub fn invariant_monotonic_tip(before: &TipState, after: &TipState) -> bool {
    after.tip_height() >= before.tip_height()
}

/// Previous tip continuity.
///
/// After an advance, `previous` is exactly the tip held before the advance.
pub fn invariant_previous_is_prior_tip(
    before: &TipState,
    transition: &TipTransition,
    after: &TipState,
) -> bool {
    match transition {
        TipTransition::Advanced { previous, .. } => {
            previous.as_ref() == before.current() && after.previous() == before.current()
        }
        TipTransition::Unchanged => before == after,
    }
}
