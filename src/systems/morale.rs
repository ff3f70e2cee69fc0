//! Morale and suppression engine.
//!
//! Kept from `systems::morale`'s shape: small, separately testable pure
//! functions (threshold, check, rally) rather than one monolithic system —
//! generalized here to the 2d6 check, chain routing, rally, and
//! interdictor-trap mechanics.

use crate::doctrine::SuppressionState;

/// Inputs to one unit's morale check.
pub struct MoraleCheckInput {
    pub leadership: f32,
    pub hp_fraction: f32,
    pub fatigue: f32,
    pub routing_nearby: u32,
    pub suppression: f32,
    pub roll_2d6: u32,
}

/// Sum of the threshold modifiers: hp penalty, extra HP-band
/// penalties, fatigue penalty, chain-routing penalty.
pub fn morale_threshold(input: &MoraleCheckInput) -> f32 {
    let mut threshold = input.leadership;
    threshold -= ((1.0 - input.hp_fraction) * 5.0).floor();
    if input.hp_fraction < 0.25 {
        threshold -= 2.0;
    } else if input.hp_fraction < 0.5 {
        threshold -= 1.0;
    }
    if input.fatigue > 0.8 {
        threshold -= 2.0;
    } else if input.fatigue > 0.5 {
        threshold -= 1.0;
    }
    threshold -= (input.routing_nearby / 2).min(3) as f32;
    threshold
}

/// Result of a morale check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoraleOutcome {
    Held,
    /// Forced to route — caller sets `is_routing = true` and emits
    /// `morale_failure`.
    Routs,
    /// An enemy interdictor prevented routing; forced `hp <- hp/2` instead.
    Trapped,
}

/// `roll > threshold AND suppression > 0` triggers a failed check.
/// `interdictor_nearby` is an enemy interdictor in range.
pub fn check_morale(input: &MoraleCheckInput, interdictor_nearby: bool) -> MoraleOutcome {
    let threshold = morale_threshold(input);
    if (input.roll_2d6 as f32) > threshold && input.suppression > 0.0 {
        if interdictor_nearby {
            MoraleOutcome::Trapped
        } else {
            MoraleOutcome::Routs
        }
    } else {
        MoraleOutcome::Held
    }
}

/// Rally condition while routing: suppression
/// below the ceiling, grace period elapsed since last damage, morale
/// recovered above the rally threshold.
pub fn can_rally(suppression: f32, time_since_damage: f32, morale: f32, rally_suppression_ceiling: f32, rally_grace_seconds: f32, rally_threshold: f32) -> bool {
    suppression < rally_suppression_ceiling && time_since_damage > rally_grace_seconds && morale >= rally_threshold
}

/// Per-round / per-tick-second morale delta from suppression state.
pub fn suppression_morale_delta(state: SuppressionState) -> f32 {
    state.modifiers().2
}

#[cfg(test)]
mod tests {
    use super::*;

    // suppression=75, leadership=4, hp=20/100, roll=12 -> routs,
    // emits morale_failure.
    #[test]
    fn pinned_unit_low_hp_bad_roll_routs() {
        let input = MoraleCheckInput {
            leadership: 4.0,
            hp_fraction: 0.2,
            fatigue: 0.0,
            routing_nearby: 0,
            suppression: 75.0,
            roll_2d6: 12,
        };
        assert_eq!(check_morale(&input, false), MoraleOutcome::Routs);
    }

    // interdictor present -> trapped, hp halved instead of routing.
    #[test]
    fn interdictor_traps_instead_of_routing() {
        let input = MoraleCheckInput {
            leadership: 4.0,
            hp_fraction: 0.2,
            fatigue: 0.0,
            routing_nearby: 0,
            suppression: 75.0,
            roll_2d6: 12,
        };
        assert_eq!(check_morale(&input, true), MoraleOutcome::Trapped);
    }

    #[test]
    fn zero_suppression_never_triggers_a_check() {
        let input = MoraleCheckInput { leadership: 0.0, hp_fraction: 0.0, fatigue: 1.0, routing_nearby: 10, suppression: 0.0, roll_2d6: 12 };
        assert_eq!(check_morale(&input, false), MoraleOutcome::Held);
    }

    #[test]
    fn chain_routing_penalty_caps_at_three() {
        let base = MoraleCheckInput { leadership: 10.0, hp_fraction: 1.0, fatigue: 0.0, routing_nearby: 0, suppression: 1.0, roll_2d6: 0 };
        let many_routing = MoraleCheckInput { routing_nearby: 20, ..base };
        assert_eq!(morale_threshold(&base), 10.0);
        assert_eq!(morale_threshold(&many_routing), 7.0);
    }

    #[test]
    fn rally_requires_all_three_conditions() {
        assert!(can_rally(10.0, 5.0, 60.0, 25.0, 3.0, 50.0));
        assert!(!can_rally(30.0, 5.0, 60.0, 25.0, 3.0, 50.0));
        assert!(!can_rally(10.0, 1.0, 60.0, 25.0, 3.0, 50.0));
        assert!(!can_rally(10.0, 5.0, 40.0, 25.0, 3.0, 50.0));
    }
}
