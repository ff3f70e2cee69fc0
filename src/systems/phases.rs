//! Phase executor.
//!
//! Grounded on the `systems::performance`-style staged schedule:
//! a fixed, ordered list of named phases run every round, where a single
//! phase's internal error is logged and swallowed rather than aborting the
//! whole round ("a per-phase exception must not abort the round").

use tracing::error;

/// Default phase order: orbital support fires on its own
/// interval, then abilities, movement, shooting, melee, morale.
pub const DEFAULT_PHASE_ORDER: &[Phase] = &[
    Phase::OrbitalSupport,
    Phase::Ability,
    Phase::Movement,
    Phase::Shooting,
    Phase::Melee,
    Phase::Morale,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    OrbitalSupport,
    Ability,
    Movement,
    Shooting,
    Melee,
    Morale,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::OrbitalSupport => "orbital_support",
            Phase::Ability => "ability",
            Phase::Movement => "movement",
            Phase::Shooting => "shooting",
            Phase::Melee => "melee",
            Phase::Morale => "morale",
        }
    }
}

/// Outcome of running one phase this round.
pub enum PhaseOutcome {
    Ran,
    /// Orbital support was skipped because its interval hasn't elapsed.
    Skipped,
    /// The phase raised an error; logged, round continues.
    Failed,
}

/// Runs `order` in sequence, calling `run_phase(phase) -> Result<(), E>` for
/// each; a phase failure is logged and the next phase still runs
///. Returns one outcome per phase, in order.
pub fn execute_round<E: std::fmt::Display>(
    order: &[Phase],
    mut should_run: impl FnMut(Phase) -> bool,
    mut run_phase: impl FnMut(Phase) -> Result<(), E>,
) -> Vec<(Phase, PhaseOutcome)> {
    let mut outcomes = Vec::with_capacity(order.len());
    for &phase in order {
        if !should_run(phase) {
            outcomes.push((phase, PhaseOutcome::Skipped));
            continue;
        }
        match run_phase(phase) {
            Ok(()) => outcomes.push((phase, PhaseOutcome::Ran)),
            Err(e) => {
                error!(phase = phase.name(), error = %e, "phase failed, continuing round");
                outcomes.push((phase, PhaseOutcome::Failed));
            }
        }
    }
    outcomes
}

/// Tracks whether the orbital-support phase's interval has elapsed, per
/// `BattleConfig::orbital_support_interval`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrbitalSupportGate {
    pub time_since_last: f32,
}

impl OrbitalSupportGate {
    pub fn tick(&mut self, dt: f32, interval: f32) -> bool {
        self.time_since_last += dt;
        if self.time_since_last >= interval {
            self.time_since_last = 0.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;
    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "boom")
        }
    }

    #[test]
    fn failed_phase_does_not_stop_the_round() {
        let order = [Phase::Movement, Phase::Shooting, Phase::Melee];
        let outcomes = execute_round(
            &order,
            |_| true,
            |phase| if matches!(phase, Phase::Shooting) { Err(Boom) } else { Ok(()) },
        );
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0].1, PhaseOutcome::Ran));
        assert!(matches!(outcomes[1].1, PhaseOutcome::Failed));
        assert!(matches!(outcomes[2].1, PhaseOutcome::Ran));
    }

    #[test]
    fn default_order_starts_with_orbital_support() {
        assert_eq!(DEFAULT_PHASE_ORDER[0], Phase::OrbitalSupport);
        assert_eq!(DEFAULT_PHASE_ORDER[5], Phase::Morale);
    }

    #[test]
    fn orbital_support_gate_fires_on_interval() {
        let mut gate = OrbitalSupportGate::default();
        assert!(!gate.tick(5.0, 10.0));
        assert!(gate.tick(5.0, 10.0));
        assert!(!gate.tick(1.0, 10.0));
    }

    #[test]
    fn skipped_phase_is_reported_distinctly() {
        let order = [Phase::OrbitalSupport];
        let outcomes = execute_round::<Boom>(&order, |_| false, |_| Ok(()));
        assert!(matches!(outcomes[0].1, PhaseOutcome::Skipped));
    }
}
