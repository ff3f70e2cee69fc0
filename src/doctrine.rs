//! Doctrine and other small shared enums.
//!
//! `Doctrine` modulates steering, target selection, and formation damage
//! multipliers — it is read by several modules, so it lives on its own
//! rather than inside any one of them, the same way `components.rs` stays
//! the shared vocabulary for `systems/*`.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Coarse behavioral mode of a faction or unit in combat.
#[derive(Component, Resource, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Doctrine {
    Charge,
    Kite,
    Defend,
    CaptureAndHold,
    Standard,
}

impl Default for Doctrine {
    fn default() -> Self {
        Doctrine::Standard
    }
}

/// Combat domain a unit belongs to; governs which kinematics/detection
/// defaults apply.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    Space,
    Ground,
}

/// Morale state machine: Steady, Shaken, Routing, Rallied.
/// `is_routing` on the unit is the authoritative flag the rest of the core
/// reads; this enum exists for reporting and for the rally/chain-routing
/// transition logic in `systems::morale`.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoraleState {
    Steady,
    Shaken,
    Routing,
    Rallied,
}

impl Default for MoraleState {
    fn default() -> Self {
        MoraleState::Steady
    }
}

/// Suppression state machine.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuppressionState {
    None,
    Suppressed,
    Pinned,
}

impl Default for SuppressionState {
    fn default() -> Self {
        SuppressionState::None
    }
}

impl SuppressionState {
    /// `>=75` pinned, `[25,75)` suppressed, `<25` neither.
    pub fn from_value(suppression: f32) -> Self {
        if suppression >= 75.0 {
            SuppressionState::Pinned
        } else if suppression >= 25.0 {
            SuppressionState::Suppressed
        } else {
            SuppressionState::None
        }
    }

    /// `(accuracy_mult, speed_mult, per_round_morale)` from 's table.
    pub fn modifiers(self) -> (f32, f32, f32) {
        match self {
            SuppressionState::Pinned => (0.50, 0.10, -5.0),
            SuppressionState::Suppressed => (0.90, 0.75, 0.0),
            SuppressionState::None => (1.0, 1.0, 0.0),
        }
    }

    pub fn is_pinned(self) -> bool {
        matches!(self, SuppressionState::Pinned)
    }

    pub fn is_suppressed(self) -> bool {
        matches!(self, SuppressionState::Pinned | SuppressionState::Suppressed)
    }
}

/// Weapon firing arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponArc {
    Front,
    Left,
    Right,
    Rear,
    Turret,
}

impl WeaponArc {
    /// `relative_bearing` is already normalized to `-180..180` degrees.
    pub fn contains(self, relative_bearing: f32) -> bool {
        match self {
            WeaponArc::Turret => true,
            WeaponArc::Front => (-45.0..=45.0).contains(&relative_bearing),
            WeaponArc::Left => relative_bearing > 45.0 && relative_bearing <= 135.0,
            WeaponArc::Right => relative_bearing >= -135.0 && relative_bearing < -45.0,
            WeaponArc::Rear => relative_bearing.abs() > 135.0,
        }
    }
}

/// Weapon damage category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponCategory {
    Kinetic,
    Energy,
    Laser,
    Missile,
    Ion,
    Exotic,
}

impl WeaponCategory {
    /// Default projectile speed by category.
    pub fn default_projectile_speed(self) -> f32 {
        match self {
            WeaponCategory::Energy | WeaponCategory::Laser => 800.0,
            WeaponCategory::Missile => 60.0,
            WeaponCategory::Kinetic | WeaponCategory::Ion | WeaponCategory::Exotic => 120.0,
        }
    }
}

/// Normalizes a bearing in degrees to `(-180, 180]` ("normalize(.., -180..180)").
pub fn normalize_bearing(mut degrees: f32) -> f32 {
    degrees %= 360.0;
    if degrees > 180.0 {
        degrees -= 360.0;
    } else if degrees <= -180.0 {
        degrees += 360.0;
    }
    degrees
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppression_thresholds_match_documented_bands() {
        assert_eq!(SuppressionState::from_value(0.0), SuppressionState::None);
        assert_eq!(SuppressionState::from_value(24.9), SuppressionState::None);
        assert_eq!(SuppressionState::from_value(25.0), SuppressionState::Suppressed);
        assert_eq!(SuppressionState::from_value(74.9), SuppressionState::Suppressed);
        assert_eq!(SuppressionState::from_value(75.0), SuppressionState::Pinned);
        assert_eq!(SuppressionState::from_value(100.0), SuppressionState::Pinned);
    }

    #[test]
    fn arc_front_is_symmetric_45() {
        assert!(WeaponArc::Front.contains(0.0));
        assert!(WeaponArc::Front.contains(45.0));
        assert!(WeaponArc::Front.contains(-45.0));
        assert!(!WeaponArc::Front.contains(45.1));
    }

    #[test]
    fn arc_rear_is_beyond_135() {
        assert!(WeaponArc::Rear.contains(180.0));
        assert!(WeaponArc::Rear.contains(-170.0));
        assert!(!WeaponArc::Rear.contains(135.0));
    }

    #[test]
    fn bearing_normalizes_into_range() {
        assert!((normalize_bearing(370.0) - 10.0).abs() < 1e-4);
        assert!((normalize_bearing(-190.0) - 170.0).abs() < 1e-4);
        assert!((normalize_bearing(180.0) - 180.0).abs() < 1e-4);
    }
}
