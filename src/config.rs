//! Battle tunables: stalemate/forced-decision thresholds, cover damage,
//! rally timing, detection ranges, snapshot cadence.
//!
//! Grounded on `systems/performance.rs`'s `SimConfig`: a plain `Resource`
//! struct with every numeric default spelled out and documented inline,
//! rather than scattered magic numbers across the engagement/morale/terrain
//! modules. Loading a `BattleConfig` from a file is out of scope; the struct
//! and its `Default` are carried regardless, since ambient configuration is
//! not itself a dropped feature.

use bevy_ecs::prelude::*;

/// All tunables referenced by name across the core. One value per literal
/// constant; nothing here is derived.
#[derive(Resource, Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BattleConfig {
    /// Fixed real-time tick size in seconds ("conventionally 0.05-0.2s").
    pub dt: f32,
    /// Snapshot interval under normal load.
    pub snap_interval: f32,
    /// Snapshot interval once throttled.
    pub snap_interval_throttled: f32,
    /// Fixed wall-clock advance per `execute_round` call.
    pub fixed_round_seconds: f32,

    /// Damage above this triggers `damage_cover`.
    pub cover_damage_threshold: f32,
    /// Flat cover damage applied per high-impact hit that clears the threshold.
    pub cover_damage_amount: f32,

    /// Morale must clear `suppression < rally_suppression_ceiling` to rally.
    pub rally_suppression_ceiling: f32,
    /// Seconds since last damage required before a rally check is attempted.
    pub rally_grace_seconds: f32,
    /// Morale must be at or above this value to rally.
    pub rally_threshold: f32,

    /// Consecutive rounds/ticks with no damage dealt anywhere before a stalemate is declared.
    pub stalemate_rounds: u32,
    /// Consecutive rounds/ticks with no kill before a forced decision is declared.
    pub forced_decision_rounds: u32,

    /// Default max detection range for ground-domain units.
    pub max_detection_range_ground: f32,
    /// Default max detection range for space-domain units.
    pub max_detection_range_space: f32,

    /// Target-cache distance ceiling, ground domain.
    pub max_cache_distance_ground: f32,
    /// Target-cache distance ceiling, space domain.
    pub max_cache_distance_space: f32,
    /// Seconds a cached target selection remains valid.
    pub target_cache_ttl: f32,

    /// Radius within which an enemy interdictor traps a would-be router
    /// and a friendly one earns the targeting protect bonus.
    pub interdictor_influence_range: f32,
    /// Radius within which a nearby routing unit of the same faction
    /// contributes to the chain-routing morale penalty.
    pub chain_routing_radius: f32,
    /// Radius a `tesla`-tagged impact bleeds 0.5x damage to same-faction
    /// neighbors of the struck unit.
    pub tesla_bleed_radius: f32,
    /// Starting resource stockpile granted to every faction for ability
    /// use, decremented by `AbilitySpec::resource_cost` on success.
    pub starting_faction_resources: f32,

    /// Seconds between orbital-support phase triggers.
    pub orbital_support_interval: f32,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            dt: 0.1,
            snap_interval: 2.0,
            snap_interval_throttled: 5.0,
            fixed_round_seconds: 5.0,

            cover_damage_threshold: 15.0,
            cover_damage_amount: 25.0,

            rally_suppression_ceiling: 25.0,
            rally_grace_seconds: 3.0,
            rally_threshold: 50.0,

            stalemate_rounds: 500,
            forced_decision_rounds: 300,

            max_detection_range_ground: 200.0,
            max_detection_range_space: 800.0,

            max_cache_distance_ground: 150.0,
            max_cache_distance_space: 600.0,
            target_cache_ttl: 1.0,

            interdictor_influence_range: 40.0,
            chain_routing_radius: 20.0,
            tesla_bleed_radius: 10.0,
            starting_faction_resources: 100.0,

            orbital_support_interval: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_literals() {
        let cfg = BattleConfig::default();
        assert_eq!(cfg.stalemate_rounds, 500);
        assert_eq!(cfg.forced_decision_rounds, 300);
        assert_eq!(cfg.cover_damage_threshold, 15.0);
        assert_eq!(cfg.max_detection_range_ground, 200.0);
        assert_eq!(cfg.max_detection_range_space, 800.0);
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = BattleConfig::default();
        let json = serde_json::to_string(&cfg).expect("serialize");
        let back: BattleConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(cfg, back);
    }
}
