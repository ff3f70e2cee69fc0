//! Engagement resolver: mitigation, damage, accuracy, and shot resolution.
//!
//! The scalar path and the batch vectorized path share one mitigation
//! formula (`mitigation_fraction`) so their results are equal in
//! expectation — grounded on `systems::combat::combat_system`, which
//! likewise computes damage/suppression in a shared helper before its two
//! application passes.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::components::{Armor, WeaponStats};
use crate::doctrine::{normalize_bearing, WeaponArc};

/// Inputs to the shared mitigation formula.
#[derive(Debug, Clone, Copy)]
pub struct MitigationInput {
    pub armor_facet: f32,
    pub ap: f32,
    pub cover_mod: f32,
    pub invuln: f32,
    pub defense_mod: f32,
}

/// `save_target`/`stop`/`invuln_chn`/`mitigation` pipeline.
pub fn mitigation_fraction(input: MitigationInput) -> f32 {
    let save_target = (7.0 - input.armor_facet / 10.0 + input.ap / 10.0 - input.cover_mod).clamp(2.0, 6.0);
    let stop = (6.0 - save_target) / 6.0;
    let invuln_chn = (6.0 - input.invuln) / 6.0;
    (stop.max(invuln_chn) + input.defense_mod).min(0.95)
}

/// `damage_out = max(1, strength * 10 * (1 - mitigation) * dmg_mult)`, with
/// the Fortress `x0.5` final multiplier.
pub fn damage_out(strength: f32, mitigation: f32, dmg_mult: f32, is_fortress_target: bool) -> f32 {
    let mut out = (strength * 10.0 * (1.0 - mitigation) * dmg_mult).max(1.0);
    if is_fortress_target {
        out *= 0.5;
    }
    out
}

/// Relative bearing from attacker to target, normalized to `-180..180`.
pub fn relative_bearing(attacker: (f32, f32), attacker_facing_deg: f32, target: (f32, f32)) -> f32 {
    let raw = (target.1 - attacker.1).atan2(target.0 - attacker.0).to_degrees();
    normalize_bearing(raw - attacker_facing_deg)
}

/// Full scalar mitigation given the target's armor and the attacker's
/// bearing.
pub fn scalar_mitigation(armor: &Armor, relative_bearing_deg: f32, ap: f32, cover_mod: f32, invuln: f32, defense_mod: f32) -> f32 {
    let facet = armor.facet_for_bearing(relative_bearing_deg);
    mitigation_fraction(MitigationInput { armor_facet: facet, ap, cover_mod, invuln, defense_mod })
}

/// Accuracy roll input: base `bs/100`, ±15% from
/// height-advantage beyond 10 units, clamped to `[0.05, 0.95]`.
pub fn accuracy(ballistic_skill: f32, height_diff: f32, accuracy_mult: f32) -> f32 {
    let mut base = ballistic_skill / 100.0;
    if height_diff.abs() > 10.0 {
        base += if height_diff > 0.0 { 0.15 } else { -0.15 };
    }
    (base * accuracy_mult).clamp(0.05, 0.95)
}

/// One weapon shot result.
#[derive(Debug, Clone, Copy)]
pub struct ShotResult {
    pub hit: bool,
    pub deviation: f32,
}

pub fn roll_shot(rng: &mut ChaCha8Rng, hit_chance: f32) -> ShotResult {
    let roll: f32 = rng.gen();
    let hit = roll < hit_chance;
    let deviation = if hit { 0.0 } else { rng.gen_range(-2.0..2.0) };
    ShotResult { hit, deviation }
}

/// Base damage before mitigation.
pub fn base_damage(strength: f32, dmg_mult: f32) -> f32 {
    strength * 10.0 * dmg_mult
}

/// Ion weapon shield/hull split override.
pub fn shield_hull_mult(weapon: &WeaponStats) -> (f32, f32) {
    if weapon.is_ion() {
        (weapon.shield_mult_override.unwrap_or(3.0), weapon.hull_mult_override.unwrap_or(0.1))
    } else {
        (weapon.shield_mult_override.unwrap_or(1.0), weapon.hull_mult_override.unwrap_or(1.0))
    }
}

/// Per-attacker-weapon batch row.
#[derive(Debug, Clone, Copy)]
pub struct BatchRow {
    pub ballistic_skill: f32,
    pub strength: f32,
    pub ap: f32,
    pub attacks: f32,
    pub armor_facet: f32,
    pub invuln: f32,
    pub cover_mod: f32,
    pub defense_mod: f32,
    pub md: f32, // morale/suppression accuracy debuff, percent
}

/// `hit_prob = clamp(bs/100 * (1 - md/100), 0.05, 0.95)`.
pub fn batch_hit_probability(row: &BatchRow) -> f32 {
    (row.ballistic_skill / 100.0 * (1.0 - row.md / 100.0)).clamp(0.05, 0.95)
}

/// `crit_prob = clamp(5/bs, 0, 1)` per hit.
pub fn batch_crit_probability(row: &BatchRow) -> f32 {
    (5.0 / row.ballistic_skill.max(1.0)).clamp(0.0, 1.0)
}

/// Draws hits/crits for one attacker-weapon row over `attacks` discrete
/// attacks this tick, and returns summed damage using the same mitigation
/// formula as the scalar path ("Semantics must equal the scalar
/// path in expectation").
pub fn resolve_batch_row(rng: &mut ChaCha8Rng, row: &BatchRow, is_fortress_target: bool) -> f32 {
    let hit_prob = batch_hit_probability(row);
    let crit_prob = batch_crit_probability(row);
    let mitigation = mitigation_fraction(MitigationInput {
        armor_facet: row.armor_facet,
        ap: row.ap,
        cover_mod: row.cover_mod,
        invuln: row.invuln,
        defense_mod: row.defense_mod,
    });
    let per_hit_damage = damage_out(row.strength, mitigation, 1.0, is_fortress_target);

    let attacks = row.attacks.max(0.0).round() as u32;
    let mut hits = 0u32;
    let mut crits = 0u32;
    for _ in 0..attacks {
        let roll: f32 = rng.gen();
        if roll < hit_prob {
            hits += 1;
            let crit_roll: f32 = rng.gen();
            if crit_roll < crit_prob {
                crits += 1;
            }
        }
    }

    hits as f32 * per_hit_damage + crits as f32 * 0.5 * per_hit_damage
}

/// Weapon arc gate. The batch path assumes 360 degree arcs and ignores this;
/// only the scalar path calls it.
pub fn in_arc(arc: WeaponArc, relative_bearing_deg: f32) -> bool {
    arc.contains(relative_bearing_deg)
}

#[cfg(test)]
mod tests {
    use super::*;

    // bs=100, strength=2 -> damage_out should match the documented values
    // within 0.1 for rear (no cover) vs front (Heavy cover).
    #[test]
    fn flank_damage_bypasses_cover() {
        let mitigation = mitigation_fraction(MitigationInput { armor_facet: 0.0, ap: 0.0, cover_mod: 0.0, invuln: 7.0, defense_mod: 0.0 });
        let dmg = damage_out(2.0, mitigation, 1.0, false);
        assert!((dmg - 20.0).abs() < 0.1, "got {dmg}");
    }

    #[test]
    fn frontal_cover_reduces_damage() {
        let mitigation = mitigation_fraction(MitigationInput { armor_facet: 0.0, ap: 0.0, cover_mod: 1.5, invuln: 7.0, defense_mod: 0.0 });
        let dmg = damage_out(2.0, mitigation, 1.0, false);
        assert!((dmg - 18.333).abs() < 0.1, "got {dmg}");
    }

    #[test]
    fn fortress_halves_final_damage() {
        let mitigation = mitigation_fraction(MitigationInput { armor_facet: 0.0, ap: 0.0, cover_mod: 0.0, invuln: 7.0, defense_mod: 0.0 });
        let normal = damage_out(2.0, mitigation, 1.0, false);
        let fortress = damage_out(2.0, mitigation, 1.0, true);
        assert!((fortress - normal / 2.0).abs() < 1e-4);
    }

    #[test]
    fn arcs_match_documented_half_widths() {
        assert!(in_arc(WeaponArc::Front, 45.0));
        assert!(!in_arc(WeaponArc::Front, 45.1));
        assert!(in_arc(WeaponArc::Rear, 179.0));
        assert!(in_arc(WeaponArc::Turret, 179.0));
    }

    #[test]
    fn accuracy_clamped_to_bounds() {
        assert_eq!(accuracy(0.0, 0.0, 1.0), 0.05);
        assert_eq!(accuracy(1000.0, 0.0, 1.0), 0.95);
    }
}
