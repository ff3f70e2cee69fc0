//! Formation manager.
//!
//! Strongly typed `FormationShape` variants in place of a dynamically-typed
//! settings dictionary.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Slot layout shape.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FormationShape {
    Rectangle { cols: u32 },
    Wedge,
    Wall { cols: u32 },
    Loose { cols: u32 },
}

/// Named presets with their own stat-modifier rows;
/// distinct from the raw geometric `FormationShape`.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormationPreset {
    None,
    LineOfBattle,
    AssaultSpearhead,
    EscortScreen,
}

impl Default for FormationPreset {
    fn default() -> Self {
        FormationPreset::None
    }
}

/// Stat modifiers a formation shape/preset applies, consumed by the
/// steering resolver (F, speed) and engagement resolver (H, damage/accuracy/
/// defense).
#[derive(Debug, Clone, Copy)]
pub struct FormationModifiers {
    pub speed_mult: f32,
    pub damage_mult: f32,
    pub accuracy_mult: f32,
    pub defense_mult: f32,
    pub bonus_ap: f32,
    pub evasion_mult: f32,
    pub shield_regen_mult: f32,
    /// AoE resilience multiplier (Loose doubles it to reduce area-damage exposure).
    pub aoe_resilience_mult: f32,
}

impl Default for FormationModifiers {
    /// The no-op modifier set: every multiplier at 1.0, no flat bonuses.
    fn default() -> Self {
        Self::baseline()
    }
}

impl FormationModifiers {
    fn baseline() -> Self {
        Self {
            speed_mult: 1.0,
            damage_mult: 1.0,
            accuracy_mult: 1.0,
            defense_mult: 1.0,
            bonus_ap: 0.0,
            evasion_mult: 1.0,
            shield_regen_mult: 1.0,
            aoe_resilience_mult: 1.0,
        }
    }

    /// `is_charging` selects the Wedge "charge" damage bonus row
    /// ("1.5x (charge)").
    pub fn for_shape(shape: FormationShape, is_charging: bool) -> Self {
        let mut m = Self::baseline();
        match shape {
            FormationShape::Wedge => {
                m.speed_mult = 1.2;
                if is_charging {
                    m.damage_mult = 1.5;
                }
                m.defense_mult = 0.8;
            }
            FormationShape::Loose { .. } => {
                m.defense_mult = 0.9;
                m.aoe_resilience_mult = 2.0;
            }
            FormationShape::Wall { .. } => {
                m.speed_mult = 0.7;
                m.defense_mult = 1.3;
            }
            FormationShape::Rectangle { .. } => {}
        }
        m
    }

    pub fn for_preset(preset: FormationPreset) -> Self {
        let mut m = Self::baseline();
        match preset {
            FormationPreset::LineOfBattle => {
                m.speed_mult = 0.8;
                m.damage_mult = 1.15;
                m.bonus_ap = 10.0;
            }
            FormationPreset::AssaultSpearhead => {
                m.speed_mult = 1.25;
                m.accuracy_mult = 1.2;
                m.defense_mult = 0.85;
            }
            FormationPreset::EscortScreen => {
                m.evasion_mult = 1.3;
                m.shield_regen_mult = 1.2;
            }
            FormationPreset::None => {}
        }
        m
    }

    /// Combines shape and preset modifiers multiplicatively (and sums
    /// additive bonus AP).
    pub fn combine(shape: Self, preset: Self) -> Self {
        Self {
            speed_mult: shape.speed_mult * preset.speed_mult,
            damage_mult: shape.damage_mult * preset.damage_mult,
            accuracy_mult: shape.accuracy_mult * preset.accuracy_mult,
            defense_mult: shape.defense_mult * preset.defense_mult,
            bonus_ap: shape.bonus_ap + preset.bonus_ap,
            evasion_mult: shape.evasion_mult * preset.evasion_mult,
            shield_regen_mult: shape.shield_regen_mult * preset.shield_regen_mult,
            aoe_resilience_mult: shape.aoe_resilience_mult * preset.aoe_resilience_mult,
        }
    }
}

/// An ordered set of unit references sharing a shape/spacing/facing.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct Formation {
    pub shape: FormationShape,
    pub preset: FormationPreset,
    pub spacing: f32,
    pub facing: f32,
    pub members: Vec<Entity>,
}

impl Formation {
    pub fn new(shape: FormationShape, preset: FormationPreset, spacing: f32, facing: f32) -> Self {
        Self { shape, preset, spacing, facing, members: Vec::new() }
    }

    /// `slot_offset(index) -> (dx, dy)` before rotation by `facing`.
    pub fn slot_offset(&self, index: usize) -> (f32, f32) {
        let i = index as i32;
        let s = self.spacing;
        let (raw_x, raw_y) = match self.shape {
            FormationShape::Rectangle { cols } => {
                let cols = cols.max(1) as i32;
                let row = i / cols;
                let col = i % cols;
                let half_w = (cols - 1) as f32 / 2.0;
                ((col as f32 - half_w) * s, row as f32 * s)
            }
            FormationShape::Wedge => {
                // Row r holds r+1 units; rear rows sit farther from the tip.
                let mut row = 0i32;
                let mut remaining = i;
                loop {
                    let row_size = row + 1;
                    if remaining < row_size {
                        break;
                    }
                    remaining -= row_size;
                    row += 1;
                }
                let row_size = row + 1;
                let half_w = row as f32 / 2.0;
                let col = remaining as f32 - half_w;
                (col * s, row as f32 * s)
            }
            FormationShape::Wall { cols } => {
                let cols = cols.max(1) as i32;
                let layer = i / cols;
                let col = i % cols;
                let half_w = (cols - 1) as f32 / 2.0;
                ((col as f32 - half_w) * s, layer as f32 * s)
            }
            FormationShape::Loose { cols } => {
                let cols = cols.max(1) as i32;
                let row = i / cols;
                let col = i % cols;
                let half_w = (cols - 1) as f32 / 2.0;
                ((col as f32 - half_w) * s * 2.5, row as f32 * s * 2.5)
            }
        };

        // Rotate by formation facing (degrees, 0 = East).
        let rad = self.facing.to_radians();
        let (sin_f, cos_f) = rad.sin_cos();
        (raw_x * cos_f - raw_y * sin_f, raw_x * sin_f + raw_y * cos_f)
    }

    pub fn centroid(&self, member_positions: &[(f32, f32)]) -> (f32, f32) {
        if member_positions.is_empty() {
            return (0.0, 0.0);
        }
        let n = member_positions.len() as f32;
        let (sx, sy) = member_positions.iter().fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
        (sx / n, sy / n)
    }

    pub fn modifiers(&self, is_charging: bool) -> FormationModifiers {
        FormationModifiers::combine(FormationModifiers::for_shape(self.shape, is_charging), FormationModifiers::for_preset(self.preset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_centers_columns() {
        let f = Formation::new(FormationShape::Rectangle { cols: 2 }, FormationPreset::None, 2.0, 0.0);
        let (x0, y0) = f.slot_offset(0);
        let (x1, y1) = f.slot_offset(1);
        assert_eq!(y0, 0.0);
        assert_eq!(y1, 0.0);
        assert!((x0 + x1).abs() < 1e-5);
    }

    #[test]
    fn wedge_rows_grow_by_one() {
        let f = Formation::new(FormationShape::Wedge, FormationPreset::None, 2.0, 0.0);
        // index 0 = row 0 (tip), indices 1,2 = row 1.
        let (_, y_tip) = f.slot_offset(0);
        let (_, y_row1_a) = f.slot_offset(1);
        let (_, y_row1_b) = f.slot_offset(2);
        assert!(y_row1_a > y_tip);
        assert_eq!(y_row1_a, y_row1_b);
    }

    #[test]
    fn wedge_damage_bonus_only_while_charging() {
        let idle = FormationModifiers::for_shape(FormationShape::Wedge, false);
        let charging = FormationModifiers::for_shape(FormationShape::Wedge, true);
        assert_eq!(idle.damage_mult, 1.0);
        assert_eq!(charging.damage_mult, 1.5);
    }

    #[test]
    fn line_of_battle_adds_bonus_ap() {
        let m = FormationModifiers::for_preset(FormationPreset::LineOfBattle);
        assert_eq!(m.bonus_ap, 10.0);
        assert_eq!(m.damage_mult, 1.15);
    }
}
