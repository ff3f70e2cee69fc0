//! Target selector.
//!
//! Grounded on `systems::combat::combat_system`'s two-pass shape (collect
//! candidate data first, to avoid holding a query borrow while scoring,
//! then score) and on the spatial index's `query_circle`/`query_nearest`.

use crate::components::{CombatStats, FactionId, Health, Position, Tags, UnitFlags, UnitId, UnitKind};
use crate::doctrine::Doctrine;
use crate::spatial::quadtree::Quadtree;

/// One candidate in the target pool, gathered before scoring so the borrow
/// of the quadtree ends before scoring mutates anything (teacher pattern).
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub id: UnitId,
    pub distance: f32,
    pub is_routing: bool,
    pub kind: UnitKind,
    pub toughness: f32,
    pub hp_fraction: f32,
    pub is_interdictor: bool,
}

pub struct TargetSelectorInput<'a> {
    pub attacker_pos: Position,
    pub attacker_faction: FactionId,
    pub attacker_tags: &'a Tags,
    pub doctrine: Doctrine,
    pub is_trapped: bool,
    pub friendly_interdictor_nearby: bool,
}

/// Gathers nearby opposing, living candidates via the quadtree
/// ("radius 30 for KITE, else 20 nearest").
pub fn gather_candidates(
    quadtree: &Quadtree,
    input: &TargetSelectorInput,
    lookup: impl Fn(UnitId) -> Option<(FactionId, Health, UnitFlags, UnitKind, CombatStats, Tags)>,
) -> Vec<Candidate> {
    let entries = if matches!(input.doctrine, Doctrine::Kite) {
        quadtree.query_circle(input.attacker_pos.x, input.attacker_pos.y, 30.0)
    } else {
        quadtree
            .query_nearest(input.attacker_pos.x, input.attacker_pos.y, 20)
            .into_iter()
            .map(|(e, _)| e)
            .collect()
    };

    let mut candidates: Vec<Candidate> = entries
        .into_iter()
        .filter_map(|entry| {
            let (faction, health, flags, kind, stats, tags) = lookup(entry.id)?;
            if faction == input.attacker_faction || !health.is_alive() {
                return None;
            }
            let distance = input.attacker_pos.distance_to(&Position::new(entry.x, entry.y));
            Some(Candidate {
                id: entry.id,
                distance,
                is_routing: flags.is_routing,
                kind,
                toughness: stats.melee_defense,
                hp_fraction: health.fraction(),
                is_interdictor: tags.has("Interdictor"),
            })
        })
        .collect();

    // Deprioritize routing enemies: move to the tail.
    candidates.sort_by(|a, b| (a.is_routing as u8).cmp(&(b.is_routing as u8)));
    candidates
}

/// Score = distance + role bonuses. Lower is better. Returns the
/// best candidate id, or the lowest-HP candidate under KITE doctrine.
pub fn select_target(candidates: &[Candidate], input: &TargetSelectorInput) -> Option<UnitId> {
    if candidates.is_empty() {
        return None;
    }

    if matches!(input.doctrine, Doctrine::Kite) {
        return candidates.iter().min_by(|a, b| a.hp_fraction.partial_cmp(&b.hp_fraction).unwrap()).map(|c| c.id);
    }

    let is_anti_tank = input.attacker_tags.has("Anti-Tank");
    let is_anti_infantry = input.attacker_tags.has("Anti-Infantry");
    let is_titan_killer = input.attacker_tags.has("Titan-Killer");

    candidates
        .iter()
        .min_by(|a, b| score(a, is_anti_tank, is_anti_infantry, is_titan_killer, input).partial_cmp(&score(b, is_anti_tank, is_anti_infantry, is_titan_killer, input)).unwrap())
        .map(|c| c.id)
}

fn score(c: &Candidate, anti_tank: bool, anti_infantry: bool, titan_killer: bool, input: &TargetSelectorInput) -> f32 {
    let mut score = c.distance;

    if anti_tank && (matches!(c.kind, UnitKind::Vehicle | UnitKind::Monster) || c.toughness >= 7.0) {
        score -= 15.0;
    }
    if anti_infantry && matches!(c.kind, UnitKind::Infantry) && c.toughness < 7.0 {
        score -= 10.0;
    }
    if titan_killer {
        if matches!(c.kind, UnitKind::Titan) {
            score -= 50.0;
        } else if matches!(c.kind, UnitKind::Vehicle) {
            score -= 20.0;
        }
    }
    if input.friendly_interdictor_nearby {
        score -= 10.0;
    }
    if input.is_trapped && c.is_interdictor {
        score -= 100.0;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: u32, distance: f32, kind: UnitKind, toughness: f32) -> Candidate {
        Candidate { id: UnitId(id), distance, is_routing: false, kind, toughness, hp_fraction: 1.0, is_interdictor: false }
    }

    #[test]
    fn kite_picks_lowest_hp() {
        let candidates = vec![
            Candidate { hp_fraction: 0.8, ..candidate(1, 10.0, UnitKind::Infantry, 3.0) },
            Candidate { hp_fraction: 0.2, ..candidate(2, 30.0, UnitKind::Infantry, 3.0) },
        ];
        let input = TargetSelectorInput {
            attacker_pos: Position::new(0.0, 0.0),
            attacker_faction: FactionId(0),
            attacker_tags: &Tags::default(),
            doctrine: Doctrine::Kite,
            is_trapped: false,
            friendly_interdictor_nearby: false,
        };
        assert_eq!(select_target(&candidates, &input), Some(UnitId(2)));
    }

    #[test]
    fn anti_tank_prefers_vehicle_even_if_farther() {
        let candidates = vec![candidate(1, 5.0, UnitKind::Infantry, 3.0), candidate(2, 15.0, UnitKind::Vehicle, 8.0)];
        let tags = Tags(vec!["Anti-Tank".to_string()]);
        let input = TargetSelectorInput {
            attacker_pos: Position::new(0.0, 0.0),
            attacker_faction: FactionId(0),
            attacker_tags: &tags,
            doctrine: Doctrine::Standard,
            is_trapped: false,
            friendly_interdictor_nearby: false,
        };
        assert_eq!(select_target(&candidates, &input), Some(UnitId(2)));
    }

    #[test]
    fn trapped_attacker_strongly_prefers_interdictor() {
        let candidates = vec![candidate(1, 5.0, UnitKind::Infantry, 3.0), Candidate { is_interdictor: true, ..candidate(2, 20.0, UnitKind::Infantry, 3.0) }];
        let input = TargetSelectorInput {
            attacker_pos: Position::new(0.0, 0.0),
            attacker_faction: FactionId(0),
            attacker_tags: &Tags::default(),
            doctrine: Doctrine::Standard,
            is_trapped: true,
            friendly_interdictor_nearby: false,
        };
        assert_eq!(select_target(&candidates, &input), Some(UnitId(2)));
    }
}
