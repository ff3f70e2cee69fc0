//! Vectorized position tracker mirroring the quadtree in dense arrays
//!: `compute_nearest_enemies` and `compute_flow_field` are the
//! batch queries the vectorized engagement path (`systems::engagement`)
//! consumes, so they amortize over every unit in one pass instead of one
//! quadtree descent per attacker.

use std::collections::HashMap;

use crate::components::{FactionId, UnitId};

/// Dense mirror of every living unit's position and faction, rebuilt each
/// tick alongside the quadtree.
#[derive(Debug, Default)]
pub struct VectorizedTracker {
    ids: Vec<UnitId>,
    xs: Vec<f32>,
    ys: Vec<f32>,
    factions: Vec<u32>,
    index_of: HashMap<UnitId, usize>,
}

impl VectorizedTracker {
    pub fn clear(&mut self) {
        self.ids.clear();
        self.xs.clear();
        self.ys.clear();
        self.factions.clear();
        self.index_of.clear();
    }

    pub fn push(&mut self, id: UnitId, x: f32, y: f32, faction: u32) {
        self.index_of.insert(id, self.ids.len());
        self.ids.push(id);
        self.xs.push(x);
        self.ys.push(y);
        self.factions.push(faction);
    }

    /// No-op placeholder kept for symmetry with the quadtree's rebuild
    /// lifecycle; present so callers can treat both structures uniformly.
    pub fn finalize(&mut self) {}

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// For every tracked unit, the nearest unit of a different faction and
    /// its distance ("mask same-faction pairs with a sentinel
    /// distance and argmin per row").
    pub fn compute_nearest_enemies(&self) -> HashMap<UnitId, (UnitId, f32)> {
        let n = self.ids.len();
        let mut out = HashMap::with_capacity(n);
        const SENTINEL: f32 = f32::INFINITY;

        for i in 0..n {
            let mut best_dist = SENTINEL;
            let mut best_idx: Option<usize> = None;
            for j in 0..n {
                if i == j || self.factions[j] == self.factions[i] {
                    continue;
                }
                let dx = self.xs[j] - self.xs[i];
                let dy = self.ys[j] - self.ys[i];
                let dist = (dx * dx + dy * dy).sqrt();
                if dist < best_dist {
                    best_dist = dist;
                    best_idx = Some(j);
                }
            }
            if let Some(j) = best_idx {
                out.insert(self.ids[i], (self.ids[j], best_dist));
            }
        }
        out
    }

    /// For every tracked unit, a unit-step direction and distance toward its
    /// nearest enemy: `(sgn(dx), sgn(dy), distance)`, the
    /// vectorized counterpart of the ground-domain stepwise grid kernel in
    /// `systems::steering`.
    pub fn compute_flow_field(&self) -> HashMap<UnitId, (f32, f32, f32)> {
        self.compute_nearest_enemies()
            .into_iter()
            .map(|(id, (target_id, dist))| {
                let i = self.index_of[&id];
                let j = self.index_of[&target_id];
                let dx = self.xs[j] - self.xs[i];
                let dy = self.ys[j] - self.ys[i];
                (id, (dx.signum(), dy.signum(), dist))
            })
            .collect()
    }

    pub fn faction_of(&self, id: UnitId) -> Option<FactionId> {
        self.index_of.get(&id).map(|&i| FactionId(self.factions[i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_enemies_ignores_same_faction() {
        let mut t = VectorizedTracker::default();
        t.push(UnitId(1), 0.0, 0.0, 0);
        t.push(UnitId(2), 1.0, 0.0, 0);
        t.push(UnitId(3), 5.0, 0.0, 1);
        t.finalize();

        let nearest = t.compute_nearest_enemies();
        assert_eq!(nearest[&UnitId(1)].0, UnitId(3));
        assert_eq!(nearest[&UnitId(2)].0, UnitId(3));
        assert_eq!(nearest[&UnitId(3)].0, UnitId(2));
    }

    #[test]
    fn flow_field_points_toward_enemy() {
        let mut t = VectorizedTracker::default();
        t.push(UnitId(1), 0.0, 0.0, 0);
        t.push(UnitId(2), -5.0, 3.0, 1);
        t.finalize();

        let field = t.compute_flow_field();
        let (sx, sy, dist) = field[&UnitId(1)];
        assert_eq!(sx, -1.0);
        assert_eq!(sy, 1.0);
        assert!(dist > 0.0);
    }

    #[test]
    fn empty_tracker_has_no_nearest_enemies() {
        let t = VectorizedTracker::default();
        assert!(t.compute_nearest_enemies().is_empty());
    }
}
