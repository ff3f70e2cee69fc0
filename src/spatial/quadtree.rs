//! Quadtree spatial index.
//!
//! `MAX_OBJECTS=10`, `MAX_DEPTH=8`; nodes that fail to redistribute an
//! object into a child after a split keep it at the parent. `query_nearest`
//! expands a circular search radius (starting at 10, doubling) until it has
//! enough candidates rather than doing a true branch-and-bound
//! nearest-neighbor descent.

use crate::components::UnitId;

pub const MAX_OBJECTS: usize = 10;
pub const MAX_DEPTH: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Bounds {
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.w && py >= self.y && py <= self.y + self.h
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        !(self.x + self.w < other.x
            || other.x + other.w < self.x
            || self.y + self.h < other.y
            || other.y + other.h < self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry {
    pub id: UnitId,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug)]
struct Node {
    bounds: Bounds,
    depth: u32,
    objects: Vec<Entry>,
    children: Option<Box<[Node; 4]>>,
}

impl Node {
    fn new(bounds: Bounds, depth: u32) -> Self {
        Self { bounds, depth, objects: Vec::new(), children: None }
    }

    fn insert(&mut self, entry: Entry) -> bool {
        if !self.bounds.contains(entry.x, entry.y) {
            return false;
        }

        if self.children.is_none() {
            if self.objects.len() < MAX_OBJECTS || self.depth >= MAX_DEPTH {
                self.objects.push(entry);
                return true;
            }
            self.split();
        }

        if let Some(children) = self.children.as_mut() {
            for child in children.iter_mut() {
                if child.insert(entry) {
                    return true;
                }
            }
        }

        // Straddles a child boundary (or no child claimed it): keep at the parent.
        self.objects.push(entry);
        true
    }

    fn remove(&mut self, id: UnitId, x: f32, y: f32) -> bool {
        if !self.bounds.contains(x, y) {
            return false;
        }

        if let Some(pos) = self.objects.iter().position(|e| e.id == id) {
            self.objects.remove(pos);
            return true;
        }

        if let Some(children) = self.children.as_mut() {
            for child in children.iter_mut() {
                if child.remove(id, x, y) {
                    return true;
                }
            }
        }

        false
    }

    fn split(&mut self) {
        let half_w = self.bounds.w / 2.0;
        let half_h = self.bounds.h / 2.0;
        let mid_x = self.bounds.x + half_w;
        let mid_y = self.bounds.y + half_h;
        let depth = self.depth + 1;

        let mut children = Box::new([
            Node::new(Bounds { x: self.bounds.x, y: self.bounds.y, w: half_w, h: half_h }, depth),
            Node::new(Bounds { x: mid_x, y: self.bounds.y, w: half_w, h: half_h }, depth),
            Node::new(Bounds { x: self.bounds.x, y: mid_y, w: half_w, h: half_h }, depth),
            Node::new(Bounds { x: mid_x, y: mid_y, w: half_w, h: half_h }, depth),
        ]);

        let old_objects = std::mem::take(&mut self.objects);
        for entry in old_objects {
            let mut moved = false;
            for child in children.iter_mut() {
                if child.insert(entry) {
                    moved = true;
                    break;
                }
            }
            if !moved {
                self.objects.push(entry);
            }
        }

        self.children = Some(children);
    }

    fn query_range(&self, bounds: &Bounds, out: &mut Vec<Entry>) {
        if !self.bounds.intersects(bounds) {
            return;
        }
        for entry in &self.objects {
            if bounds.contains(entry.x, entry.y) {
                out.push(*entry);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query_range(bounds, out);
            }
        }
    }
}

/// Quadtree spatial index over mobile unit positions.
#[derive(Debug)]
pub struct Quadtree {
    world_bounds: Bounds,
    root: Node,
}

impl Quadtree {
    pub fn new(bounds: Bounds) -> Self {
        Self { world_bounds: bounds, root: Node::new(bounds, 0) }
    }

    /// Returns `false` for out-of-bounds entries.
    pub fn insert(&mut self, entry: Entry) -> bool {
        self.root.insert(entry)
    }

    /// Returns `false` if the entry was not present.
    pub fn remove(&mut self, id: UnitId, x: f32, y: f32) -> bool {
        self.root.remove(id, x, y)
    }

    /// `remove` followed by `insert` ("update_position is remove
    /// followed by insert").
    pub fn update_position(&mut self, id: UnitId, old_x: f32, old_y: f32, new_x: f32, new_y: f32) -> bool {
        self.remove(id, old_x, old_y);
        self.insert(Entry { id, x: new_x, y: new_y })
    }

    pub fn query_range(&self, bounds: Bounds) -> Vec<Entry> {
        let mut out = Vec::new();
        self.root.query_range(&bounds, &mut out);
        out
    }

    /// Exact Euclidean filter after a bounding-box prune.
    pub fn query_circle(&self, center_x: f32, center_y: f32, radius: f32) -> Vec<Entry> {
        let bounds = Bounds { x: center_x - radius, y: center_y - radius, w: radius * 2.0, h: radius * 2.0 };
        let radius_sq = radius * radius;
        self.query_range(bounds)
            .into_iter()
            .filter(|e| {
                let dx = e.x - center_x;
                let dy = e.y - center_y;
                dx * dx + dy * dy <= radius_sq
            })
            .collect()
    }

    /// Expands a circular search until enough candidates are found, then
    /// sorts by distance (; grounded on the original's
    /// `query_nearest`, which is explicitly documented there as a naive
    /// expanding-radius search rather than a true NN descent).
    pub fn query_nearest(&self, center_x: f32, center_y: f32, count: usize) -> Vec<(Entry, f32)> {
        let mut radius = 10.0_f32;
        let mut candidates = Vec::new();
        loop {
            candidates = self.query_circle(center_x, center_y, radius);
            if candidates.len() >= count || radius > self.world_bounds.w.max(self.world_bounds.h) {
                break;
            }
            radius *= 2.0;
        }
        if candidates.is_empty() && radius <= self.world_bounds.w.max(self.world_bounds.h) * 4.0 {
            candidates = self.query_range(Bounds { x: 0.0, y: 0.0, w: self.world_bounds.w.max(1000.0), h: self.world_bounds.h.max(1000.0) });
        }

        let mut results: Vec<(Entry, f32)> = candidates
            .into_iter()
            .map(|e| {
                let dx = e.x - center_x;
                let dy = e.y - center_y;
                (e, (dx * dx + dy * dy).sqrt())
            })
            .collect();
        results.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(count);
        results
    }

    pub fn clear(&mut self) {
        self.root = Node::new(self.world_bounds, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qt(w: f32, h: f32) -> Quadtree {
        Quadtree::new(Bounds { x: 0.0, y: 0.0, w, h })
    }

    #[test]
    fn insert_rejects_out_of_bounds() {
        let mut tree = qt(100.0, 100.0);
        assert!(!tree.insert(Entry { id: UnitId(1), x: 200.0, y: 0.0 }));
        assert!(tree.insert(Entry { id: UnitId(2), x: 50.0, y: 50.0 }));
    }

    #[test]
    fn remove_returns_false_if_absent() {
        let mut tree = qt(100.0, 100.0);
        assert!(!tree.remove(UnitId(1), 10.0, 10.0));
    }

    #[test]
    fn splits_after_max_objects() {
        let mut tree = qt(100.0, 100.0);
        for i in 0..(MAX_OBJECTS as u32 + 1) {
            assert!(tree.insert(Entry { id: UnitId(i), x: 1.0 + i as f32 * 0.01, y: 1.0 }));
        }
        let found = tree.query_circle(1.0, 1.0, 5.0);
        assert_eq!(found.len(), MAX_OBJECTS + 1);
    }

    #[test]
    fn query_circle_at_zero_radius_matches_invariant_11() {
        let mut tree = qt(100.0, 100.0);
        tree.insert(Entry { id: UnitId(1), x: 10.0, y: 10.0 });
        tree.insert(Entry { id: UnitId(2), x: 10.001, y: 10.0 });
        let found = tree.query_circle(10.0, 10.0, 0.0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, UnitId(1));
    }

    #[test]
    fn query_nearest_sorts_ascending() {
        let mut tree = qt(100.0, 100.0);
        tree.insert(Entry { id: UnitId(1), x: 30.0, y: 0.0 });
        tree.insert(Entry { id: UnitId(2), x: 10.0, y: 0.0 });
        tree.insert(Entry { id: UnitId(3), x: 20.0, y: 0.0 });
        let nearest = tree.query_nearest(0.0, 0.0, 2);
        assert_eq!(nearest.len(), 2);
        assert_eq!(nearest[0].0.id, UnitId(2));
        assert_eq!(nearest[1].0.id, UnitId(3));
    }

    #[test]
    fn update_position_moves_entry() {
        let mut tree = qt(100.0, 100.0);
        tree.insert(Entry { id: UnitId(1), x: 10.0, y: 10.0 });
        tree.update_position(UnitId(1), 10.0, 10.0, 90.0, 90.0);
        assert!(tree.query_circle(10.0, 10.0, 1.0).is_empty());
        assert_eq!(tree.query_circle(90.0, 90.0, 1.0).len(), 1);
    }
}
