//! Spatial partitioning for efficient neighbor queries.
//!
//! Replaces the original hash-grid (`SpatialGrid`, one cell bucket per
//! `(cell_x, cell_y)`) with a quadtree, since range/nearest queries and
//! exact `MAX_OBJECTS`/`MAX_DEPTH` split semantics are load-bearing here.
//! The rebuild-per-tick resource pattern is kept: `quadtree_update_system`
//! clears and reinserts every living unit each tick, the way
//! `spatial_grid_update_system` did.

pub mod quadtree;
pub mod tracker;

use bevy_ecs::prelude::*;

use crate::components::{FactionId, Health, Position, UnitId};
use quadtree::Quadtree;
use tracker::VectorizedTracker;

/// Owns both the quadtree (accurate range/nearest queries) and the
/// vectorized tracker (batch nearest-enemy/flow-field queries), rebuilt
/// together each tick.
#[derive(Resource, Debug)]
pub struct SpatialIndex {
    pub quadtree: Quadtree,
    pub tracker: VectorizedTracker,
}

impl SpatialIndex {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            quadtree: Quadtree::new(quadtree::Bounds { x: 0.0, y: 0.0, w: width, h: height }),
            tracker: VectorizedTracker::default(),
        }
    }
}

/// Rebuilds the spatial index from every living unit's current position.
pub fn spatial_index_update_system(
    mut index: ResMut<SpatialIndex>,
    query: Query<(&UnitId, &Position, &FactionId, &Health)>,
) {
    index.quadtree.clear();
    index.tracker.clear();
    for (id, pos, faction, health) in query.iter() {
        if !health.is_alive() {
            continue;
        }
        index.quadtree.insert(quadtree::Entry { id: *id, x: pos.x, y: pos.y });
        index.tracker.push(*id, pos.x, pos.y, faction.0);
    }
    index.tracker.finalize();
}
