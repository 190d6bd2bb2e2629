//! Spatial sensing queries over a [`WorldView`].
//!
//! Results are deterministic: ties on distance are broken by ascending entity order.

use core::cmp::Ordering;

use crate::{Vec2, WorldView};

/// An entity found by a sensing query, with its distance from the querying entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sensed<E> {
    pub entity: E,
    pub distance: f32,
}

/// Options for [`all_in_range`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RangeQuery {
    /// Include the querying entity itself (at distance 0).
    pub include_self: bool,
    /// Truncate the result after this many entries (nearest first).
    pub max_results: Option<usize>,
}

pub fn position<W: WorldView>(world: &W, entity: W::Entity) -> Option<Vec2> {
    world.position(entity)
}

/// Distance between two entities, `None` if either has no position.
pub fn distance<W: WorldView>(world: &W, a: W::Entity, b: W::Entity) -> Option<f32> {
    Some(world.position(a)?.distance(world.position(b)?))
}

pub fn nearest<W: WorldView>(world: &W, entity: W::Entity, radius: f32) -> Option<Sensed<W::Entity>> {
    nearest_matching(world, entity, radius, |_| true)
}

/// Nearest other entity within `radius` accepted by `filter`.
pub fn nearest_matching<W, F>(
    world: &W,
    entity: W::Entity,
    radius: f32,
    mut filter: F,
) -> Option<Sensed<W::Entity>>
where
    W: WorldView,
    F: FnMut(W::Entity) -> bool,
{
    let origin = world.position(entity)?;
    let radius2 = radius.max(0.0) * radius.max(0.0);

    let mut best: Option<(f32, W::Entity)> = None;
    for (other, pos) in world.positioned_entities() {
        if other == entity || !filter(other) {
            continue;
        }
        let dist2 = origin.distance_squared(pos);
        if dist2 > radius2 {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_dist2, best_entity)) => {
                compare(dist2, other, best_dist2, best_entity) == Ordering::Less
            }
        };
        if better {
            best = Some((dist2, other));
        }
    }

    best.map(|(dist2, entity)| Sensed {
        entity,
        distance: dist2.sqrt(),
    })
}

/// Every entity within `radius`, nearest first.
pub fn all_in_range<W: WorldView>(
    world: &W,
    entity: W::Entity,
    radius: f32,
    query: &RangeQuery,
) -> Vec<Sensed<W::Entity>> {
    let Some(origin) = world.position(entity) else {
        return Vec::new();
    };
    let radius2 = radius.max(0.0) * radius.max(0.0);

    let mut found: Vec<(f32, W::Entity)> = world
        .positioned_entities()
        .into_iter()
        .filter(|(other, _)| query.include_self || *other != entity)
        .map(|(other, pos)| (origin.distance_squared(pos), other))
        .filter(|(dist2, _)| *dist2 <= radius2)
        .collect();

    found.sort_by(|(da, ea), (db, eb)| compare(*da, *ea, *db, *eb));
    found.dedup_by(|(_, a), (_, b)| a == b);
    if let Some(max) = query.max_results {
        found.truncate(max);
    }

    found
        .into_iter()
        .map(|(dist2, entity)| Sensed {
            entity,
            distance: dist2.sqrt(),
        })
        .collect()
}

fn compare<E: Ord>(da: f32, ea: E, db: f32, eb: E) -> Ordering {
    da.partial_cmp(&db)
        .unwrap_or(Ordering::Equal)
        .then_with(|| ea.cmp(&eb))
}
