use crate::{EntityId, Vec2};

/// Read-only world access.
///
/// Worlds only have to name their entity type. Position queries default to "unknown" so
/// headless worlds (tests, tools) can ignore sensing entirely.
pub trait WorldView {
    type Entity: EntityId;

    /// Whether `entity` still exists. Invalid entities are never ticked.
    fn is_valid(&self, _entity: Self::Entity) -> bool {
        true
    }

    fn position(&self, _entity: Self::Entity) -> Option<Vec2> {
        None
    }

    /// Every entity that has a position, in any order.
    fn positioned_entities(&self) -> Vec<(Self::Entity, Vec2)> {
        Vec::new()
    }
}

/// Write access / effect sink.
pub trait WorldMut: WorldView {}
