use core::fmt::Debug;

/// Stable identifier for a simulated entity.
///
/// Deterministic simulation requires:
/// - stable ordering (`Ord`) so entities are visited in the same order every tick
/// - a stable numeric ID (`stable_id`) for traces, logs and blackboard handles
pub trait EntityId: Copy + Ord + Eq + Debug {
    fn stable_id(self) -> u64;
}

impl EntityId for u64 {
    fn stable_id(self) -> u64 {
        self
    }
}

impl EntityId for u32 {
    fn stable_id(self) -> u64 {
        self as u64
    }
}

impl EntityId for usize {
    fn stable_id(self) -> u64 {
        self as u64
    }
}
