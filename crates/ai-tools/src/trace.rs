#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use core::fmt;
use std::collections::{BTreeMap, VecDeque};

pub const DEFAULT_TRACE_CAPACITY: usize = 256;

/// Maximum number of `extra` entries kept per event.
pub const MAX_EXTRA_ENTRIES: usize = 8;
/// `extra` values longer than this (in chars) are truncated.
pub const MAX_EXTRA_VALUE_CHARS: usize = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TraceKind {
    GoalSelected,
    PlanFound,
    PlanFailed,
    ActionStart,
    ActionResult,
    Replan,
    WorldStateChange,
    Interrupt,
}

impl TraceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TraceKind::GoalSelected => "GoalSelected",
            TraceKind::PlanFound => "PlanFound",
            TraceKind::PlanFailed => "PlanFailed",
            TraceKind::ActionStart => "ActionStart",
            TraceKind::ActionResult => "ActionResult",
            TraceKind::Replan => "Replan",
            TraceKind::WorldStateChange => "WorldStateChange",
            TraceKind::Interrupt => "Interrupt",
        }
    }
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One decision record.
///
/// This is intentionally "dumb data" so it can be recorded during simulation and later rendered
/// by tooling.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceEvent {
    pub kind: TraceKind,
    /// Simulated seconds.
    pub timestamp: f64,
    pub tick: u64,
    /// Stable id of the entity the event belongs to.
    pub entity: u64,
    pub message: String,
    pub extra: BTreeMap<String, String>,
}

impl TraceEvent {
    pub fn new(kind: TraceKind, entity: u64, message: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp: 0.0,
            tick: 0,
            entity,
            message: message.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn at(mut self, tick: u64, timestamp: f64) -> Self {
        self.tick = tick;
        self.timestamp = timestamp;
        self
    }

    /// Attaches a key/value detail. Entries beyond [`MAX_EXTRA_ENTRIES`] are dropped and long
    /// values are truncated.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let key = key.into();
        if self.extra.len() >= MAX_EXTRA_ENTRIES && !self.extra.contains_key(&key) {
            return self;
        }
        let mut value = value.to_string();
        if let Some((idx, _)) = value.char_indices().nth(MAX_EXTRA_VALUE_CHARS) {
            value.truncate(idx);
        }
        self.extra.insert(key, value);
        self
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>8.2}s] #{} {:<16} {}",
            self.timestamp, self.entity, self.kind, self.message
        )?;
        for (k, v) in &self.extra {
            write!(f, " {k}={v}")?;
        }
        Ok(())
    }
}

/// Fixed-capacity ring of trace events; the oldest event is evicted when full.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceBuffer {
    capacity: usize,
    events: VecDeque<TraceEvent>,
    total_pushed: u64,
}

impl TraceBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity),
            total_pushed: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events ever pushed, including evicted ones.
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    pub fn push(&mut self, event: TraceEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
        self.total_pushed += 1;
    }

    /// The `n` most recent events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<TraceEvent> {
        let skip = self.events.len().saturating_sub(n);
        self.events.iter().skip(skip).cloned().collect()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for TraceBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_CAPACITY)
    }
}
