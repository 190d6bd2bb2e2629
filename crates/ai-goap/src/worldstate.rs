//! Bit-packed boolean world states.
//!
//! A [`WorldState`] is a pair of 64-bit words: `values` holds the truth value of each atom and
//! `dontcare` marks atoms whose value is unspecified. Atom names map to bit indices through an
//! [`AtomRegistry`]; indices are assigned in first-registration order and never change.

use std::collections::BTreeMap;

use crate::error::{GoapError, Result};

/// Usable atom slots. The top bit of the word is never assigned.
pub const MAX_ATOMS: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorldState {
    pub values: u64,
    pub dontcare: u64,
}

impl WorldState {
    /// Every atom unspecified. Matches anything when used as an expectation.
    pub const EMPTY: WorldState = WorldState {
        values: 0,
        dontcare: u64::MAX,
    };

    pub fn clear(&mut self) {
        *self = Self::EMPTY;
    }

    pub fn set_bit(&mut self, idx: usize, value: bool) {
        let bit = 1u64 << idx;
        if value {
            self.values |= bit;
        } else {
            self.values &= !bit;
        }
        self.dontcare &= !bit;
    }

    /// `None` when the atom is unspecified.
    pub fn get_bit(&self, idx: usize) -> Option<bool> {
        let bit = 1u64 << idx;
        if self.dontcare & bit != 0 {
            None
        } else {
            Some(self.values & bit != 0)
        }
    }

    /// Bits this state specifies.
    pub fn specified(&self) -> u64 {
        !self.dontcare
    }

    /// True when every atom specified by `expected` has the same value here.
    pub fn matches(&self, expected: &WorldState) -> bool {
        let care = !expected.dontcare;
        (self.values & care) == (expected.values & care)
    }

    /// Applies postconditions: atoms specified by `post` are overwritten and become specified.
    pub fn apply(&self, post: &WorldState) -> WorldState {
        let care = !post.dontcare;
        WorldState {
            values: (self.values & post.dontcare) | (post.values & care),
            dontcare: self.dontcare & post.dontcare,
        }
    }

    /// Atoms specified in both states whose values differ.
    pub fn changed_bits(&self, other: &WorldState) -> u64 {
        (self.values ^ other.values) & !self.dontcare & !other.dontcare
    }

    /// Number of goal-specified atoms that differ; admissible when every action costs at least 1.
    pub fn distance_to(&self, goal: &WorldState) -> u32 {
        ((self.values ^ goal.values) & !goal.dontcare).count_ones()
    }

    /// Re-encodes this state from the atom indices of `from` into those of `to`, registering
    /// missing atoms in `to`.
    pub fn remap(&self, from: &AtomRegistry, to: &mut AtomRegistry) -> Result<WorldState> {
        let mut out = WorldState::EMPTY;
        for (idx, name) in from.names().iter().enumerate() {
            if let Some(value) = self.get_bit(idx) {
                let target = to.register(name)?;
                out.set_bit(target, value);
            }
        }
        Ok(out)
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Atom name to bit index table with a fixed cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomRegistry {
    names: Vec<String>,
    cap: usize,
    auto_register: bool,
}

impl AtomRegistry {
    pub fn new(cap: usize) -> Self {
        Self {
            names: Vec::new(),
            cap: cap.min(MAX_ATOMS),
            auto_register: false,
        }
    }

    /// Allow [`AtomRegistry::set`] to register atoms it has not seen.
    pub fn with_auto_register(mut self, auto_register: bool) -> Self {
        self.auto_register = auto_register;
        self
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn auto_register(&self) -> bool {
        self.auto_register
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in bit-index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Returns the index of `name`, assigning the next free one if needed.
    pub fn register(&mut self, name: &str) -> Result<usize> {
        if let Some(idx) = self.index_of(name) {
            return Ok(idx);
        }
        if self.names.len() >= self.cap {
            return Err(GoapError::AtomCapExceeded {
                atom: name.to_string(),
                cap: self.cap,
            });
        }
        self.names.push(name.to_string());
        Ok(self.names.len() - 1)
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    /// Bits of every registered atom.
    pub fn all_mask(&self) -> u64 {
        if self.names.len() >= 64 {
            u64::MAX
        } else {
            (1u64 << self.names.len()) - 1
        }
    }

    /// Bits of the named atoms; unknown names are ignored.
    pub fn mask_from_names<I, S>(&self, names: I) -> u64
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter_map(|name| self.index_of(name.as_ref()))
            .fold(0u64, |mask, idx| mask | (1u64 << idx))
    }

    /// Writes one atom. Unknown atoms are an error unless auto-registration is enabled.
    pub fn set(&mut self, ws: &mut WorldState, name: &str, value: bool) -> Result<()> {
        let idx = match self.index_of(name) {
            Some(idx) => idx,
            None if self.auto_register => self.register(name)?,
            None => return Err(GoapError::UnknownAtom(name.to_string())),
        };
        ws.set_bit(idx, value);
        Ok(())
    }

    /// Writes one atom, registering it first if needed.
    pub fn set_registering(&mut self, ws: &mut WorldState, name: &str, value: bool) -> Result<()> {
        let idx = self.register(name)?;
        ws.set_bit(idx, value);
        Ok(())
    }

    /// `Ok(None)` when the atom is known but unspecified in `ws`.
    pub fn get(&self, ws: &WorldState, name: &str) -> Result<Option<bool>> {
        let idx = self
            .index_of(name)
            .ok_or_else(|| GoapError::UnknownAtom(name.to_string()))?;
        Ok(ws.get_bit(idx))
    }

    /// Builds a state from name/value pairs using [`AtomRegistry::set`].
    pub fn encode<I, S>(&mut self, pairs: I) -> Result<WorldState>
    where
        I: IntoIterator<Item = (S, bool)>,
        S: AsRef<str>,
    {
        let mut ws = WorldState::EMPTY;
        for (name, value) in pairs {
            self.set(&mut ws, name.as_ref(), value)?;
        }
        Ok(ws)
    }

    /// Builds a state from name/value pairs, registering every atom.
    pub fn encode_registering<I, S>(&mut self, pairs: I) -> Result<WorldState>
    where
        I: IntoIterator<Item = (S, bool)>,
        S: AsRef<str>,
    {
        let mut ws = WorldState::EMPTY;
        for (name, value) in pairs {
            self.set_registering(&mut ws, name.as_ref(), value)?;
        }
        Ok(ws)
    }

    /// Specified atoms as a name to value map.
    pub fn to_map(&self, ws: &WorldState) -> BTreeMap<String, bool> {
        self.names
            .iter()
            .enumerate()
            .filter_map(|(idx, name)| ws.get_bit(idx).map(|v| (name.clone(), v)))
            .collect()
    }

    /// Comma-separated specified atoms: `NAME` when true, `name` when false.
    pub fn describe(&self, ws: &WorldState) -> String {
        let mut parts = Vec::new();
        for (idx, name) in self.names.iter().enumerate() {
            match ws.get_bit(idx) {
                Some(true) => parts.push(name.to_uppercase()),
                Some(false) => parts.push(name.to_lowercase()),
                None => {}
            }
        }
        parts.join(",")
    }

    /// Names of the registered atoms set in `mask`.
    pub fn describe_bits(&self, mask: u64) -> Vec<&str> {
        self.names
            .iter()
            .enumerate()
            .filter(|(idx, _)| mask & (1u64 << idx) != 0)
            .map(|(_, name)| name.as_str())
            .collect()
    }
}

impl Default for AtomRegistry {
    fn default() -> Self {
        Self::new(MAX_ATOMS)
    }
}
