//! Deterministic, engine-agnostic AI primitives.
//!
//! This crate holds the pieces every decision layer needs: action statuses, tick timing,
//! stable entity ids, read/write world access with optional sensing, and the per-entity
//! [`Blackboard`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod action;
pub mod blackboard;
pub mod entity;
pub mod math;
pub mod sense;
pub mod tick;
pub mod world;

pub use action::ActionStatus;
pub use blackboard::{BbValue, Blackboard, BlackboardError, EntityHandle, Value, ValueKind};
pub use entity::EntityId;
pub use math::Vec2;
pub use sense::{RangeQuery, Sensed};
pub use tick::TickContext;
pub use world::{WorldMut, WorldView};
