//! Tooling primitives for deterministic game AI.
//!
//! This crate is intentionally lightweight and engine-agnostic. It records *why* agents made
//! their decisions; rendering those records (inspectors, overlays) belongs to adapter crates.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod trace;

pub use trace::{TraceBuffer, TraceEvent, TraceKind, DEFAULT_TRACE_CAPACITY};
