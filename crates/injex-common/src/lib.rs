//! Common types and utilities for the injex resolution engine.
//!
//! This crate provides foundational types used across all injex crates:
//! - String interning (`Atom`, `ShardedInterner`) for binding and type names
//! - Centralized limits and thresholds

// String interning for name deduplication
pub mod interner;
pub use interner::{Atom, ShardedInterner};

// Centralized limits and thresholds
pub mod limits;
