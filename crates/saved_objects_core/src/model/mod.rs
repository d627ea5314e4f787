//! Saved object domain model.
//!
//! # Responsibility
//! - Define the caller-facing saved object shape and its pre-write candidate.
//! - Define the store-native raw document shape with explicit optional fields.
//! - Own the opaque version token codec.
//!
//! # Invariants
//! - `id` + `type` identify one logical object; multi-namespace objects keep
//!   the same `id` in every namespace they are shared to.
//! - Version tokens round-trip exactly to `(seq_no, primary_term)`.

pub mod raw_doc;
pub mod saved_object;
pub mod version;
