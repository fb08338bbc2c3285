//! Node tree domain model.
//!
//! # Responsibility
//! - Define the persisted node and template shapes.
//! - Define the read projections handed to callers (extended node, tree).
//!
//! # Invariants
//! - Every node and template is identified by a UUID generated at creation.
//! - If `a` is listed in `b.children` then `a.parent == Some(b.id)`.
//! - A node with `parent == None` is a tree root.

pub mod attribute;
pub mod node;
pub mod template;
