//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate registry and collaborator calls into tree operations.
//! - Keep callers decoupled from storage details.
//!
//! Wiring order: registry -> collaborators -> `NodeTreeManager` ->
//! `TemplateManager`. The template manager is passed to
//! `NodeTreeManager::try_create` as an argument.

pub mod cancel;
pub mod error;
pub mod node_tree;
pub mod template;
pub mod tree_lock;
