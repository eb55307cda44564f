//! Dependency-graph and recommendation services built on the entity store.

pub mod dependency;
pub mod recommend;
pub mod work_tree;
