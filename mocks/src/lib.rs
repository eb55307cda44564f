//! Test doubles for the orchestration system: an in-memory EntityStore with
//! error injection and call tracking, builders for creation DTOs, and
//! canned fixtures for scenario tests.

pub mod builders;
pub mod fixtures;
pub mod repository;

pub use builders::{
    blocks, blocks_at, relates, summary_of_len, valid_summary, FeatureBuilder, ProjectBuilder,
    TaskBuilder,
};
pub use fixtures::{chain_with_blocks, default_loader, feature_with_tasks};
pub use repository::MockEntityStore;
