/// Database models
///
/// This module contains the models and CRUD operations for the store of
/// record:
///
/// - `user`: user accounts
/// - `task`: per-user tasks with status/priority lifecycle and AI-derived
///   fields
/// - `tag`: per-user tags; the `task_tags` link table cascades from both
///   sides

pub mod tag;
pub mod task;
pub mod user;
