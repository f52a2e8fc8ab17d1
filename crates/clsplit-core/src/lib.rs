//! Shared types for splitting large change-lists into reviewable pieces.
//!
//! Provides the changed-file model ([`change::ChangedFile`]), repo-relative
//! path normalization, and the splitter configuration ([`config::SplitConfig`]).

pub mod change;
pub mod config;
