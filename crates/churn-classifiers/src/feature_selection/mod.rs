//! Feature selection utilities.
//!
//! This module contains importance-based selection, which prunes a feature
//! matrix to the columns a fitted tree ensemble found useful.
pub mod importance_selection;

pub use importance_selection::{rank_importances, select, FeatureSelection};
