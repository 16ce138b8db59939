//! churn-classifiers: offline training pipeline for customer churn prediction.
//!
//! This crate provides the data types for labeled tabular datasets, feature
//! preparation (cleaning, one-hot encoding, stratified splitting), class
//! balancing, model wrappers (logistic regression, random forest, GBDT and a
//! bagging ensemble), evaluation, randomized hyper-parameter search,
//! importance-based feature selection, and a driver that composes them into
//! named stages.
//!
//! Every stage takes its inputs by reference and returns new values, so a
//! dataset or fitted model is never modified after it has been produced.
pub mod balancing;
pub mod config;
pub mod data_handling;
pub mod error;
pub mod feature_selection;
pub mod io;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod search;

pub use error::{ChurnError, Result};
