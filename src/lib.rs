#![warn(missing_docs)]
//! Errwatch notifies an operator of backend failures while merging repeated
//! identical errors into a single summary per window.

pub mod config;
pub mod engine;
pub mod models;
pub mod notification;
pub mod relay;
pub mod test_helpers;
