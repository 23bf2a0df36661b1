//! This module contains the data models for error aggregation.

pub mod aggregation_key;
pub mod aggregation_record;
pub mod error_report;

pub use aggregation_key::{AggregationKey, GLOBAL_CLIENT};
pub use aggregation_record::AggregationRecord;
pub use error_report::{ErrorDetails, ErrorReport};
