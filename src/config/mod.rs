//! Configuration module.

mod aggregator;
mod app_config;
mod helpers;

pub use aggregator::AggregatorConfig;
pub use app_config::{AppConfig, NotifierKind};
pub use helpers::{deserialize_duration_from_seconds, serialize_duration_to_seconds};
