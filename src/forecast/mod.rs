pub mod aggregate;
pub mod models;

pub use aggregate::{summarize, AggregationError};
