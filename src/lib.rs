pub mod align;
pub mod comfort;
pub mod config;
pub mod error;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod records;
pub mod resolve;
pub mod stats;
