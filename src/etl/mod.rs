//! The three pipelines and their shared stages.

pub mod aggregate;
pub mod batch;
pub mod collector;
pub mod dimensions;
pub mod direct;
pub mod extractor;
pub mod loader;
pub mod pairs;
pub mod whitelist;
