pub mod helpers;

mod extractor_tests;
mod warehouse_tests;
