// Data processing pipeline: raw ingestion and processing stages

pub mod ingestion;
pub mod processing;

pub use processing::parser;
