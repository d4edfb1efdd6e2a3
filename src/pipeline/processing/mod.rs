// Pipeline processing: field parsing, cleaning, quality assessment and fusion

pub mod fusion;
pub mod normalize;
pub mod parser;
pub mod quality_gate;
pub mod summary;
