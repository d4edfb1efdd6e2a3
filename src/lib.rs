pub mod constants;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod metrics;
pub mod pipeline;

// Statistical analyses and chart instructions
pub mod analysis;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

// Domain data shapes shared across layers
pub mod domain;
