// Source-specific cleaners
pub mod hospital;
pub mod publications;
pub mod statistics;

pub use hospital::HospitalCleaner;
pub use publications::PublicationCleaner;
pub use statistics::StatisticsCleaner;
