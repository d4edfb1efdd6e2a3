pub mod analysis_use_case;
pub mod cleaning_use_case;
pub mod fusion_use_case;
pub mod pipeline_use_case;
pub mod ports;
pub mod results_use_case;

pub use pipeline_use_case::PipelineUseCase;
