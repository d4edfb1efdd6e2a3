pub mod dataset_csv_adapter;
pub mod figure_output_adapter;
pub mod raw_source_adapter;
pub mod results_output_adapter;

pub use dataset_csv_adapter::CsvDatasetAdapter;
pub use figure_output_adapter::FigureFileAdapter;
pub use raw_source_adapter::{FileRawSourceAdapter, RawSourceLayout};
pub use results_output_adapter::JsonResultsAdapter;
