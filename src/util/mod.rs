pub mod binning;
pub mod chain_types;
pub mod colormap;
pub mod file_utils;
pub mod iteration_select;
pub mod parquet_utils;
pub mod ranges;
pub mod read_function;
pub mod write_function;
