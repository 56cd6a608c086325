pub mod prediction_types;
pub mod scan_types;
