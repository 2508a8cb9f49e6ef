//! Campaign reporting: exportable simulation run reports.

pub mod report_builder;

pub use report_builder::{report_file_name, ReportBuilder, ReportSource, SimulationReport};
