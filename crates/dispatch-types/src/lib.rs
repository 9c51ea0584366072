//! Core types and traits for the analysis job dispatcher.
//!
//! Status files and DTOs keep the field names external tooling reads
//! (`job_monitor`, `query_status`, `full_report_dict`, ...).

mod dto;
mod monitor;
mod status;
mod traits;

pub use dto::*;
pub use monitor::*;
pub use status::*;
pub use traits::*;
