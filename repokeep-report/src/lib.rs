//! # repokeep-report
//!
//! Tera-based rendering of the human-readable reports: the timestamped update
//! log written after every batch run, and the repair summary.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use repokeep_report::{Renderer, RepairReportContext};
//!
//! if let Ok(renderer) = Renderer::new() {
//!     let ctx = RepairReportContext::default();
//!     if let Ok(text) = renderer.render_repair(&ctx) {
//!         println!("{text}");
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{RepairErrorCtx, RepairReportContext, UpdateReportContext};
pub use engine::{update_log_file_name, Renderer};
pub use error::ReportError;
