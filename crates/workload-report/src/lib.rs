//! Console reporting for a running workload.
//!
//! The [`Reporter`] task samples the shared statistics every interval and
//! renders them through one of three [`ReportFormatter`]s: raw `verbose`
//! counters, a one-line-per-change `event_driven` stream, or a redrawn
//! `dashboard` table.

pub mod format;
pub mod reporter;
pub mod summary;
pub mod view;

pub use format::{
    final_summary, formatter_for, DashboardFormatter, EventDrivenFormatter, ReportFormatter,
    VerboseFormatter,
};
pub use reporter::Reporter;
pub use summary::RunSummary;
pub use view::{ReportView, RunInfo};
