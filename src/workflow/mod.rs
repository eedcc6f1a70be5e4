//! Workflow selection and top-level sequencing.

pub mod driver;
pub mod registry;
pub mod report;

pub use driver::WorkflowDriver;
pub use registry::{ad_hoc, lookup, PostAction, PreAction, ScriptBuilder, Workflow};
pub use report::RunReport;
