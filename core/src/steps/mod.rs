//! Repair steps.
//!
//! Each step is an idempotent check-and-fix unit that turns every
//! collaborator failure into a [`StepOutcome`](crate::outcome::StepOutcome);
//! nothing propagates past a step boundary.

mod features;
mod kernel;
mod services;
mod status;
mod version;

pub use features::ensure_features;
pub use kernel::ensure_kernel;
pub use services::{ServiceGroup, ensure_services};
pub use status::final_status;
pub use version::ensure_default_version;
