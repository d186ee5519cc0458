//! Duty-cycle scheduling.
//!
//! Decides, from the local time and the retained hour marker, whether to
//! upload now, wait a little, or power down until shortly before the next
//! operating window.
//!
//! # Zones
//!
//! ```text
//!   00 .. start-2   start-1      start ..... end     end+1 .. 23
//!  ──────────────┬────────────┬─────────────────────┬─────────────
//!   Outside      │ PreWindow  │ InWindow            │ Outside
//!   power down   │ wait to    │ upload once in the  │ power down
//!   until        │ top of     │ first quarter of    │ until
//!   start - lead │ hour       │ each hour           │ start - lead
//! ```

mod config;
mod driver;
pub mod gate;
pub mod planner;
mod window;

pub use config::DutyCycleConfig;
pub use driver::{Collaborators, DutyCycleDriver, Step};
pub use planner::SleepPlan;
pub use window::{OperatingWindow, WindowError, Zone};
