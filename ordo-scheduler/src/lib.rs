//! # ORDO Scheduler
//!
//! Priority task dispatch: pending work is bucketed by priority, the highest
//! priority is served first, and tasks sharing a priority leave in the order
//! they arrived.
//!
//! ## Example
//!
//! ```rust
//! use ordo_scheduler::{Dispatch, PriorityScheduler};
//!
//! let scheduler = PriorityScheduler::new();
//! scheduler.add_task("Low priority task", 1);
//! scheduler.add_task("High priority task", 10);
//!
//! assert_eq!(scheduler.execute_next(|task| task), Dispatch::Executed("High priority task"));
//! assert_eq!(scheduler.execute_next(|task| task), Dispatch::Executed("Low priority task"));
//! assert!(scheduler.execute_next(|task| task).is_idle());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod dispatch;
mod pending;
mod scheduler;

pub use dispatch::Dispatch;
pub use scheduler::{PriorityScheduler, SchedulerStats};
