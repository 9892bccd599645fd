//! Time-bounded conversation phases
//!
//! A session moves through an ordered list of phases, each with its own
//! prompt focus and behavior flags. The scheduler is a pure mapping from
//! elapsed session time to the active phase.

mod config;
mod scheduler;

pub use config::PhaseConfig;
pub use scheduler::{PhaseScheduler, SummaryTrigger};
